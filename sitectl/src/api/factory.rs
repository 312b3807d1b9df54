//! Acquia Cloud Site Factory REST client (HTTP Basic auth).

use crate::api::{check_status, BackupDownloader, Operation, SiteBackupApi, SyncRequests, TaskStatus, TaskStatusSource};
use crate::backup::{BackupMetadata, SourceApi};
use crate::components::Component;
use crate::config::SiteFactoryConfig;
use crate::sites::SiteMapping;
use crate::transfer;
use crate::{Error, Result};
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const USERNAME_ENV: &str = "ACSF_API_USERNAME";
pub const PASSWORD_ENV: &str = "ACSF_API_PASSWORD";
pub const BASE_URL_ENV: &str = "ACSF_API_BASE_URL";
pub const LEGACY_USERNAME_ENV: &str = "ACQUIA_API_USERNAME";
pub const LEGACY_PASSWORD_ENV: &str = "ACQUIA_API_PASSWORD";

/// WIP task status code of a successful task.
pub const TASK_SUCCESS_STATUS: u64 = 16;

/// Values given on the command line; each wins over the environment.
#[derive(Debug, Clone, Default)]
pub struct FactoryOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Clone)]
struct BasicAuth {
    username: String,
    password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct FactoryClient {
    http: Client,
    base_url: Url,
    auth: BasicAuth,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    task_id: Value,
}

#[derive(Debug, Deserialize)]
struct BackupsResponse {
    #[serde(default)]
    backups: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WipTaskResponse {
    wip_task: WipTask,
}

#[derive(Debug, Deserialize)]
struct WipTask {
    id: Value,
    status: Value,
    #[serde(default)]
    completed: Value,
}

impl FactoryClient {
    /// Build a client after checking the base URL shape.
    pub fn new(base_url: &str, username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        validate_base_url(base_url)?;
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid ACSF API base URL {}: {}", base_url, e)))?;
        Ok(Self::with_base_url(base_url, username.into(), password.into()))
    }

    pub(crate) fn with_base_url(base_url: Url, username: String, password: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
            auth: BasicAuth { username, password },
        }
    }

    /// Resolve credentials and base URL from options, the process
    /// environment and the `[site_factory]` section.
    pub fn from_options(options: &FactoryOptions, config: &SiteFactoryConfig, target_env: &str) -> Result<Self> {
        Self::from_options_with(options, config, target_env, |name| std::env::var(name).ok())
    }

    pub fn from_options_with<F>(options: &FactoryOptions, config: &SiteFactoryConfig, target_env: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = first_set(&[options.username.clone(), env(USERNAME_ENV), env(LEGACY_USERNAME_ENV)])
            .ok_or_else(|| Error::MissingCredentials {
                source_name: "ACSF API".into(),
                fields: vec![USERNAME_ENV],
            })?;
        let password = first_set(&[options.password.clone(), env(PASSWORD_ENV), env(LEGACY_PASSWORD_ENV)])
            .ok_or_else(|| Error::MissingCredentials {
                source_name: "ACSF API".into(),
                fields: vec![PASSWORD_ENV],
            })?;

        let base_url = match first_set(&[options.base_url.clone(), env(BASE_URL_ENV), config.base_url.clone()]) {
            Some(url) => url,
            None => derive_base_url(config.name.as_deref(), target_env)?,
        };

        Self::new(&base_url, username, password)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::config(format!("Invalid ACSF API path {}: {}", path, e)))
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.url(path)?;
        debug!("ACSF API {} {}", method, url);

        let mut builder = self
            .http
            .request(method, url)
            .basic_auth(&self.auth.username, Some(&self.auth.password));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = check_status(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn task(&self, path: &str, body: &Value) -> Result<String> {
        let response: TaskResponse = serde_json::from_value(self.request(Method::POST, path, Some(body)).await?)
            .map_err(|e| Error::UnexpectedResponse(format!("No task ID in response: {}", e)))?;
        scalar_string(&response.task_id)
            .ok_or_else(|| Error::UnexpectedResponse("No task ID in response".into()))
    }

    /// Temporary download URL for a backup.
    pub async fn backup_url(&self, site_id: u64, backup_id: u64) -> Result<String> {
        let response = self
            .request(Method::GET, &format!("api/v1/sites/{}/backups/{}/url", site_id, backup_id), None)
            .await?;
        response
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::UnexpectedResponse(format!("No download URL for backup ID {}", backup_id)))
    }

    /// Stage production sites down to `to_env` (`dev` or `test`).
    pub async fn stage(&self, to_env: &str, site_ids: &[u64]) -> Result<String> {
        let body = json!({
            "to_env": to_env,
            "sites": site_ids,
            "wipe_target_environment": false,
            "synchronize_all_users": false,
            "detailed_status": false,
        });
        self.task("api/v2/stage", &body).await
    }
}

fn first_set(candidates: &[Option<String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|value| !value.is_empty())
        .cloned()
}

/// `https://www.<name>.acsitefactory.com/` for production, with `test-` or
/// `dev-` in front of the name for the lower environments.
pub fn derive_base_url(name: Option<&str>, target_env: &str) -> Result<String> {
    let name = name.filter(|n| !n.is_empty()).ok_or_else(|| {
        Error::config(format!(
            "Set {}, --acsf-api-base-url or [site_factory] name",
            BASE_URL_ENV
        ))
    })?;
    let prefix = match target_env {
        "01live" => "",
        "01test" => "test-",
        "01dev" => "dev-",
        other => {
            return Err(Error::config(format!(
                "Cannot derive the ACSF API URL for environment {}",
                other
            )))
        }
    };
    Ok(format!("https://www.{}{}.acsitefactory.com/", prefix, name))
}

pub fn validate_base_url(url: &str) -> Result<()> {
    if !url.ends_with('/') {
        return Err(Error::config("The ACSF API base URL must end in a trailing forward slash."));
    }
    if !url.starts_with("https://") {
        return Err(Error::config("The ACSF API base URL must begin with \"https://\""));
    }
    Ok(())
}

/// Task IDs and statuses arrive as numbers or numeric strings.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Anything but null, `0`, `"0"`, `""` or `false` means the task finished.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        _ => true,
    }
}

impl TaskStatusSource for FactoryClient {
    async fn task_status(&self, id: &str) -> Result<TaskStatus> {
        let value = self
            .request(Method::GET, &format!("api/v1/wip/task/{}/status", id), None)
            .await?;
        let response: WipTaskResponse = serde_json::from_value(value)
            .map_err(|e| Error::UnexpectedResponse(format!("Invalid task status for {}: {}", id, e)))?;
        let task = response.wip_task;

        let status = scalar_string(&task.status).unwrap_or_default();
        let completed = is_set(&task.completed);
        debug!("Task {} status {} (reported id {})", id, status, task.id);

        Ok(TaskStatus {
            id: id.to_string(),
            completed,
            succeeded: completed && status == TASK_SUCCESS_STATUS.to_string(),
            status,
        })
    }
}

impl BackupDownloader for FactoryClient {
    async fn download_backup(&self, site: &SiteMapping, backup: &BackupMetadata, dest: &Path) -> Result<u64> {
        let url = self.backup_url(site.site_id, backup.id).await?;
        // The URL is pre-authorized; no credentials are sent with it.
        let response = self.http.get(&url).send().await?;
        transfer::stream_to_file(response, dest).await
    }
}

impl SiteBackupApi for FactoryClient {
    fn source(&self) -> SourceApi {
        SourceApi::SiteFactory
    }

    fn supports_labels(&self) -> bool {
        true
    }

    fn check_components(&self, operation: Operation, components: &[Component]) -> Result<()> {
        if operation == Operation::Restore && components.contains(&Component::Codebase) {
            return Err(Error::config("Restoring the codebase is not supported."));
        }
        Ok(())
    }

    fn check_sync_target(&self, target_env: &str) -> Result<()> {
        match target_env {
            "01dev" | "01test" => Ok(()),
            "01live" => Err(Error::config("You cannot sync data to the 01live environment.")),
            other => Err(Error::config(format!(
                "Sync target must be 01dev or 01test, got {}",
                other
            ))),
        }
    }

    async fn create_backup(&self, site: &SiteMapping, components: &[Component], label: Option<&str>) -> Result<String> {
        let mut body = json!({ "components": components });
        if let Some(label) = label {
            body["label"] = json!(label);
        }
        self.task(&format!("api/v1/sites/{}/backup", site.site_id), &body)
            .await
    }

    async fn list_backups(&self, site: &SiteMapping) -> Result<Vec<BackupMetadata>> {
        let value = self
            .request(Method::GET, &format!("api/v1/sites/{}/backups", site.site_id), None)
            .await?;
        let response: BackupsResponse = serde_json::from_value(value)?;
        response
            .backups
            .into_iter()
            .map(BackupMetadata::from_site_factory)
            .collect()
    }

    async fn get_backup(&self, site: &SiteMapping, backup_id: u64) -> Result<BackupMetadata> {
        let value = self
            .request(Method::GET, &format!("api/v1/sites/{}/backups/{}", site.site_id, backup_id), None)
            .await?;
        let response: BackupsResponse = serde_json::from_value(value)?;
        let raw = response
            .backups
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("Backup ID {} for site ID {}", backup_id, site.site_id)))?;
        BackupMetadata::from_site_factory(raw)
    }

    async fn restore_backup(&self, site: &SiteMapping, backup_id: Option<u64>, components: &[Component]) -> Result<String> {
        let mut body = json!({ "target_site_id": site.site_id });
        if !components.is_empty() {
            body["components"] = json!(components);
        }
        if let Some(id) = backup_id {
            body["backup_id"] = json!(id);
        }
        self.task(&format!("api/v1/sites/{}/restore", site.site_id), &body)
            .await
    }

    async fn sync_from_production(&self, sites: &[SiteMapping], target_env: &str, _components: &[Component]) -> Result<SyncRequests> {
        self.check_sync_target(target_env)?;
        let to_env = target_env.trim_start_matches("01");
        let site_ids: Vec<u64> = sites.iter().map(|s| s.site_id).collect();
        let task_id = self.stage(to_env, &site_ids).await?;
        Ok(SyncRequests {
            task_ids: vec![task_id],
            failures: 0,
        })
    }

    async fn deployed_ref(&self) -> Result<String> {
        let response = self.request(Method::GET, "api/v1/vcs?type=sites", None).await?;
        response
            .get("current")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::UnexpectedResponse("Unable to determine the deployed git ref".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> FactoryClient {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        FactoryClient::with_base_url(base, "user".into(), "pass".into())
    }

    fn site(site_id: u64) -> SiteMapping {
        SiteMapping {
            normalized_name: format!("site{}", site_id),
            remote_alias: format!("site{}.01live", site_id),
            remote_is_default: true,
            remote_url: None,
            local_url: format!("site{}.local", site_id),
            site_directory: format!("site{}", site_id),
            site_id,
            environment: "01live".into(),
        }
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn factory_backup(id: u64, timestamp: i64, label: &str) -> Value {
        json!({
            "id": id,
            "nid": 101,
            "timestamp": timestamp,
            "file": format!("site101_{}.tar.gz", id),
            "label": label,
            "componentList": ["database", "public files"]
        })
    }

    #[test]
    fn test_base_url_validation() {
        assert!(validate_base_url("https://www.example.acsitefactory.com/").is_ok());
        assert!(validate_base_url("https://www.example.acsitefactory.com").is_err());
        assert!(validate_base_url("http://www.example.acsitefactory.com/").is_err());
    }

    #[test]
    fn test_base_url_derived_per_environment() {
        assert_eq!(
            derive_base_url(Some("acme"), "01live").unwrap(),
            "https://www.acme.acsitefactory.com/"
        );
        assert_eq!(
            derive_base_url(Some("acme"), "01test").unwrap(),
            "https://www.test-acme.acsitefactory.com/"
        );
        assert_eq!(
            derive_base_url(Some("acme"), "01dev").unwrap(),
            "https://www.dev-acme.acsitefactory.com/"
        );
        assert!(derive_base_url(Some("acme"), "02live").is_err());
        assert!(derive_base_url(None, "01live").is_err());
    }

    #[test]
    fn test_option_precedence() {
        let config = SiteFactoryConfig {
            name: Some("acme".into()),
            base_url: None,
        };
        let options = FactoryOptions {
            username: Some("opt-user".into()),
            ..Default::default()
        };
        let client = FactoryClient::from_options_with(
            &options,
            &config,
            "01dev",
            env(&[
                (USERNAME_ENV, "env-user"),
                (LEGACY_PASSWORD_ENV, "legacy-pass"),
            ]),
        )
        .unwrap();
        assert_eq!(client.auth.username, "opt-user");
        assert_eq!(client.auth.password, "legacy-pass");
        assert_eq!(client.base_url().as_str(), "https://www.dev-acme.acsitefactory.com/");

        let client = FactoryClient::from_options_with(
            &FactoryOptions::default(),
            &config,
            "01dev",
            env(&[
                (USERNAME_ENV, "u"),
                (PASSWORD_ENV, "p"),
                (BASE_URL_ENV, "https://factory.example.com/"),
            ]),
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "https://factory.example.com/");
    }

    #[test]
    fn test_missing_password_and_bad_url() {
        let config = SiteFactoryConfig::default();
        let err = FactoryClient::from_options_with(&FactoryOptions::default(), &config, "01live", env(&[(USERNAME_ENV, "u")]))
            .unwrap_err();
        assert!(err.to_string().contains(PASSWORD_ENV));

        let options = FactoryOptions {
            username: Some("u".into()),
            password: Some("p".into()),
            base_url: Some("https://factory.example.com".into()),
        };
        let err = FactoryClient::from_options_with(&options, &config, "01live", env(&[])).unwrap_err();
        assert!(err.to_string().contains("trailing forward slash"));
    }

    #[tokio::test]
    async fn test_create_backup_with_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sites/101/backup"))
            .and(basic_auth("user", "pass"))
            .and(body_json(json!({"components": ["database", "themes"], "label": "v1-predeploy"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": 5501})))
            .expect(1)
            .mount(&server)
            .await;

        let task = client(&server)
            .create_backup(&site(101), &[Component::Database, Component::Themes], Some("v1-predeploy"))
            .await
            .unwrap();
        assert_eq!(task, "5501");
    }

    #[tokio::test]
    async fn test_list_and_get_backups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/sites/101/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "backups": [factory_backup(1, 100, ""), factory_backup(2, 200, "release")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/sites/101/backups/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "backups": [factory_backup(2, 200, "release")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/sites/101/backups/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"backups": []})))
            .mount(&server)
            .await;
        let client = client(&server);

        let backups = client.list_backups(&site(101)).await.unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[1].label, "release");

        let backup = client.get_backup(&site(101), 2).await.unwrap();
        assert_eq!(backup.file, "site101_2.tar.gz");
        assert!(matches!(client.get_backup(&site(101), 3).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_restore_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sites/101/restore"))
            .and(body_json(json!({"target_site_id": 101, "components": ["database"], "backup_id": 7})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "77"})))
            .mount(&server)
            .await;
        let task = client(&server)
            .restore_backup(&site(101), Some(7), &[Component::Database])
            .await
            .unwrap();
        assert_eq!(task, "77");
    }

    #[tokio::test]
    async fn test_task_status_success_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/wip/task/1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "wip_task": {"id": 1, "status": 16, "completed": 1700000000}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/wip/task/2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "wip_task": {"id": 2, "status": 4, "completed": 1700000000}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/wip/task/3/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "wip_task": {"id": 3, "status": 1, "completed": 0}
            })))
            .mount(&server)
            .await;
        let client = client(&server);

        let done = client.task_status("1").await.unwrap();
        assert!(done.completed && done.succeeded);
        let failed = client.task_status("2").await.unwrap();
        assert!(failed.completed && !failed.succeeded);
        let running = client.task_status("3").await.unwrap();
        assert!(!running.completed);
    }

    #[tokio::test]
    async fn test_stage_and_deployed_ref() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/stage"))
            .and(body_json(json!({
                "to_env": "dev",
                "sites": [101, 102],
                "wipe_target_environment": false,
                "synchronize_all_users": false,
                "detailed_status": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": 900})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/vcs"))
            .and(query_param("type", "sites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"current": "tags/1.4.0"})))
            .mount(&server)
            .await;
        let client = client(&server);

        let requests = client
            .sync_from_production(&[site(101), site(102)], "01dev", &[])
            .await
            .unwrap();
        assert_eq!(requests.task_ids, vec!["900".to_string()]);
        assert!(client.sync_from_production(&[site(101)], "01live", &[]).await.is_err());
        assert_eq!(client.deployed_ref().await.unwrap(), "tags/1.4.0");
    }

    #[tokio::test]
    async fn test_download_uses_presigned_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/sites/101/backups/2/url"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/files/site101_2.tar.gz", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/site101_2.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive".to_vec()))
            .mount(&server)
            .await;
        let client = client(&server);
        let backup = BackupMetadata::from_site_factory(factory_backup(2, 200, "")).unwrap();
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("101").join(&backup.file);

        let written = client.download_backup(&site(101), &backup, &dest).await.unwrap();
        assert_eq!(written, 7);
    }

    #[test]
    fn test_component_and_target_rules() {
        let client = FactoryClient::new("https://www.acme.acsitefactory.com/", "u", "p").unwrap();
        assert!(client.check_components(Operation::Restore, &[Component::Codebase]).is_err());
        assert!(client.check_components(Operation::Backup, &[Component::Codebase]).is_ok());
        assert!(client.check_sync_target("01test").is_ok());
        assert!(client.check_sync_target("01live").is_err());
        assert!(client.check_sync_target("02dev").is_err());
    }
}
