//! Acquia Cloud API v2 client.
//!
//! Every request is signed with [`signer::RequestSigner`]. Mutating calls
//! answer with a notification link whose last path segment is polled
//! through `/notifications/{uuid}`.

pub mod credentials;
pub mod signer;

use crate::api::{check_status, notification_id, BackupDownloader, Operation, SiteBackupApi, SyncRequests, TaskStatus, TaskStatusSource};
use crate::backup::{latest, BackupMetadata, SourceApi};
use crate::components::{self, Component};
use crate::sites::SiteMapping;
use crate::transfer;
use crate::{Error, Result};
use credentials::CloudCredentials;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use signer::{RequestSigner, SignedBody};
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

pub const DEFAULT_BASE_URL: &str = "https://cloud.acquia.com/api";

/// Label of the environment the production sync copies from.
pub const PRODUCTION_ENV: &str = "01live";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Environment {
    /// Environment UUID
    pub id: String,
    /// Machine name, e.g. `01dev`
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// `<user>@<host>`
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Application {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub hosting: Option<Hosting>,
}

/// `type` is `ace` or `acsf`; `id` looks like `<realm>:<site>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Hosting {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodeRef {
    pub name: String,
    #[serde(default)]
    pub flags: CodeRefFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CodeRefFlags {
    #[serde(default)]
    pub tag: bool,
}

pub struct CloudClient {
    http: Client,
    base_url: String,
    app_id: Option<String>,
    signer: RequestSigner,
    environments: OnceCell<Vec<Environment>>,
}

impl CloudClient {
    pub fn new(base_url: impl Into<String>, app_id: Option<String>, credentials: &CloudCredentials) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id,
            signer: RequestSigner::new(credentials.key.clone(), &credentials.secret)?,
            environments: OnceCell::new(),
        })
    }

    pub fn app_id(&self) -> Result<&str> {
        self.app_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::config("Set the Cloud application ID in [cloud] app_id"))
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::config(format!("Invalid Cloud API URL {}{}: {}", self.base_url, path, e)))
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<reqwest::Response> {
        let url = self.url(path)?;
        debug!("Cloud API {} {}", method, url);

        let payload = body.map(serde_json::to_vec).transpose()?;
        let mut builder = self.http.request(method.clone(), url.clone());
        let signed_body = payload.as_deref().map(|bytes| SignedBody {
            content_type: "application/json",
            bytes,
        });
        if let Some(bytes) = &payload {
            builder = builder
                .header("Content-Type", "application/json")
                .body(bytes.clone());
        }
        builder = self.signer.apply(builder, &method, &url, signed_body)?;

        check_status(builder.send().await?).await
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        Ok(self.send(method, path, body).await?.json().await?)
    }

    /// Mutating call answered with a notification link.
    async fn operation(&self, path: &str, body: Option<&Value>) -> Result<String> {
        let response = self.request(Method::POST, path, body).await?;
        let href = response
            .pointer("/_links/notification/href")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::UnexpectedResponse("Unable to get response status. It's likely the request failed.".into())
            })?;
        notification_id(href)
    }

    pub async fn applications(&self) -> Result<Vec<Application>> {
        embedded_items(self.request(Method::GET, "/applications", None).await?)
    }

    pub async fn application(&self, app_id: &str) -> Result<Application> {
        let value = self.request(Method::GET, &format!("/applications/{}", app_id), None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Environments of the configured application, fetched once per client.
    pub async fn environments(&self) -> Result<&[Environment]> {
        let app_id = self.app_id()?;
        let environments = self
            .environments
            .get_or_try_init(|| async {
                let path = format!("/applications/{}/environments", app_id);
                embedded_items(self.request(Method::GET, &path, None).await?)
            })
            .await?;
        Ok(environments.as_slice())
    }

    /// Resolve an environment label such as `01dev` to its record. Machine
    /// names are not matched.
    pub async fn environment(&self, name: &str) -> Result<Environment> {
        self.environments()
            .await?
            .iter()
            .find(|e| e.label == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Could not find environment UUID for {}", name)))
    }

    pub async fn database_backups(&self, env_uuid: &str, db_name: &str) -> Result<Vec<Value>> {
        let path = format!("/environments/{}/databases/{}/backups", env_uuid, db_name);
        let response = self.request(Method::GET, &path, None).await?;
        if response.get("total").is_none() {
            return Err(Error::UnexpectedResponse("Received an unexpected API response.".into()));
        }
        embedded_items(response)
    }

    pub async fn database_backup(&self, env_uuid: &str, db_name: &str, backup_id: u64) -> Result<Value> {
        let path = format!("/environments/{}/databases/{}/backups/{}", env_uuid, db_name, backup_id);
        let response = self.request(Method::GET, &path, None).await?;
        if response.get("id").and_then(Value::as_u64) != Some(backup_id) {
            return Err(Error::UnexpectedResponse("Received unexpected backup ID from API.".into()));
        }
        Ok(response)
    }

    pub async fn create_database_backup(&self, env_uuid: &str, db_name: &str) -> Result<String> {
        self.operation(&format!("/environments/{}/databases/{}/backups", env_uuid, db_name), None)
            .await
    }

    pub async fn restore_database_backup(&self, env_uuid: &str, db_name: &str, backup_id: u64) -> Result<String> {
        let path = format!(
            "/environments/{}/databases/{}/backups/{}/actions/restore",
            env_uuid, db_name, backup_id
        );
        self.operation(&path, None).await
    }

    /// Copy database `db_name` from `source_uuid` into `target_uuid`.
    pub async fn copy_database(&self, target_uuid: &str, db_name: &str, source_uuid: &str) -> Result<String> {
        let body = json!({ "name": db_name, "source": source_uuid });
        self.operation(&format!("/environments/{}/databases", target_uuid), Some(&body))
            .await
    }

    /// Copy all files from `source_uuid` into `target_uuid`.
    pub async fn copy_files(&self, target_uuid: &str, source_uuid: &str) -> Result<String> {
        let body = json!({ "source": source_uuid });
        self.operation(&format!("/environments/{}/files", target_uuid), Some(&body))
            .await
    }

    /// Branches and tags of the application repository.
    pub async fn code_refs(&self) -> Result<Vec<CodeRef>> {
        let path = format!("/applications/{}/code", self.app_id()?);
        embedded_items(self.request(Method::GET, &path, None).await?)
    }

    /// Deploy `git_ref` to the environment.
    pub async fn switch_code(&self, env_uuid: &str, git_ref: &str) -> Result<String> {
        let body = json!({ "branch": git_ref });
        self.operation(&format!("/environments/{}/code/actions/switch", env_uuid), Some(&body))
            .await
    }

    pub async fn notification(&self, uuid: &str) -> Result<Value> {
        self.request(Method::GET, &format!("/notifications/{}", uuid), None).await
    }

    async fn latest_backup(&self, env_uuid: &str, site: &SiteMapping) -> Result<BackupMetadata> {
        let backups = self.list_site_backups(env_uuid, site).await?;
        latest(&backups)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No backup to restore for site ID {}", site.site_id)))
    }

    async fn list_site_backups(&self, env_uuid: &str, site: &SiteMapping) -> Result<Vec<BackupMetadata>> {
        self.database_backups(env_uuid, &site.site_directory)
            .await?
            .into_iter()
            .map(|raw| BackupMetadata::from_cloud(site.site_id, raw))
            .collect()
    }
}

fn embedded_items<T: for<'de> Deserialize<'de>>(mut value: Value) -> Result<Vec<T>> {
    let items = value
        .pointer_mut("/_embedded/items")
        .map(Value::take)
        .ok_or_else(|| Error::UnexpectedResponse("Response has no _embedded.items".into()))?;
    Ok(serde_json::from_value(items)?)
}

impl TaskStatusSource for CloudClient {
    async fn task_status(&self, id: &str) -> Result<TaskStatus> {
        let notification = self.notification(id).await?;
        let status = notification
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let completed = notification
            .get("completed_at")
            .and_then(Value::as_str)
            .is_some_and(|at| !at.is_empty());

        Ok(TaskStatus {
            id: id.to_string(),
            completed,
            succeeded: completed && status == "completed",
            status,
        })
    }
}

impl BackupDownloader for CloudClient {
    async fn download_backup(&self, site: &SiteMapping, backup: &BackupMetadata, dest: &Path) -> Result<u64> {
        let environment = self.environment(&site.environment).await?;
        let db_name = backup.database_name().unwrap_or(&site.site_directory);
        let path = format!(
            "/environments/{}/databases/{}/backups/{}/actions/download",
            environment.id, db_name, backup.id
        );
        let url = self.url(&path)?;
        let builder = self.signer.apply(self.http.get(url.clone()), &Method::GET, &url, None)?;

        transfer::stream_to_file(builder.send().await?, dest).await
    }
}

impl SiteBackupApi for CloudClient {
    fn source(&self) -> SourceApi {
        SourceApi::Cloud
    }

    fn supports_labels(&self) -> bool {
        false
    }

    fn check_components(&self, operation: Operation, requested: &[Component]) -> Result<()> {
        if operation != Operation::Sync {
            if requested.iter().any(|c| *c != Component::Database) {
                return Err(Error::config("Acquia Cloud only supports database backups."));
            }
            return Ok(());
        }

        if requested.is_empty() {
            return Err(Error::config("You must provide components to sync."));
        }
        let allowed = [Component::Database, Component::PublicFiles, Component::PrivateFiles];
        let unsupported: Vec<Component> = requested
            .iter()
            .filter(|c| !allowed.contains(c))
            .copied()
            .collect();
        if !unsupported.is_empty() {
            return Err(Error::config(format!(
                "These components are not supported: {}",
                components::join(&unsupported)
            )));
        }
        if requested.contains(&Component::PublicFiles) != requested.contains(&Component::PrivateFiles) {
            return Err(Error::config("If syncing files you must sync both public and private."));
        }
        Ok(())
    }

    fn check_sync_target(&self, target_env: &str) -> Result<()> {
        if target_env == PRODUCTION_ENV {
            return Err(Error::config("You cannot sync data to the PROD environment."));
        }
        Ok(())
    }

    async fn create_backup(&self, site: &SiteMapping, _components: &[Component], _label: Option<&str>) -> Result<String> {
        let environment = self.environment(&site.environment).await?;
        self.create_database_backup(&environment.id, &site.site_directory).await
    }

    async fn list_backups(&self, site: &SiteMapping) -> Result<Vec<BackupMetadata>> {
        let environment = self.environment(&site.environment).await?;
        self.list_site_backups(&environment.id, site).await
    }

    async fn get_backup(&self, site: &SiteMapping, backup_id: u64) -> Result<BackupMetadata> {
        let environment = self.environment(&site.environment).await?;
        let raw = self
            .database_backup(&environment.id, &site.site_directory, backup_id)
            .await?;
        BackupMetadata::from_cloud(site.site_id, raw)
    }

    async fn restore_backup(&self, site: &SiteMapping, backup_id: Option<u64>, _components: &[Component]) -> Result<String> {
        let environment = self.environment(&site.environment).await?;
        let backup_id = match backup_id {
            Some(id) => {
                self.database_backup(&environment.id, &site.site_directory, id)
                    .await?;
                id
            }
            None => self.latest_backup(&environment.id, site).await?.id,
        };

        info!("Restoring backup ID {} for site ID {}", backup_id, site.site_id);
        self.restore_database_backup(&environment.id, &site.site_directory, backup_id)
            .await
    }

    async fn sync_from_production(&self, sites: &[SiteMapping], target_env: &str, requested: &[Component]) -> Result<SyncRequests> {
        self.check_sync_target(target_env)?;
        let production = self.environment(PRODUCTION_ENV).await?;
        let target = self.environment(target_env).await?;
        let mut requests = SyncRequests::default();

        if requested.contains(&Component::Database) {
            for site in sites {
                match self.copy_database(&target.id, &site.site_directory, &production.id).await {
                    Ok(id) => requests.task_ids.push(id),
                    Err(e) => {
                        error!("Failed to copy database {}: {}", site.site_directory, e);
                        requests.failures += 1;
                    }
                }
            }
        }

        if requested.contains(&Component::PublicFiles) {
            match self.copy_files(&target.id, &production.id).await {
                Ok(id) => requests.task_ids.push(id),
                Err(e) => {
                    error!("Failed to copy files to {}: {}", target_env, e);
                    requests.failures += 1;
                }
            }
        }

        Ok(requests)
    }
}
