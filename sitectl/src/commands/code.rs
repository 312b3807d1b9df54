//! `ac code`: list and find git refs, deploy one to an environment.

use crate::api::CloudClient;
use crate::commands::prompt::{self, Prompt};
use crate::poller::TaskPoller;
use crate::{Error, Result};
use tracing::{error, info};

fn require_gitref(gitref: &str) -> Result<&str> {
    let gitref = gitref.trim();
    if gitref.is_empty() {
        return Err(Error::config("You must specify a gitref."));
    }
    Ok(gitref)
}

pub async fn list(client: &CloudClient) -> Result<i32> {
    info!("Listing code on the application");
    let refs = client.code_refs().await?;
    println!("Available gitrefs:");
    for code_ref in refs {
        let kind = if code_ref.flags.tag { "tag" } else { "branch" };
        println!("    {} ({})", code_ref.name, kind);
    }
    Ok(0)
}

/// Exit 0 when `gitref` exists as a branch or tag, 1 otherwise.
pub async fn find(client: &CloudClient, gitref: &str) -> Result<i32> {
    let gitref = require_gitref(gitref)?;
    info!("Finding {}", gitref);

    if client.code_refs().await?.iter().any(|r| r.name == gitref) {
        println!("Gitref {} is found!", gitref);
        Ok(0)
    } else {
        println!("Could not find the gitref {}", gitref);
        Ok(1)
    }
}

/// Switch `target_env` to `gitref` and wait for the deployment.
pub async fn checkout(client: &CloudClient, poller: &TaskPoller, prompt: &Prompt, target_env: &str, gitref: &str) -> Result<i32> {
    let gitref = require_gitref(gitref)?;

    let summary = prompt::environment_summary(&[format!("Check out {}", gitref)], target_env)?;
    if !prompt.confirm(&summary)? {
        return Ok(0);
    }

    info!("Checking out {} on {}", gitref, target_env);
    let environment = client.environment(target_env).await?;
    let notification = client.switch_code(&environment.id, gitref).await?;

    if poller.wait(client, &[notification]).await {
        info!("{} is deployed to {}", gitref, target_env);
        Ok(0)
    } else {
        error!("Failed to check out {} on {}", gitref, target_env);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::cloud::credentials::CloudCredentials;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> CloudClient {
        Mock::given(method("GET"))
            .and(path("/applications/app/code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"items": [
                    {"name": "main", "flags": {"tag": false}},
                    {"name": "tags/1.0.0", "flags": {"tag": true}}
                ]}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/applications/app/environments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"items": [{"id": "test-uuid", "name": "test", "label": "01test"}]}
            })))
            .mount(server)
            .await;
        let credentials = CloudCredentials {
            key: "k".into(),
            secret: "c2VjcmV0".into(),
            source: None,
        };
        CloudClient::new(server.uri(), Some("app".into()), &credentials).unwrap()
    }

    #[tokio::test]
    async fn test_find_gitref() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        assert_eq!(find(&client, "tags/1.0.0").await.unwrap(), 0);
        assert_eq!(find(&client, "feature/x").await.unwrap(), 1);
        assert!(find(&client, " ").await.is_err());
        assert_eq!(list(&client).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_checkout_waits_for_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/environments/test-uuid/code/actions/switch"))
            .and(body_json(json!({"branch": "tags/1.0.0"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "_links": {"notification": {"href": "https://cloud.acquia.com/api/notifications/n1"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/notifications/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed", "completed_at": "2024-05-01T00:00:00+00:00"
            })))
            .mount(&server)
            .await;
        let client = client(&server).await;
        let poller = TaskPoller::new(Duration::from_millis(1), 3);

        let code = checkout(&client, &poller, &Prompt::new(true), "01test", "tags/1.0.0")
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
