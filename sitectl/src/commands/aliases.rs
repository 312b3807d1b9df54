//! `aliases generate`: build the `[multisites]` table from the hosting data
//! of one Cloud environment.

use crate::api::cloud::{Application, Environment};
use crate::api::CloudClient;
use crate::config::MultisiteConfig;
use crate::utils::shell;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{error, info};

pub const DEFAULT_ENV: &str = "01dev";

const ACSF_DOMAIN: &str = ".acsitefactory.com";

#[derive(Debug, Default, Serialize)]
struct Snippet {
    multisites: BTreeMap<String, MultisiteConfig>,
}

/// `<user>@<host>` → `<user>`
fn remote_user(ssh_url: &str) -> Result<&str> {
    ssh_url
        .split_once('@')
        .map(|(user, _)| user)
        .filter(|user| !user.is_empty())
        .ok_or_else(|| Error::UnexpectedResponse(format!("Malformed SSH URL: {}", ssh_url)))
}

/// Fetch `sites.json` from the environment's shared files over ssh.
fn fetch_sites_json(environment: &Environment) -> Result<Value> {
    let user = remote_user(&environment.ssh_url)?;
    let mut command = Command::new("ssh");
    command
        .arg(&environment.ssh_url)
        .arg(format!("cat /mnt/files/{}/files-private/sites.json", user));
    let content = shell::output_lines(&mut command)?.join("\n");
    Ok(serde_json::from_str(&content)?)
}

/// Sites on the `*.acsitefactory.com` domains of a `sites.json` document,
/// keyed by normalized name (domain prefix without leading digits).
/// Collections listed after their primary site are ignored.
pub fn sites_from_json(sites_json: &Value, env: &str) -> BTreeMap<String, MultisiteConfig> {
    let mut seen_dirs = Vec::new();
    let mut sites = BTreeMap::new();

    let Some(entries) = sites_json.get("sites").and_then(Value::as_object) else {
        return sites;
    };

    for (domain, info) in entries {
        if !domain.contains(ACSF_DOMAIN) {
            continue;
        }
        let Some(site_dir) = info.get("name").and_then(Value::as_str) else {
            continue;
        };
        if seen_dirs.iter().any(|d| d == site_dir) {
            continue;
        }
        seen_dirs.push(site_dir.to_string());

        let prefix = domain.split('.').next().unwrap_or(domain);
        let normalized = prefix.trim_start_matches(|c: char| c.is_ascii_digit());
        let normalized = if normalized.is_empty() { prefix } else { normalized };

        let site_id = info
            .pointer("/conf/acsf_site_id")
            .and_then(|id| id.as_u64().or_else(|| id.as_str().and_then(|s| s.parse().ok())));

        sites.insert(
            normalized.to_string(),
            MultisiteConfig {
                site_id,
                remote: format!("{}.{}", prefix, env),
                local: format!("{}.local", normalized),
                site_dir: site_dir.to_string(),
                uris: BTreeMap::from([(env.to_string(), domain.clone())]),
            },
        );
    }

    sites
}

/// The single site of an `ace` application.
pub fn ace_site(application: &Application, environment: &Environment, env: &str) -> Result<(String, MultisiteConfig)> {
    let hosting_id = application
        .hosting
        .as_ref()
        .map(|h| h.id.as_str())
        .unwrap_or_default();
    let name = hosting_id
        .split_once(':')
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::UnexpectedResponse(format!("Malformed hosting ID: {}", hosting_id)))?;

    let mut uris = BTreeMap::new();
    if let Some(domain) = environment.domains.first() {
        uris.insert(env.to_string(), domain.clone());
    }

    Ok((
        name.to_string(),
        MultisiteConfig {
            site_id: None,
            remote: format!("{}.{}", name, env),
            local: format!("{}.local", name),
            site_dir: "default".to_string(),
            uris,
        },
    ))
}

pub fn render(multisites: BTreeMap<String, MultisiteConfig>) -> Result<String> {
    toml::to_string(&Snippet { multisites })
        .map_err(|e| Error::config(format!("Could not render multisites: {}", e)))
}

pub async fn generate(client: &CloudClient, env: &str) -> Result<i32> {
    info!("Gathering site info from Acquia Cloud.");
    let application = client.application(client.app_id()?).await?;
    let environment = client.environment(env).await?;
    info!(
        "Found {} domains for environment {}",
        environment.domains.len(),
        environment.name
    );

    let hosting = application.hosting.as_ref().map(|h| h.kind.as_str()).unwrap_or("ace");
    let multisites = match hosting {
        "acsf" => {
            info!("ACSF project detected - generating sites data....");
            match fetch_sites_json(&environment) {
                Ok(sites_json) => sites_from_json(&sites_json, env),
                Err(e) => {
                    error!("Could not fetch acsf data for {}. Error: {}", environment.name, e);
                    return Ok(1);
                }
            }
        }
        _ => BTreeMap::from([ace_site(&application, &environment, env)?]),
    };

    if multisites.is_empty() {
        error!("Did not find any sites for {}", application.name);
        return Ok(1);
    }

    print!("{}", render(multisites)?);
    Ok(0)
}
