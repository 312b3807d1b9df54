//! `tests behat`: run the behat suite once per site against its remote URL.

use crate::config::BehatConfig;
use crate::sites::SiteMapping;
use crate::utils::shell;
use crate::{Error, Result};
use serde_json::json;
use std::process::Command;
use tracing::{error, info};

pub const TARGET_ENVS: [&str; 3] = ["01dev", "01test", "01live"];

pub fn check_target_env(target_env: &str) -> Result<()> {
    if TARGET_ENVS.contains(&target_env) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "The target-env parameter must be one of: {}",
            TARGET_ENVS.join(", ")
        )))
    }
}

/// Tests tagged with the site, narrowed by the configured base expression,
/// plus everything tagged `all`.
pub fn tags(base: Option<&str>, site: &str) -> String {
    match base.filter(|b| !b.is_empty()) {
        Some(base) => format!("{}&&{},all", base, site),
        None => format!("{},all", site),
    }
}

/// `BEHAT_PARAMS` pointing Mink at `base_url`.
pub fn behat_params(base_url: &str) -> String {
    json!({"extensions": {"Behat\\MinkExtension": {"base_url": base_url}}}).to_string()
}

pub fn behat_command(config: &BehatConfig, site: &SiteMapping) -> Result<Command> {
    let base_url = site.remote_url.as_deref().ok_or_else(|| {
        Error::config(format!(
            "No URI configured for {} on {}; add it under [multisites.{}.uris]",
            site.normalized_name, site.environment, site.normalized_name
        ))
    })?;

    let mut command = Command::new(&config.bin);
    command
        .arg("--config")
        .arg(&config.config)
        .arg("--tags")
        .arg(tags(config.tags.as_deref(), &site.normalized_name))
        .env("BEHAT_PARAMS", behat_params(base_url));
    Ok(command)
}

/// Exit 1 when any site's run fails; every site is still attempted.
pub fn run(config: &BehatConfig, sites: &[SiteMapping]) -> Result<i32> {
    let commands = sites
        .iter()
        .map(|site| behat_command(config, site).map(|command| (site, command)))
        .collect::<Result<Vec<_>>>()?;

    let mut result = 0;
    for (site, mut command) in commands {
        info!("Running test suite for {}...", site.normalized_name);
        if let Err(e) = shell::run(&mut command) {
            error!("Test suite failed for {}: {}", site.normalized_name, e);
            result = 1;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(name: &str, remote_url: Option<&str>) -> SiteMapping {
        SiteMapping {
            normalized_name: name.into(),
            remote_alias: format!("{}.01test", name),
            remote_is_default: false,
            remote_url: remote_url.map(str::to_string),
            local_url: format!("{}.local", name),
            site_directory: name.into(),
            site_id: 1,
            environment: "01test".into(),
        }
    }

    #[test]
    fn test_tags() {
        assert_eq!(tags(None, "walden"), "walden,all");
        assert_eq!(tags(Some(""), "walden"), "walden,all");
        assert_eq!(tags(Some("~@wip"), "walden"), "~@wip&&walden,all");
    }

    #[test]
    fn test_behat_params() {
        let params: serde_json::Value = serde_json::from_str(&behat_params("https://test.walden.edu")).unwrap();
        assert_eq!(
            params["extensions"]["Behat\\MinkExtension"]["base_url"],
            "https://test.walden.edu"
        );
    }

    #[test]
    fn test_target_env() {
        assert!(check_target_env("01test").is_ok());
        assert!(check_target_env("prod").is_err());
    }

    #[test]
    fn test_run_reports_failures() {
        let sites = vec![site("walden", Some("https://test.walden.edu"))];
        let passing = BehatConfig {
            bin: "true".into(),
            ..Default::default()
        };
        assert_eq!(run(&passing, &sites).unwrap(), 0);

        let failing = BehatConfig {
            bin: "false".into(),
            ..Default::default()
        };
        assert_eq!(run(&failing, &sites).unwrap(), 1);
    }

    #[test]
    fn test_missing_remote_url_is_config_error() {
        let config = BehatConfig::default();
        assert!(run(&config, &[site("walden", None)]).is_err());
    }
}
