//! Configuration management for sitectl.
//!
//! Loads configuration from a TOML file with `SITECTL_*` environment variable
//! overrides (`SITECTL_BACKUP__DIR=/srv/backups`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sitectl.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub site_factory: SiteFactoryConfig,

    #[serde(default)]
    pub drush: DrushConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub behat: BehatConfig,

    /// Multisite tenants keyed by normalized site name
    #[serde(default)]
    pub multisites: BTreeMap<String, MultisiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root of the local backup store
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    /// Seconds between two task status sweeps
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum number of status sweeps before giving up
    #[serde(default = "default_poll_iteration_limit")]
    pub poll_iteration_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Application UUID on the Cloud platform
    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default = "default_cloud_base_url")]
    pub base_url: String,

    /// Credentials file; `~/.acquia/cloud_api.conf` when unset
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFactoryConfig {
    /// Factory name used to derive `https://www.<env>-<name>.acsitefactory.com/`
    #[serde(default)]
    pub name: Option<String>,

    /// Explicit API base URL, wins over the derived one
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrushConfig {
    #[serde(default = "default_drush_bin")]
    pub bin: String,

    /// Drupal docroot relative to the project root
    #[serde(default = "default_docroot")]
    pub docroot: PathBuf,

    /// Run `sql-sanitize` after importing a database
    #[serde(default = "default_true")]
    pub sanitize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Paths excluded from file rsyncs
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitConfig {
    /// Regular expression commit subjects must match
    #[serde(default)]
    pub commit_msg_pattern: Option<String>,

    #[serde(default)]
    pub commit_msg_help: Option<String>,

    #[serde(default)]
    pub commit_msg_example: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehatConfig {
    #[serde(default = "default_behat_bin")]
    pub bin: String,

    #[serde(default = "default_behat_config")]
    pub config: PathBuf,

    /// Base tag expression combined with the per-site tag
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultisiteConfig {
    /// Numeric site ID on the remote platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<u64>,

    /// Remote drush alias, `<name>.<env>`
    pub remote: String,

    /// Local drush URI
    pub local: String,

    /// Directory under `sites/` (or `sites/g/files/`)
    pub site_dir: String,

    /// Public host per environment
    #[serde(default)]
    pub uris: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_poll_iteration_limit() -> u32 {
    200
}

fn default_cloud_base_url() -> String {
    "https://cloud.acquia.com/api".to_string()
}

fn default_drush_bin() -> String {
    "drush".to_string()
}

fn default_docroot() -> PathBuf {
    PathBuf::from("docroot")
}

fn default_true() -> bool {
    true
}

fn default_exclude_paths() -> Vec<String> {
    vec!["styles".to_string(), "css".to_string(), "js".to_string()]
}

fn default_behat_bin() -> String {
    "vendor/bin/behat".to_string()
}

fn default_behat_config() -> PathBuf {
    PathBuf::from("tests/behat/local.yml")
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_iteration_limit: default_poll_iteration_limit(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            base_url: default_cloud_base_url(),
            credentials_file: None,
        }
    }
}

impl Default for DrushConfig {
    fn default() -> Self {
        Self {
            bin: default_drush_bin(),
            docroot: default_docroot(),
            sanitize: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            exclude_paths: default_exclude_paths(),
        }
    }
}

impl Default for BehatConfig {
    fn default() -> Self {
        Self {
            bin: default_behat_bin(),
            config: default_behat_config(),
            tags: None,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `sitectl.toml` when present) and
    /// apply `SITECTL_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix("SITECTL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(e.to_string()))
    }

    /// Parse configuration from a TOML document without environment overrides.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Resolved Cloud credentials file path.
    pub fn cloud_credentials_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cloud.credentials_file {
            return Ok(path.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".acquia").join("cloud_api.conf"))
            .ok_or_else(|| Error::config("Unable to determine the home directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[backup]
dir = "/srv/backups"
poll_interval_secs = 5

[site_factory]
name = "example"

[multisites.alpha]
site_id = 101
remote = "alpha.01live"
local = "alpha.local"
site_dir = "alpha"

[multisites.alpha.uris]
01live = "www.alpha.example.com"
"#;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.backup.dir, PathBuf::from("/tmp"));
        assert_eq!(config.backup.poll_interval_secs, 15);
        assert_eq!(config.backup.poll_iteration_limit, 200);
        assert_eq!(config.cloud.base_url, "https://cloud.acquia.com/api");
        assert_eq!(config.sync.exclude_paths, vec!["styles", "css", "js"]);
        assert!(config.drush.sanitize);
        assert!(config.multisites.is_empty());
    }

    #[test]
    fn test_parse_multisites() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.backup.poll_interval_secs, 5);
        assert_eq!(config.backup.poll_iteration_limit, 200);
        let alpha = &config.multisites["alpha"];
        assert_eq!(alpha.site_id, Some(101));
        assert_eq!(alpha.remote, "alpha.01live");
        assert_eq!(alpha.uris["01live"], "www.alpha.example.com");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.site_factory.name.as_deref(), Some("example"));
        assert_eq!(config.multisites["alpha"].site_dir, "alpha");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/sitectl.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_credentials_file_override() {
        let mut config = Config::default();
        config.cloud.credentials_file = Some(PathBuf::from("/etc/cloud_api.conf"));
        assert_eq!(
            config.cloud_credentials_file().unwrap(),
            PathBuf::from("/etc/cloud_api.conf")
        );
    }
}
