//! Cloud API key/secret resolution.
//!
//! Priority: explicit options, then `AC_API_KEY`/`AC_API_SECRET`, then the
//! JSON credentials file (`~/.acquia/cloud_api.conf` by default).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const KEY_ENV: &str = "AC_API_KEY";
pub const SECRET_ENV: &str = "AC_API_SECRET";

/// Where a set of credentials came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Options,
    Environment,
    File(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Options => f.write_str("command options"),
            CredentialSource::Environment => write!(f, "{}/{}", KEY_ENV, SECRET_ENV),
            CredentialSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCredentials {
    pub key: String,
    pub secret: String,
    #[serde(skip)]
    pub source: Option<CredentialSource>,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    secret: Option<String>,
}

impl CloudCredentials {
    /// Resolve credentials using the process environment.
    pub fn resolve(key: Option<&str>, secret: Option<&str>, file: &Path) -> Result<Self> {
        Self::resolve_with(key, secret, |name| std::env::var(name).ok(), file)
    }

    pub fn resolve_with<F>(key: Option<&str>, secret: Option<&str>, env: F, file: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(credentials) = pair(key.map(str::to_string), secret.map(str::to_string), CredentialSource::Options)? {
            return Ok(credentials);
        }

        if let Some(credentials) = pair(env(KEY_ENV), env(SECRET_ENV), CredentialSource::Environment)? {
            return Ok(credentials);
        }

        if !file.is_file() {
            return Err(Error::config(format!(
                "Cloud API credentials file {} not found. Run \"sitectl ac auth set\"",
                file.display()
            )));
        }

        let content = std::fs::read_to_string(file)?;
        let parsed: CredentialsFile = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("Invalid credentials file {}: {}", file.display(), e)))?;

        pair(parsed.key, parsed.secret, CredentialSource::File(file.to_path_buf()))?
            .ok_or_else(|| Error::MissingCredentials {
                source_name: file.display().to_string(),
                fields: vec!["key", "secret"],
            })
    }

    /// Persist as `{"key": ..., "secret": ...}`, readable by the owner only.
    pub fn write_to_file(&self, file: &Path) -> Result<()> {
        if self.key.is_empty() || self.secret.is_empty() {
            return Err(Error::config("You must specify both the api-key and api-secret"));
        }
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(file, serde_json::to_vec_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// Nothing from a source means "try the next one"; half a pair is an error.
fn pair(key: Option<String>, secret: Option<String>, source: CredentialSource) -> Result<Option<CloudCredentials>> {
    let key = key.filter(|k| !k.is_empty());
    let secret = secret.filter(|s| !s.is_empty());

    match (key, secret) {
        (None, None) => Ok(None),
        (Some(key), Some(secret)) => Ok(Some(CloudCredentials {
            key,
            secret,
            source: Some(source),
        })),
        (key, _) => {
            let (key_field, secret_field) = match source {
                CredentialSource::Options => ("api-key", "api-secret"),
                CredentialSource::Environment => (KEY_ENV, SECRET_ENV),
                CredentialSource::File(_) => ("key", "secret"),
            };
            Err(Error::MissingCredentials {
                source_name: source.to_string(),
                fields: vec![if key.is_none() { key_field } else { secret_field }],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_options_win_over_environment() {
        let creds = CloudCredentials::resolve_with(
            Some("opt-key"),
            Some("opt-secret"),
            env(&[(KEY_ENV, "env-key"), (SECRET_ENV, "env-secret")]),
            Path::new("/nonexistent"),
        )
        .unwrap();
        assert_eq!(creds.key, "opt-key");
        assert_eq!(creds.source, Some(CredentialSource::Options));
    }

    #[test]
    fn test_environment_before_file() {
        let creds = CloudCredentials::resolve_with(
            None,
            None,
            env(&[(KEY_ENV, "env-key"), (SECRET_ENV, "env-secret")]),
            Path::new("/nonexistent"),
        )
        .unwrap();
        assert_eq!(creds.secret, "env-secret");
        assert_eq!(creds.source, Some(CredentialSource::Environment));
    }

    #[test]
    fn test_partial_source_names_missing_field() {
        let err = CloudCredentials::resolve_with(None, None, env(&[(KEY_ENV, "k")]), Path::new("/x")).unwrap_err();
        assert!(err.to_string().contains(SECRET_ENV));

        let err = CloudCredentials::resolve_with(None, Some("s"), env(&[]), Path::new("/x")).unwrap_err();
        assert!(err.to_string().contains("api-key"));
    }

    #[test]
    fn test_missing_file_hints_at_auth_set() {
        let err = CloudCredentials::resolve_with(None, None, env(&[]), Path::new("/nonexistent/cloud_api.conf"))
            .unwrap_err();
        assert!(err.to_string().contains("sitectl ac auth set"));
    }

    #[test]
    fn test_file_round_trip() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(".acquia").join("cloud_api.conf");
        let creds = CloudCredentials {
            key: "file-key".into(),
            secret: "file-secret".into(),
            source: None,
        };
        creds.write_to_file(&file).unwrap();

        let loaded = CloudCredentials::resolve_with(None, None, env(&[]), &file).unwrap();
        assert_eq!(loaded.key, "file-key");
        assert_eq!(loaded.source, Some(CredentialSource::File(file.clone())));

        std::fs::write(&file, r#"{"key": "only-key"}"#).unwrap();
        let err = CloudCredentials::resolve_with(None, None, env(&[]), &file).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials { .. }));
        assert!(err.to_string().contains("secret"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = CloudCredentials {
            key: "k".into(),
            secret: "hunter2".into(),
            source: None,
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
