//! Canonical backup description shared by both remote APIs and the local
//! store.

use crate::components::{self, Component};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component as PathComponent, Path};

/// Which remote API produced a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceApi {
    #[serde(rename = "ac")]
    Cloud,
    #[serde(rename = "acsf")]
    SiteFactory,
}

impl fmt::Display for SourceApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceApi::Cloud => f.write_str("ac"),
            SourceApi::SiteFactory => f.write_str("acsf"),
        }
    }
}

/// One backup, as persisted in the `<file>.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub id: u64,
    pub site_id: u64,
    /// Unix seconds of completion
    pub timestamp: i64,
    /// Artifact file name, unique per site and environment
    pub file: String,
    #[serde(default)]
    pub label: String,
    pub component_list: Vec<Component>,
    pub backup_api: SourceApi,
    /// Response the metadata was built from
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Backup entry as returned by the Site Factory API.
#[derive(Debug, Deserialize)]
struct FactoryBackup {
    id: u64,
    nid: u64,
    timestamp: i64,
    file: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "componentList", default)]
    component_list: Vec<Component>,
}

/// Database backup entry as returned by the Cloud API.
#[derive(Debug, Deserialize)]
struct CloudBackup {
    id: u64,
    database: CloudDatabase,
    completed_at: String,
}

#[derive(Debug, Deserialize)]
struct CloudDatabase {
    name: String,
}

impl BackupMetadata {
    /// Normalize a Site Factory backup entry.
    pub fn from_site_factory(raw: serde_json::Value) -> Result<Self> {
        let backup: FactoryBackup = serde_json::from_value(raw.clone())
            .map_err(|e| Error::UnexpectedResponse(format!("Invalid backup entry: {}", e)))?;

        validate_file_name(&backup.file)?;

        Ok(Self {
            id: backup.id,
            site_id: backup.nid,
            timestamp: backup.timestamp,
            file: backup.file,
            label: backup.label.unwrap_or_default(),
            component_list: backup.component_list,
            backup_api: SourceApi::SiteFactory,
            raw,
        })
    }

    /// Normalize a Cloud database backup. The file name is synthesized from
    /// the completion time, database name and backup ID, and the component
    /// list is always `[database]`.
    pub fn from_cloud(site_id: u64, raw: serde_json::Value) -> Result<Self> {
        let backup: CloudBackup = serde_json::from_value(raw.clone())
            .map_err(|e| Error::UnexpectedResponse(format!("Invalid backup entry: {}", e)))?;

        let completed_at = DateTime::parse_from_rfc3339(&backup.completed_at)
            .map_err(|e| {
                Error::UnexpectedResponse(format!(
                    "Invalid completed_at {}: {}",
                    backup.completed_at, e
                ))
            })?
            .with_timezone(&Utc);

        let file = format!(
            "backup-{}-{}-{}.sql.gz",
            completed_at.format("%Y-%m-%d-%H-%M"),
            backup.database.name,
            backup.id
        );
        validate_file_name(&file)?;

        Ok(Self {
            id: backup.id,
            site_id,
            timestamp: completed_at.timestamp(),
            file,
            label: String::new(),
            component_list: vec![Component::Database],
            backup_api: SourceApi::Cloud,
            raw,
        })
    }

    /// Database name a Cloud backup belongs to.
    pub fn database_name(&self) -> Option<&str> {
        self.raw
            .get("database")
            .and_then(|d| d.get("name"))
            .and_then(|n| n.as_str())
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// The backup holds every one of `requested`.
    pub fn contains_all(&self, requested: &[Component]) -> bool {
        components::is_subset(requested, &self.component_list)
    }

    /// The backup holds exactly `requested`; an empty request matches anything.
    pub fn matches_exactly(&self, requested: &[Component]) -> bool {
        requested.is_empty() || components::same_set(requested, &self.component_list)
    }

    pub fn summary(&self) -> String {
        let when = self
            .completed_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.timestamp.to_string());
        let label = if self.label.is_empty() {
            String::new()
        } else {
            format!(" [{}]", self.label)
        };
        format!(
            "{:>10}  {}  {}  ({}){}",
            self.id,
            when,
            self.file,
            components::join(&self.component_list),
            label
        )
    }
}

/// Entry with the greatest timestamp. On a tie the first one seen wins.
pub fn latest<'a, I>(backups: I) -> Option<&'a BackupMetadata>
where
    I: IntoIterator<Item = &'a BackupMetadata>,
{
    backups.into_iter().fold(None, |best, backup| match best {
        Some(current) if current.timestamp >= backup.timestamp => Some(current),
        _ => Some(backup),
    })
}

/// A backup file name must be a single plain path segment so it cannot
/// leave the store directory it is joined onto.
pub fn validate_file_name(file: &str) -> Result<()> {
    let mut parts = Path::new(file).components();
    match (parts.next(), parts.next()) {
        (Some(PathComponent::Normal(_)), None) => Ok(()),
        _ => Err(Error::InvalidInput(format!("Unsafe backup file name: {:?}", file))),
    }
}
