//! Remote API clients and the capability interface the orchestrators use.
//!
//! Both the Cloud API and the Site Factory API implement [`SiteBackupApi`];
//! the site-data commands are written once against that trait.

pub mod cloud;
pub mod factory;

use crate::backup::{BackupMetadata, SourceApi};
use crate::components::Component;
use crate::sites::SiteMapping;
use crate::{Error, Result};
use std::fmt;
use std::path::Path;

pub use cloud::CloudClient;
pub use factory::FactoryClient;

/// Status of one asynchronous remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub id: String,
    /// The remote reports a completion time.
    pub completed: bool,
    /// Terminal status equals the API's success value.
    pub succeeded: bool,
    /// Raw status as reported, for logs.
    pub status: String,
}

/// Anything that can report on task or notification IDs.
#[allow(async_fn_in_trait)]
pub trait TaskStatusSource {
    async fn task_status(&self, id: &str) -> Result<TaskStatus>;
}

/// Streams backup artifacts to disk.
#[allow(async_fn_in_trait)]
pub trait BackupDownloader {
    /// Stream `backup` for `site` into `dest`, returning the bytes written.
    /// Anything other than HTTP 200 fails before `dest` is created.
    async fn download_backup(&self, site: &SiteMapping, backup: &BackupMetadata, dest: &Path) -> Result<u64>;
}

/// Site-data operations, used to validate component lists per API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Backup,
    Download,
    List,
    Restore,
    Sync,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Backup => "backup",
            Operation::Download => "download",
            Operation::List => "list",
            Operation::Restore => "restore",
            Operation::Sync => "sync",
        };
        f.write_str(name)
    }
}

/// Task IDs issued by a sync plus the number of requests that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequests {
    pub task_ids: Vec<String>,
    pub failures: usize,
}

#[allow(async_fn_in_trait)]
pub trait SiteBackupApi: TaskStatusSource + BackupDownloader {
    fn source(&self) -> SourceApi;

    fn supports_labels(&self) -> bool;

    /// Reject component lists the API cannot act on for `operation`.
    fn check_components(&self, operation: Operation, components: &[Component]) -> Result<()>;

    /// Reject environments a production sync may not target.
    fn check_sync_target(&self, target_env: &str) -> Result<()>;

    /// Start a backup; returns the task ID to poll.
    async fn create_backup(&self, site: &SiteMapping, components: &[Component], label: Option<&str>) -> Result<String>;

    async fn list_backups(&self, site: &SiteMapping) -> Result<Vec<BackupMetadata>>;

    async fn get_backup(&self, site: &SiteMapping, backup_id: u64) -> Result<BackupMetadata>;

    /// Start a restore from `backup_id`, or from the latest backup when
    /// `None`; returns the task ID to poll.
    async fn restore_backup(&self, site: &SiteMapping, backup_id: Option<u64>, components: &[Component]) -> Result<String>;

    /// Copy production data down to `target_env` for `sites`.
    async fn sync_from_production(&self, sites: &[SiteMapping], target_env: &str, components: &[Component]) -> Result<SyncRequests>;

    /// Git ref currently deployed, used for automatic labels.
    async fn deployed_ref(&self) -> Result<String> {
        Err(Error::config(format!(
            "The {} API does not report the deployed git ref",
            self.source()
        )))
    }
}

/// Last path segment of a notification link.
pub(crate) fn notification_id(href: &str) -> Result<String> {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::UnexpectedResponse(format!("Invalid notification link: {}", href)))
}

/// Turn a non-success response into `Error::Remote` carrying its body.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    Err(Error::remote(status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_id_is_last_segment() {
        assert_eq!(
            notification_id("https://cloud.acquia.com/api/notifications/6992a41d-8b9d").unwrap(),
            "6992a41d-8b9d"
        );
        assert_eq!(notification_id("/notifications/abc/").unwrap(), "abc");
        assert!(notification_id("").is_err());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Restore.to_string(), "restore");
    }
}
