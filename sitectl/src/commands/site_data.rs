//! Remote site-data orchestration shared by the Cloud and Site Factory
//! commands: backup, download, list, restore and sync.
//!
//! Every run walks the same stages: select sites, confirm, issue one
//! request per site, poll the collected task IDs, report. A failed request
//! counts against that site and the remaining sites are still attempted.
//! The returned exit code is the number of failed sites; a run in which no
//! request succeeds is a fatal error instead.

use crate::api::{Operation, SiteBackupApi};
use crate::backup::{latest, BackupMetadata, LocalBackupStore, SourceApi};
use crate::commands::prompt::{self, Direction, Prompt};
use crate::components::{self, Component};
use crate::poller::TaskPoller;
use crate::sites::SiteMapping;
use crate::{Error, Result};
use std::fmt;
use tracing::{error, info};

/// Label strategies for `--autolabel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AutoLabel {
    Predeploy,
    Prerollback,
}

impl fmt::Display for AutoLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoLabel::Predeploy => f.write_str("predeploy"),
            AutoLabel::Prerollback => f.write_str("prerollback"),
        }
    }
}

/// Components used when `--components` is not given.
pub fn default_components(source: SourceApi, operation: Operation) -> Vec<Component> {
    use Component::*;
    match (source, operation) {
        (_, Operation::List) => Vec::new(),
        (SourceApi::Cloud, Operation::Sync) => vec![Database, PublicFiles, PrivateFiles],
        (SourceApi::Cloud, _) => vec![Database],
        (SourceApi::SiteFactory, Operation::Restore) => vec![Database, PublicFiles, PrivateFiles, Themes],
        (SourceApi::SiteFactory, _) => Component::ALL.to_vec(),
    }
}

/// Filters for `site-data list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub components: Vec<Component>,
    pub backup_id: Option<u64>,
    pub latest: bool,
    pub label: Option<String>,
}

impl ListFilter {
    /// Apply the filter to one site's backups. A backup ID wins over every
    /// other criterion; otherwise the component set must match exactly, the
    /// label must be equal, and `latest` keeps the newest survivor.
    pub fn apply(&self, backups: Vec<BackupMetadata>) -> Vec<BackupMetadata> {
        if let Some(id) = self.backup_id {
            return backups.into_iter().filter(|b| b.id == id).take(1).collect();
        }

        let matching: Vec<BackupMetadata> = backups
            .into_iter()
            .filter(|b| b.matches_exactly(&self.components))
            .filter(|b| self.label.as_deref().map_or(true, |label| b.label == label))
            .collect();

        if self.latest {
            latest(&matching).cloned().into_iter().collect()
        } else {
            matching
        }
    }
}

pub struct SiteData<'a, A> {
    api: &'a A,
    poller: TaskPoller,
    store: LocalBackupStore,
    prompt: Prompt,
}

impl<'a, A: SiteBackupApi> SiteData<'a, A> {
    pub fn new(api: &'a A, poller: TaskPoller, store: LocalBackupStore, prompt: Prompt) -> Self {
        Self {
            api,
            poller,
            store,
            prompt,
        }
    }

    fn confirm(&self, operations: &[String], sites: &[SiteMapping], direction: Direction) -> Result<bool> {
        let summary = prompt::site_summary(operations, sites, direction)?;
        self.prompt.confirm(&summary)
    }

    fn require_labels(&self) -> Result<()> {
        if !self.api.supports_labels() {
            return Err(Error::config(format!(
                "Labels are not supported by the {} API",
                self.api.source()
            )));
        }
        Ok(())
    }

    /// `--label` as given, or `<deployed ref>-<strategy>` for `--autolabel`.
    pub async fn resolve_label(&self, label: Option<&str>, autolabel: Option<AutoLabel>) -> Result<Option<String>> {
        let label = label.filter(|l| !l.is_empty());
        match (label, autolabel) {
            (Some(_), Some(_)) => Err(Error::config("You cannot use label and autolabel at the same time.")),
            (Some(label), None) => {
                self.require_labels()?;
                Ok(Some(label.to_string()))
            }
            (None, Some(strategy)) => {
                self.require_labels()?;
                let git_ref = self.api.deployed_ref().await?;
                Ok(Some(format!("{}-{}", git_ref, strategy)))
            }
            (None, None) => Ok(None),
        }
    }

    /// Wait for `task_ids`; when the wait fails every polled task counts
    /// as a failed site.
    async fn finish(&self, mut failures: usize, task_ids: &[String], action: &str) -> Result<i32> {
        if task_ids.is_empty() {
            return Err(Error::Remote {
                status: None,
                message: format!("No {} requests succeeded", action),
            });
        }

        if self.poller.wait(self.api, task_ids).await {
            info!("All {} tasks completed", action);
        } else {
            error!("Not all {} tasks completed successfully", action);
            failures += task_ids.len();
        }

        Ok(exit_code(failures))
    }

    pub async fn backup(&self, sites: &[SiteMapping], requested: &[Component], label: Option<&str>) -> Result<i32> {
        self.api.check_components(Operation::Backup, requested)?;
        if label.is_some() {
            self.require_labels()?;
        }

        let with_label = label
            .map(|l| format!(" with label \"{}\"", l))
            .unwrap_or_default();
        let operations = vec![format!(
            "Generate site backup of {}{}",
            components::join(requested),
            with_label
        )];
        if !self.confirm(&operations, sites, Direction::RemoteOnly)? {
            return Ok(0);
        }

        info!("Generating site backups of {}", components::join(requested));
        let mut failures = 0;
        let mut task_ids = Vec::new();
        for site in sites {
            match self.api.create_backup(site, requested, label).await {
                Ok(task_id) => {
                    info!("Backup started for site ID {}. Task ID: {}.", site.site_id, task_id);
                    task_ids.push(task_id);
                }
                Err(e) => {
                    error!("Failed to back up site ID {}: {}", site.site_id, e);
                    failures += 1;
                }
            }
        }

        self.finish(failures, &task_ids, "backup").await
    }

    pub async fn download(&self, sites: &[SiteMapping], requested: &[Component], backup_id: Option<u64>) -> Result<i32> {
        self.api.check_components(Operation::Download, requested)?;
        require_single_site(sites, backup_id, "downloading")?;

        let operations = vec![format!("Downloading backups with {}", describe_components(requested))];
        if !self.confirm(&operations, sites, Direction::RemoteToLocal)? {
            return Ok(0);
        }

        let mut failures = 0;
        let mut downloads: Vec<(&SiteMapping, BackupMetadata)> = Vec::new();
        for site in sites {
            let found = match backup_id {
                Some(id) => self.api.get_backup(site, id).await.map(Some),
                None => self.api.list_backups(site).await.map(|backups| {
                    let matching: Vec<&BackupMetadata> =
                        backups.iter().filter(|b| b.matches_exactly(requested)).collect();
                    latest(matching).cloned()
                }),
            };

            match found {
                Ok(Some(backup)) => downloads.push((site, backup)),
                Ok(None) => {
                    error!("Unable to find backup for site ID {}", site.site_id);
                    failures += 1;
                }
                Err(e) => {
                    error!("Failed to get backups for site ID {}: {}", site.site_id, e);
                    failures += 1;
                }
            }
        }

        if downloads.is_empty() {
            return Err(Error::NotFound("No backups to download".into()));
        }

        for (site, backup) in downloads {
            if self.store.has_available_backup(&backup) {
                info!(
                    "Loading file from path instead of downloading backup ID {}",
                    backup.id
                );
                continue;
            }
            if let Err(e) = self.store.download_and_save(self.api, site, &backup).await {
                error!("Failed to download backup ID {}: {}", backup.id, e);
                failures += 1;
            }
        }

        Ok(exit_code(failures))
    }

    pub async fn list(&self, sites: &[SiteMapping], filter: &ListFilter) -> Result<i32> {
        self.api.check_components(Operation::List, &filter.components)?;
        require_single_site(sites, filter.backup_id, "listing")?;
        if filter.label.is_some() {
            self.require_labels()?;
        }

        let mut operations = vec![format!("Listing backups with {}", describe_components(&filter.components))];
        if let Some(label) = &filter.label {
            operations.push(format!("Filtering by label {}", label));
        }
        if !self.confirm(&operations, sites, Direction::RemoteOnly)? {
            return Ok(0);
        }

        let mut failures = 0;
        for site in sites {
            let backups = match self.api.list_backups(site).await {
                Ok(backups) => filter.apply(backups),
                Err(e) => {
                    error!("Failed to get backup list for site ID {}: {}", site.site_id, e);
                    failures += 1;
                    continue;
                }
            };

            println!("Backups for site ID: {}", site.site_id);
            print_backups(&backups);
        }

        Ok(exit_code(failures))
    }

    pub async fn restore(
        &self,
        sites: &[SiteMapping],
        requested: &[Component],
        backup_id: Option<u64>,
        label: Option<&str>,
    ) -> Result<i32> {
        self.api.check_components(Operation::Restore, requested)?;
        if label.is_some() && backup_id.is_some() {
            return Err(Error::config(
                "You cannot use the label flag with the backup-id flag at the same time.",
            ));
        }
        require_single_site(sites, backup_id, "restoring")?;

        let targets: Vec<(&SiteMapping, Option<u64>)> = match label {
            Some(label) => {
                self.require_labels()?;
                let operations = vec![format!("Finding backup with the label {}", label)];
                if !self.confirm(&operations, sites, Direction::RemoteOnly)? {
                    return Ok(0);
                }
                let resolved = self.backups_by_label(sites, requested, label).await?;

                let operations = vec!["Restoring sites from backups".to_string()];
                if !self.confirm(&operations, sites, Direction::RemoteOnly)? {
                    return Ok(0);
                }
                resolved
                    .into_iter()
                    .map(|(site, backup)| (site, Some(backup.id)))
                    .collect()
            }
            None => {
                let what = if requested.is_empty() {
                    "all components".to_string()
                } else {
                    components::join(requested)
                };
                let from = match backup_id {
                    Some(id) => format!("backup ID {}", id),
                    None => "latest backup".to_string(),
                };
                let operations = vec![format!("Restoring {} to site from {}", what, from)];
                if !self.confirm(&operations, sites, Direction::RemoteOnly)? {
                    return Ok(0);
                }
                sites.iter().map(|site| (site, backup_id)).collect()
            }
        };

        let mut failures = 0;
        let mut task_ids = Vec::new();
        for (site, id) in targets {
            match self.api.restore_backup(site, id, requested).await {
                Ok(task_id) => {
                    info!("Restore started for site ID {}. Task ID: {}.", site.site_id, task_id);
                    task_ids.push(task_id);
                }
                Err(e) => {
                    error!("Failed to restore site ID {}: {}", site.site_id, e);
                    failures += 1;
                }
            }
        }

        self.finish(failures, &task_ids, "restore").await
    }

    /// Newest backup per site carrying `label` and every requested
    /// component. Fails unless every site has one.
    async fn backups_by_label<'s>(
        &self,
        sites: &'s [SiteMapping],
        requested: &[Component],
        label: &str,
    ) -> Result<Vec<(&'s SiteMapping, BackupMetadata)>> {
        let mut resolved = Vec::with_capacity(sites.len());
        for site in sites {
            let backups = match self.api.list_backups(site).await {
                Ok(backups) => backups,
                Err(e) => {
                    error!("Failed to get backup list for site ID {}: {}", site.site_id, e);
                    Vec::new()
                }
            };
            let candidates: Vec<&BackupMetadata> = backups
                .iter()
                .filter(|b| b.label == label && b.contains_all(requested))
                .collect();
            match latest(candidates) {
                Some(backup) => resolved.push((site, backup.clone())),
                None => error!("No backup labelled {} for site ID {}", label, site.site_id),
            }
        }

        if resolved.len() != sites.len() {
            return Err(Error::NotFound(format!(
                "Could not find backup for a site using label {}",
                label
            )));
        }
        Ok(resolved)
    }

    pub async fn sync(&self, sites: &[SiteMapping], target_env: &str, requested: &[Component]) -> Result<i32> {
        self.api.check_sync_target(target_env)?;
        self.api.check_components(Operation::Sync, requested)?;

        let mut operations = vec![format!("Sync from PROD env to {}", target_env)];
        if !requested.is_empty() {
            operations.push(format!("Components: {}", components::join(requested)));
        }
        if !self.confirm(&operations, sites, Direction::RemoteOnly)? {
            return Ok(0);
        }

        info!("Syncing sites from PROD to {}", target_env);
        let requests = self
            .api
            .sync_from_production(sites, target_env, requested)
            .await?;
        self.finish(requests.failures, &requests.task_ids, "sync").await
    }
}

fn require_single_site(sites: &[SiteMapping], backup_id: Option<u64>, action: &str) -> Result<()> {
    if backup_id.is_some() && sites.len() != 1 {
        return Err(Error::config(format!(
            "When {} a specific backup ID you must also specify a single site.",
            action
        )));
    }
    Ok(())
}

fn describe_components(requested: &[Component]) -> String {
    if requested.is_empty() {
        "any components".to_string()
    } else {
        components::join(requested)
    }
}

pub(crate) fn print_backups(backups: &[BackupMetadata]) {
    if backups.is_empty() {
        println!("No backups found matching parameters.");
        return;
    }
    println!("{:>10}  {:<23}  {}", "Backup ID", "Completed", "File (components) [label]");
    for backup in backups {
        println!("{}", backup.summary());
    }
}

fn exit_code(failures: usize) -> i32 {
    i32::try_from(failures).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BackupDownloader, FactoryClient, SyncRequests, TaskStatus, TaskStatusSource};
    use reqwest::Url;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory API: per-site backups, sites whose requests fail, and
    /// tasks that finish with a failure status.
    #[derive(Default)]
    struct FakeApi {
        backups: HashMap<u64, Vec<BackupMetadata>>,
        failing_sites: HashSet<u64>,
        failing_tasks: HashSet<String>,
        restores: Mutex<Vec<(u64, Option<u64>)>>,
        downloads: Mutex<Vec<u64>>,
    }

    impl TaskStatusSource for FakeApi {
        async fn task_status(&self, id: &str) -> Result<TaskStatus> {
            let ok = !self.failing_tasks.contains(id);
            Ok(TaskStatus {
                id: id.to_string(),
                completed: true,
                succeeded: ok,
                status: if ok { "16".into() } else { "4".into() },
            })
        }
    }

    impl BackupDownloader for FakeApi {
        async fn download_backup(&self, _site: &SiteMapping, backup: &BackupMetadata, dest: &Path) -> Result<u64> {
            if self.failing_sites.contains(&backup.site_id) {
                return Err(Error::remote(403, "expired"));
            }
            std::fs::create_dir_all(dest.parent().unwrap())?;
            std::fs::write(dest, b"artifact")?;
            self.downloads.lock().unwrap().push(backup.id);
            Ok(8)
        }
    }

    impl SiteBackupApi for FakeApi {
        fn source(&self) -> SourceApi {
            SourceApi::SiteFactory
        }

        fn supports_labels(&self) -> bool {
            true
        }

        fn check_components(&self, operation: Operation, requested: &[Component]) -> Result<()> {
            if operation == Operation::Restore && requested.contains(&Component::Codebase) {
                return Err(Error::config("codebase"));
            }
            Ok(())
        }

        fn check_sync_target(&self, target_env: &str) -> Result<()> {
            if target_env == "01live" {
                return Err(Error::config("live"));
            }
            Ok(())
        }

        async fn create_backup(&self, site: &SiteMapping, _components: &[Component], _label: Option<&str>) -> Result<String> {
            if self.failing_sites.contains(&site.site_id) {
                return Err(Error::remote(500, "boom"));
            }
            Ok(format!("task-{}", site.site_id))
        }

        async fn list_backups(&self, site: &SiteMapping) -> Result<Vec<BackupMetadata>> {
            if self.failing_sites.contains(&site.site_id) {
                return Err(Error::remote(500, "boom"));
            }
            Ok(self.backups.get(&site.site_id).cloned().unwrap_or_default())
        }

        async fn get_backup(&self, site: &SiteMapping, backup_id: u64) -> Result<BackupMetadata> {
            self.list_backups(site)
                .await?
                .into_iter()
                .find(|b| b.id == backup_id)
                .ok_or_else(|| Error::NotFound(backup_id.to_string()))
        }

        async fn restore_backup(&self, site: &SiteMapping, backup_id: Option<u64>, _components: &[Component]) -> Result<String> {
            if self.failing_sites.contains(&site.site_id) {
                return Err(Error::remote(500, "boom"));
            }
            self.restores.lock().unwrap().push((site.site_id, backup_id));
            Ok(format!("task-{}", site.site_id))
        }

        async fn sync_from_production(&self, sites: &[SiteMapping], _target_env: &str, _components: &[Component]) -> Result<SyncRequests> {
            Ok(SyncRequests {
                task_ids: vec![format!("stage-{}", sites.len())],
                failures: 0,
            })
        }

        async fn deployed_ref(&self) -> Result<String> {
            Ok("tags/2.0.1".into())
        }
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

    fn backup(site_id: u64, id: u64, timestamp: i64, label: &str, components: &[Component]) -> BackupMetadata {
        BackupMetadata {
            id,
            site_id,
            timestamp,
            file: format!("site{}_{}.tar.gz", site_id, id),
            label: label.to_string(),
            component_list: components.to_vec(),
            backup_api: SourceApi::SiteFactory,
            raw: serde_json::Value::Null,
        }
    }

    fn orchestrator<'a, A: SiteBackupApi>(api: &'a A, tmp: &TempDir) -> SiteData<'a, A> {
        SiteData::new(
            api,
            TaskPoller::new(Duration::from_millis(1), 3),
            LocalBackupStore::new(tmp.path(), "01live"),
            Prompt::new(true),
        )
    }

    use Component::*;

    #[tokio::test]
    async fn test_backup_counts_failed_sites() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi {
            failing_sites: HashSet::from([2]),
            ..Default::default()
        };
        let code = orchestrator(&api, &tmp)
            .backup(&[site(1), site(2), site(3)], &[Database], None)
            .await
            .unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_backup_with_no_successful_request_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi {
            failing_sites: HashSet::from([1, 2]),
            ..Default::default()
        };
        let result = orchestrator(&api, &tmp)
            .backup(&[site(1), site(2)], &[Database], None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_failed_poll_counts_polled_sites() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi {
            failing_sites: HashSet::from([3]),
            failing_tasks: HashSet::from(["task-2".to_string()]),
            ..Default::default()
        };
        let code = orchestrator(&api, &tmp)
            .backup(&[site(1), site(2), site(3)], &[Database], None)
            .await
            .unwrap();
        // One request failure plus both polled tasks.
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_autolabel_uses_deployed_ref() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi::default();
        let data = orchestrator(&api, &tmp);
        assert_eq!(
            data.resolve_label(None, Some(AutoLabel::Predeploy)).await.unwrap().as_deref(),
            Some("tags/2.0.1-predeploy")
        );
        assert!(data
            .resolve_label(Some("x"), Some(AutoLabel::Prerollback))
            .await
            .is_err());
        assert_eq!(data.resolve_label(Some(""), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_by_label_uses_resolved_ids() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi {
            backups: HashMap::from([
                (
                    1,
                    vec![
                        backup(1, 10, 100, "v1-predeploy", &[Database, PublicFiles]),
                        backup(1, 11, 200, "v1-predeploy", &[Database, PublicFiles]),
                        backup(1, 12, 300, "other", &[Database, PublicFiles]),
                    ],
                ),
                (2, vec![backup(2, 20, 100, "v1-predeploy", &[Database, PublicFiles, Themes])]),
            ]),
            ..Default::default()
        };
        let code = orchestrator(&api, &tmp)
            .restore(&[site(1), site(2)], &[Database], None, Some("v1-predeploy"))
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(*api.restores.lock().unwrap(), vec![(1, Some(11)), (2, Some(20))]);
    }

    #[tokio::test]
    async fn test_restore_by_label_requires_every_site() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi {
            backups: HashMap::from([
                (1, vec![backup(1, 10, 100, "v1.2-predeploy", &[Database])]),
                (2, vec![backup(2, 20, 100, "v1.2-predeploy", &[Database])]),
                (3, vec![backup(3, 30, 100, "v1.1-predeploy", &[Database])]),
            ]),
            ..Default::default()
        };
        let result = orchestrator(&api, &tmp)
            .restore(&[site(1), site(2), site(3)], &[Database], None, Some("v1.2-predeploy"))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(api.restores.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_flag_conflicts() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi::default();
        let data = orchestrator(&api, &tmp);
        assert!(data.restore(&[site(1)], &[], Some(1), Some("x")).await.is_err());
        assert!(data.restore(&[site(1), site(2)], &[], Some(1), None).await.is_err());
        assert!(data.restore(&[site(1)], &[Codebase], None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_download_picks_latest_exact_match_and_skips_cached() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi {
            backups: HashMap::from([
                (
                    1,
                    vec![
                        backup(1, 10, 100, "", &[Database]),
                        backup(1, 11, 300, "", &[Database, Themes]),
                        backup(1, 12, 200, "", &[Database]),
                    ],
                ),
                (2, vec![backup(2, 20, 100, "", &[Database])]),
            ]),
            ..Default::default()
        };
        let data = orchestrator(&api, &tmp);
        data.store
            .save_metadata(&backup(2, 20, 100, "", &[Database]))
            .unwrap();

        let code = data.download(&[site(1), site(2)], &[Database], None).await.unwrap();
        assert_eq!(code, 0);
        assert_eq!(*api.downloads.lock().unwrap(), vec![12]);
        assert!(data.store.has_available_backup(&backup(1, 12, 200, "", &[Database])));
    }

    #[tokio::test]
    async fn test_download_failure_counts_and_continues() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi {
            backups: HashMap::from([(1, vec![backup(1, 10, 100, "", &[Database])])]),
            ..Default::default()
        };
        let data = orchestrator(&api, &tmp);
        // Site 2 has no matching backup.
        let code = data.download(&[site(1), site(2)], &[Database], None).await.unwrap();
        assert_eq!(code, 1);

        let empty = FakeApi::default();
        let result = orchestrator(&empty, &tmp).download(&[site(1)], &[Database], None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_filter() {
        let backups = vec![
            backup(1, 1, 100, "a", &[Database]),
            backup(1, 2, 300, "b", &[Database]),
            backup(1, 3, 200, "a", &[Database, Themes]),
            backup(1, 4, 150, "a", &[Database]),
        ];
        let ids = |filter: ListFilter| -> Vec<u64> { filter.apply(backups.clone()).iter().map(|b| b.id).collect() };

        assert_eq!(ids(ListFilter::default()), vec![1, 2, 3, 4]);
        assert_eq!(
            ids(ListFilter {
                latest: true,
                ..Default::default()
            }),
            vec![2]
        );
        assert_eq!(
            ids(ListFilter {
                components: vec![Database],
                label: Some("a".into()),
                latest: true,
                ..Default::default()
            }),
            vec![4]
        );
        assert_eq!(
            ids(ListFilter {
                backup_id: Some(3),
                components: vec![PublicFiles],
                ..Default::default()
            }),
            vec![3]
        );
    }

    #[tokio::test]
    async fn test_sync_rejects_live_target() {
        let tmp = TempDir::new().unwrap();
        let api = FakeApi::default();
        let data = orchestrator(&api, &tmp);
        assert!(data.sync(&[site(1)], "01live", &[]).await.is_err());
        assert_eq!(data.sync(&[site(1), site(2)], "01test", &[]).await.unwrap(), 0);
    }

    #[test]
    fn test_default_components() {
        assert_eq!(default_components(SourceApi::Cloud, Operation::Backup), vec![Database]);
        assert!(default_components(SourceApi::SiteFactory, Operation::List).is_empty());
        assert!(!default_components(SourceApi::SiteFactory, Operation::Restore).contains(&Codebase));
    }

    #[tokio::test]
    async fn test_label_restore_against_site_factory() {
        let server = MockServer::start().await;
        for (site_id, label) in [(1, "v1.2-predeploy"), (2, "v1.2-predeploy"), (3, "v1.1-predeploy")] {
            Mock::given(method("GET"))
                .and(path(format!("/api/v1/sites/{}/backups", site_id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "backups": [{
                        "id": site_id * 10,
                        "nid": site_id,
                        "timestamp": 100,
                        "file": format!("site{}.tar.gz", site_id),
                        "label": label,
                        "componentList": ["database"]
                    }]
                })))
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": 1})))
            .expect(0)
            .mount(&server)
            .await;

        let client = FactoryClient::with_base_url(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            "u".into(),
            "p".into(),
        );
        let tmp = TempDir::new().unwrap();
        let result = orchestrator(&client, &tmp)
            .restore(&[site(1), site(2), site(3)], &[Database], None, Some("v1.2-predeploy"))
            .await;
        assert!(result.is_err());
    }
}
