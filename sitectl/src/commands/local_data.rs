//! Local-only data management: list, clean up and restore downloaded
//! backups, and pull files and databases straight from a remote alias.

use crate::backup::{latest, BackupMetadata, LocalBackupStore};
use crate::commands::drush::Drush;
use crate::commands::prompt::{self, Direction, Prompt};
use crate::commands::site_data::print_backups;
use crate::components::{self, Component};
use crate::sites::SiteMapping;
use crate::utils::shell;
use crate::{Error, Result};
use std::path::Path;
use tracing::{error, info};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Local backups whose components all fall within `requested` (any when
/// empty), or the single backup with `backup_id`.
pub fn filter_local(backups: Vec<BackupMetadata>, requested: &[Component], backup_id: Option<u64>) -> Vec<BackupMetadata> {
    match backup_id {
        Some(id) => backups.into_iter().filter(|b| b.id == id).take(1).collect(),
        None => backups
            .into_iter()
            .filter(|b| requested.is_empty() || components::is_subset(&b.component_list, requested))
            .collect(),
    }
}

/// Backups older than `older_than_days` at `now` (unix seconds), further
/// narrowed like [`filter_local`]. A backup ID ignores the age.
pub fn cleanup_candidates(
    backups: Vec<BackupMetadata>,
    requested: &[Component],
    backup_id: Option<u64>,
    older_than_days: u64,
    now: i64,
) -> Vec<BackupMetadata> {
    let max_age = i64::try_from(older_than_days)
        .unwrap_or(i64::MAX / SECONDS_PER_DAY)
        .saturating_mul(SECONDS_PER_DAY);
    let candidates = filter_local(backups, requested, backup_id);
    if backup_id.is_some() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|b| now - b.timestamp > max_age)
        .collect()
}

/// Backup to restore: the one with `backup_id`, else the newest, provided it
/// holds every requested component.
pub fn restore_candidate(backups: &[BackupMetadata], requested: &[Component], backup_id: Option<u64>) -> Result<BackupMetadata> {
    match backup_id {
        Some(id) => {
            let backup = backups
                .iter()
                .find(|b| b.id == id)
                .ok_or_else(|| Error::NotFound(format!("Backup ID {}", id)))?;
            if !backup.contains_all(requested) {
                return Err(Error::NotFound(format!(
                    "Backup ID {} does not contain all components requested for restore",
                    id
                )));
            }
            Ok(backup.clone())
        }
        None => latest(backups.iter().filter(|b| b.contains_all(requested)))
            .cloned()
            .ok_or_else(|| Error::NotFound("No local backup holds the requested components".into())),
    }
}

fn reject_unsupported(requested: &[Component], action: &str) -> Result<()> {
    for component in [Component::Codebase, Component::Themes] {
        if requested.contains(&component) {
            return Err(Error::config(format!(
                "The component \"{}\" is unsupported when {} to local.",
                component, action
            )));
        }
    }
    Ok(())
}

fn single_site(sites: &[SiteMapping], backup_id: Option<u64>) -> Result<()> {
    if backup_id.is_some() && sites.len() != 1 {
        return Err(Error::config(
            "When using a specific backup ID you must also specify a single site.",
        ));
    }
    Ok(())
}

pub struct LocalData<'a> {
    store: LocalBackupStore,
    drush: Drush<'a>,
    prompt: Prompt,
}

impl<'a> LocalData<'a> {
    pub fn new(store: LocalBackupStore, drush: Drush<'a>, prompt: Prompt) -> Self {
        Self {
            store,
            drush,
            prompt,
        }
    }

    fn confirm(&self, operations: &[String], sites: &[SiteMapping], direction: Direction) -> Result<bool> {
        let summary = prompt::site_summary(operations, sites, direction)?;
        self.prompt.confirm(&summary)
    }

    pub fn list(&self, sites: &[SiteMapping], requested: &[Component], backup_id: Option<u64>, latest_only: bool) -> Result<i32> {
        single_site(sites, backup_id)?;
        let operations = vec![if requested.is_empty() {
            "List backups with any component".to_string()
        } else {
            format!("List backups with {}", components::join(requested))
        }];
        if !self.confirm(&operations, sites, Direction::LocalOnly)? {
            return Ok(0);
        }

        for site in sites {
            let mut backups = filter_local(self.store.available_backups(site.site_id)?, requested, backup_id);
            if latest_only {
                backups = latest(&backups).cloned().into_iter().collect();
            }
            println!("Local backups for site ID {} ({})", site.site_id, self.store.env());
            print_backups(&backups);
        }
        Ok(0)
    }

    pub fn cleanup(
        &self,
        sites: &[SiteMapping],
        requested: &[Component],
        backup_id: Option<u64>,
        older_than_days: u64,
        now: i64,
    ) -> Result<i32> {
        single_site(sites, backup_id)?;
        let what = match backup_id {
            Some(id) => format!("backup ID {}", id),
            None => format!("backups older than {} day(s)", older_than_days),
        };
        let operations = vec![format!("Cleaning up {}", what)];
        if !self.confirm(&operations, sites, Direction::LocalOnly)? {
            return Ok(0);
        }

        let mut failures = 0;
        for site in sites {
            let backups = cleanup_candidates(
                self.store.available_backups(site.site_id)?,
                requested,
                backup_id,
                older_than_days,
                now,
            );
            if backups.is_empty() {
                println!("No backups found matching parameters for site ID {}.", site.site_id);
                continue;
            }

            print_backups(&backups);
            let question = format!("Delete {} backup(s) of site ID {}?\n", backups.len(), site.site_id);
            if !self.prompt.confirm(&question)? {
                continue;
            }

            for backup in &backups {
                if let Err(e) = self.store.remove_local_backup(backup) {
                    error!("Failed to remove backup ID {}: {}", backup.id, e);
                    failures += 1;
                    break;
                }
                info!("Removed backup ID {}", backup.id);
            }
        }
        Ok(failures)
    }

    pub fn restore(&self, sites: &[SiteMapping], requested: &[Component], backup_id: Option<u64>) -> Result<i32> {
        single_site(sites, backup_id)?;
        reject_unsupported(requested, "restoring")?;

        let operations = vec![format!("Restoring backups with {}", components::join(requested))];
        if !self.confirm(&operations, sites, Direction::RemoteToLocal)? {
            return Ok(0);
        }

        let mut failures = 0;
        for site in sites {
            match self.restore_site(site, requested, backup_id) {
                Ok(()) => info!("Restored site: {}", site.local_url),
                Err(e) => {
                    error!("Failed to restore site {}: {}", site.site_id, e);
                    failures += 1;
                }
            }
        }
        Ok(failures)
    }

    fn restore_site(&self, site: &SiteMapping, requested: &[Component], backup_id: Option<u64>) -> Result<()> {
        let backups = self.store.available_backups(site.site_id)?;
        let backup = restore_candidate(&backups, requested, backup_id)?;
        let extracted = self.store.extract_backup(&backup)?;
        let uri = site.local_url.as_str();

        if requested.contains(&Component::PublicFiles) {
            let source = extracted.join("docroot/sites/default/files/");
            self.rsync_into(uri, &source.to_string_lossy(), &self.drush.public_files_dir(&site.site_directory))?;
        }

        if requested.contains(&Component::PrivateFiles) {
            let source = extracted.join("docroot/sites/default/files-private/");
            self.rsync_into(uri, &source.to_string_lossy(), &self.drush.private_files_dir(&site.site_directory))?;
        }

        if requested.contains(&Component::Database) {
            let dump = extracted.join("database.sql");
            if !dump.is_file() {
                return Err(Error::NotFound(format!("Backup file doesn't exist: {}", dump.display())));
            }
            shell::run(&mut self.drush.sql_drop(uri))?;
            shell::run_with_stdin(&mut self.drush.sql_cli(uri), &dump)?;
            shell::run(&mut self.drush.update_db(uri))?;
            for mut command in self.drush.post_import(uri) {
                shell::run(&mut command)?;
            }
        }

        Ok(())
    }

    fn rsync_into(&self, uri: &str, source: &str, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        shell::run(&mut self.drush.rsync(uri, source, dest))
    }

    pub fn sync(&self, sites: &[SiteMapping], requested: &[Component]) -> Result<i32> {
        reject_unsupported(requested, "syncing")?;

        let operations = vec![format!("Sync data of {}", components::join(requested))];
        if !self.confirm(&operations, sites, Direction::RemoteToLocal)? {
            return Ok(0);
        }

        let mut failures = 0;
        for site in sites {
            match self.sync_site(site, requested) {
                Ok(()) => info!("Synced site: {}", site.local_url),
                Err(e) => {
                    error!("Failed to sync site {}: {}", site.site_id, e);
                    failures += 1;
                }
            }
        }
        Ok(failures)
    }

    fn sync_site(&self, site: &SiteMapping, requested: &[Component]) -> Result<()> {
        if site.site_directory.is_empty() {
            return Err(Error::config("Site needs a site_dir property to sync files."));
        }
        let uri = site.local_url.as_str();

        if requested.contains(&Component::PublicFiles) {
            let source = format!("@{}:%files/", site.remote_alias);
            self.rsync_into(uri, &source, &self.drush.public_files_dir(&site.site_directory))?;
        }

        if requested.contains(&Component::PrivateFiles) {
            let source = format!("@{}:%private/", site.remote_alias);
            self.rsync_into(uri, &source, &self.drush.private_files_dir(&site.site_directory))?;
        }

        if requested.contains(&Component::Database) {
            shell::run(&mut self.drush.sql_drop(uri))?;
            shell::run(&mut self.drush.sql_sync(uri, &site.remote_alias))?;
            for mut command in self.drush.post_import(uri) {
                shell::run(&mut command)?;
            }
        }

        Ok(())
    }
}
