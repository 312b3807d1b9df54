//! Drush command lines for file rsyncs, database import and cache work.

use crate::config::{DrushConfig, SyncConfig};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct Drush<'a> {
    config: &'a DrushConfig,
    exclude_paths: &'a [String],
}

impl<'a> Drush<'a> {
    pub fn new(config: &'a DrushConfig, sync: &'a SyncConfig) -> Self {
        Self {
            config,
            exclude_paths: &sync.exclude_paths,
        }
    }

    pub fn sanitize_enabled(&self) -> bool {
        self.config.sanitize
    }

    /// `<docroot>/sites/g/files/<site_dir>/files`
    pub fn public_files_dir(&self, site_dir: &str) -> PathBuf {
        self.config
            .docroot
            .join("sites")
            .join("g")
            .join("files")
            .join(site_dir)
            .join("files")
    }

    /// `<docroot>/../files-private/<site_dir>`
    pub fn private_files_dir(&self, site_dir: &str) -> PathBuf {
        self.config.docroot.join("..").join("files-private").join(site_dir)
    }

    /// `drush -l <uri>`
    pub fn command(&self, uri: &str) -> Command {
        let mut command = Command::new(&self.config.bin);
        command.arg("-l").arg(uri);
        command
    }

    /// Rsync `source` (a path or `@alias:%files/`) into `dest`.
    pub fn rsync(&self, uri: &str, source: &str, dest: &Path) -> Command {
        let mut command = self.command(uri);
        command
            .args(["--no-interaction", "rsync", source])
            .arg(dest)
            .arg(format!("--exclude-paths={}", self.exclude_paths.join(":")))
            .args(["--yes", "--", "--no-group"]);
        command
    }

    pub fn sql_drop(&self, uri: &str) -> Command {
        let mut command = self.command(uri);
        command.args(["sql-drop", "--yes"]);
        command
    }

    /// `sqlc`, fed a dump on stdin.
    pub fn sql_cli(&self, uri: &str) -> Command {
        let mut command = self.command(uri);
        command.arg("sqlc");
        command
    }

    /// Copy the database of `remote_alias` into the local site.
    pub fn sql_sync(&self, uri: &str, remote_alias: &str) -> Command {
        let mut command = self.command(uri);
        command
            .arg("sql-sync")
            .arg(format!("@{}", remote_alias))
            .arg("@self")
            .args(["--structure-tables-key=lightweight", "--create-db", "--yes"]);
        command
    }

    pub fn update_db(&self, uri: &str) -> Command {
        let mut command = self.command(uri);
        command.args(["updb", "-y"]);
        command
    }

    pub fn sanitize(&self, uri: &str) -> Command {
        let mut command = self.command(uri);
        command.args(["sql-sanitize", "--yes"]);
        command
    }

    pub fn cache_rebuild(&self, uri: &str) -> Command {
        let mut command = self.command(uri);
        command.arg("cr");
        command
    }

    pub fn truncate_cache_entity(&self, uri: &str) -> Command {
        let mut command = self.command(uri);
        command.args(["sqlq", "TRUNCATE cache_entity"]);
        command
    }

    /// Steps run after a database lands locally: optional sanitize, cache
    /// rebuild, entity cache truncation.
    pub fn post_import(&self, uri: &str) -> Vec<Command> {
        let mut commands = Vec::with_capacity(3);
        if self.config.sanitize {
            commands.push(self.sanitize(uri));
        }
        commands.push(self.cache_rebuild(uri));
        commands.push(self.truncate_cache_entity(uri));
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::shell::describe;

    #[test]
    fn test_file_paths() {
        let config = DrushConfig::default();
        let sync = SyncConfig::default();
        let drush = Drush::new(&config, &sync);
        assert_eq!(
            drush.public_files_dir("acme"),
            PathBuf::from("docroot/sites/g/files/acme/files")
        );
        assert_eq!(
            drush.private_files_dir("acme"),
            PathBuf::from("docroot/../files-private/acme")
        );
    }

    #[test]
    fn test_command_lines() {
        let config = DrushConfig::default();
        let sync = SyncConfig::default();
        let drush = Drush::new(&config, &sync);

        assert_eq!(
            describe(&drush.rsync("acme.local", "@acme.01live:%files/", Path::new("/tmp/files"))),
            "drush -l acme.local --no-interaction rsync @acme.01live:%files/ /tmp/files --exclude-paths=styles:css:js --yes -- --no-group"
        );
        assert_eq!(
            describe(&drush.truncate_cache_entity("acme.local")),
            "drush -l acme.local sqlq \"TRUNCATE cache_entity\""
        );
        assert_eq!(
            describe(&drush.sql_sync("acme.local", "acme.01live")),
            "drush -l acme.local sql-sync @acme.01live @self --structure-tables-key=lightweight --create-db --yes"
        );
    }

    #[test]
    fn test_post_import_respects_sanitize() {
        let sync = SyncConfig::default();
        let mut config = DrushConfig::default();
        assert_eq!(Drush::new(&config, &sync).post_import("x").len(), 3);
        config.sanitize = false;
        let steps = Drush::new(&config, &sync).post_import("x");
        assert_eq!(steps.len(), 2);
        assert_eq!(describe(&steps[0]), "drush -l x cr");
    }
}
