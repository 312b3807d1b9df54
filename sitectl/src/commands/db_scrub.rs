//! `db-scrub`: sanitize a copied database, keeping user passwords.
//!
//! Run from the Cloud `post-db-copy` hook. Site Factory environments handle
//! scrubbing themselves and are skipped.

use crate::config::DrushConfig;
use crate::utils::shell;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

pub const HOSTING_FILES_ROOT: &str = "/mnt/files";

/// `<root>/<site>.<env>/files-private/sites.json` exists only on Site Factory.
pub fn is_acsf_env(root: &Path, site: &str, target_env: &str) -> bool {
    sites_json_path(root, site, target_env).is_file()
}

fn sites_json_path(root: &Path, site: &str, target_env: &str) -> PathBuf {
    root.join(format!("{}.{}", site, target_env))
        .join("files-private")
        .join("sites.json")
}

pub fn scrub_commands(drush: &DrushConfig) -> Vec<Command> {
    let mut sanitize = Command::new(&drush.bin);
    sanitize.args(["sql-sanitize", "--sanitize-password=no", "--yes"]);
    let mut rebuild = Command::new(&drush.bin);
    rebuild.arg("cr");
    vec![sanitize, rebuild]
}

pub fn db_scrub(drush: &DrushConfig, root: &Path, site: &str, target_env: &str, db_name: &str, source_env: &str) -> Result<i32> {
    if is_acsf_env(root, site, target_env) {
        info!("Skipping scrub of {} on Site Factory environment {}", site, target_env);
        return Ok(0);
    }

    info!(
        "Scrubbing database {} in {} (copied from {})",
        db_name, target_env, source_env
    );
    warn!("IMPORTANT! Passwords are not scrubbed!");

    let mut commands = scrub_commands(drush).into_iter();
    if let Some(mut sanitize) = commands.next() {
        shell::run(&mut sanitize).map_err(|e| Error::Command(format!("Failed to sanitize database! {}", e)))?;
    }
    for mut command in commands {
        shell::run(&mut command)?;
    }

    Ok(0)
}
