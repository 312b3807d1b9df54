//! Local backup store.
//!
//! Artifacts live at `<root>/<site_id>/<env>/<file>` with the metadata
//! sidecar at `<file>.json`. The sidecar is the availability signal: a
//! backup whose sidecar exists counts as available even if the artifact
//! was removed by hand.

use crate::api::BackupDownloader;
use crate::backup::extract;
use crate::backup::metadata::validate_file_name;
use crate::backup::{BackupMetadata, SourceApi};
use crate::sites::SiteMapping;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub struct LocalBackupStore {
    root: PathBuf,
    env: String,
}

impl LocalBackupStore {
    pub fn new(root: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            env: env.into(),
        }
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// `<root>/<site_id>/<env>`
    pub fn backup_dir(&self, site_id: u64) -> PathBuf {
        self.root.join(site_id.to_string()).join(&self.env)
    }

    /// `<root>/<site_id>/<env>/<file>`. Sidecars on disk are not trusted,
    /// so the file name is checked again here.
    pub fn artifact_path(&self, backup: &BackupMetadata) -> Result<PathBuf> {
        validate_file_name(&backup.file)?;
        Ok(self.backup_dir(backup.site_id).join(&backup.file))
    }

    pub fn metadata_path(&self, backup: &BackupMetadata) -> Result<PathBuf> {
        Ok(sidecar_path(&self.artifact_path(backup)?))
    }

    pub fn extraction_dir(&self, backup: &BackupMetadata) -> Result<PathBuf> {
        Ok(extract::extraction_dir(&self.artifact_path(backup)?))
    }

    /// False for a backup whose file name could not live in the store.
    pub fn has_available_backup(&self, backup: &BackupMetadata) -> bool {
        self.metadata_path(backup).is_ok_and(|path| path.is_file())
    }

    /// Write the metadata sidecar next to the artifact.
    pub fn save_metadata(&self, backup: &BackupMetadata) -> Result<PathBuf> {
        let path = self.metadata_path(backup)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec_pretty(backup)?)?;
        debug!("Saved backup metadata to {}", path.display());
        Ok(path)
    }

    /// Stream the artifact to its store path, then write the sidecar.
    ///
    /// The two writes are not atomic: when the sidecar write fails the
    /// artifact stays on disk without metadata.
    pub async fn download_and_save<D: BackupDownloader>(
        &self,
        downloader: &D,
        site: &SiteMapping,
        backup: &BackupMetadata,
    ) -> Result<PathBuf> {
        let path = self.artifact_path(backup)?;
        info!("Downloading backup ID {} to {}", backup.id, path.display());

        downloader.download_backup(site, backup, &path).await?;
        self.save_metadata(backup).map_err(|e| {
            error!("Backup ID {} downloaded but metadata could not be saved: {}", backup.id, e);
            e
        })?;

        Ok(path)
    }

    /// Extract the artifact unless its extraction directory already exists.
    pub fn extract_backup(&self, backup: &BackupMetadata) -> Result<PathBuf> {
        let artifact = self.artifact_path(backup)?;
        let dir = extract::extraction_dir(&artifact);

        if !artifact.is_file() {
            return Err(Error::NotFound(format!("File not found: {}", artifact.display())));
        }

        if dir.is_dir() {
            debug!("Backup already extracted at {}", dir.display());
            return Ok(dir);
        }

        info!("Extracting backup to {}", dir.display());
        std::fs::create_dir_all(&dir)?;

        let result = match backup.backup_api {
            SourceApi::Cloud => extract::gunzip_file(&artifact, &dir.join("database.sql")).map(|_| ()),
            SourceApi::SiteFactory => extract::unpack_tar_gz(&artifact, &dir),
        };

        if let Err(e) = result {
            // A half-written directory would make the next call skip extraction.
            if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                warn!("Failed to remove partial extraction {}: {}", dir.display(), cleanup);
            }
            return Err(e);
        }

        Ok(dir)
    }

    /// All sidecars for `site_id`, sorted by file name.
    pub fn available_backups(&self, site_id: u64) -> Result<Vec<BackupMetadata>> {
        let dir = self.backup_dir(site_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let sidecars: Vec<PathBuf> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();

        let mut backups = Vec::with_capacity(sidecars.len());
        for path in sidecars {
            match read_metadata(&path) {
                Ok(backup) => backups.push(backup),
                Err(e) => warn!("Skipping unreadable metadata {}: {}", path.display(), e),
            }
        }

        Ok(backups)
    }

    /// Remove the extracted directory, the artifact and the sidecar.
    ///
    /// Every deletion is attempted; the first failure is returned after all
    /// three have been tried.
    pub fn remove_local_backup(&self, backup: &BackupMetadata) -> Result<()> {
        let artifact = self.artifact_path(backup)?;
        let dir = extract::extraction_dir(&artifact);
        let sidecar = sidecar_path(&artifact);

        let results = [
            remove_if_exists(&dir, true),
            remove_if_exists(&artifact, false),
            remove_if_exists(&sidecar, false),
        ];

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                error!("Failed to remove part of backup ID {}: {}", backup.id, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

fn read_metadata(path: &Path) -> Result<BackupMetadata> {
    let content = std::fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

fn remove_if_exists(path: &Path, is_dir: bool) -> Result<()> {
    let result = if is_dir {
        if !path.is_dir() {
            return Ok(());
        }
        std::fs::remove_dir_all(path)
    } else {
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_file(path)
    };
    result.map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))))
}
