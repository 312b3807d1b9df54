//! Backup metadata and the local backup store.

pub mod extract;
pub mod metadata;
pub mod store;

pub use metadata::{latest, BackupMetadata, SourceApi};
pub use store::LocalBackupStore;
