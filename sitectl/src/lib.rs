//! sitectl library
//!
//! Backup, restore and sync orchestration for multisite Drupal hosting on
//! Acquia Cloud and Acquia Cloud Site Factory.

pub mod api;
pub mod backup;
pub mod commands;
pub mod components;
pub mod config;
pub mod poller;
pub mod sites;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::{Error, ErrorKind, Result};
