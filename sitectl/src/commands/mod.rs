//! Command orchestrators. Each returns the process exit code; an `Err` is
//! fatal and maps to exit 1.

pub mod aliases;
pub mod auth;
pub mod behat;
pub mod code;
pub mod db_scrub;
pub mod drush;
pub mod git;
pub mod local_data;
pub mod prompt;
pub mod site_data;
