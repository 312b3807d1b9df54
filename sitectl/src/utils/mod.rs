//! Utility modules shared across commands.

pub mod errors;
pub mod logger;
pub mod shell;

pub use errors::{Error, ErrorKind, Result};
