//! Error types shared by the API clients, the local store and the orchestrators.

use thiserror::Error;

/// Coarse classification attached to fatal errors in the CLI log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credentials, malformed base URL, unknown site. Never retried.
    Config,
    /// Non-2xx status or unexpected payload from a remote API.
    Remote,
    /// The task poller exhausted its iteration budget.
    Timeout,
    /// Disk or external process failure on this machine.
    LocalIo,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Remote => "remote",
            ErrorKind::Timeout => "timeout",
            ErrorKind::LocalIo => "local_io",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing {source_name} credentials: {}", .fields.join(", "))]
    MissingCredentials {
        source_name: String,
        fields: Vec<&'static str>,
    },

    #[error("Remote API error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Waited too long for tasks to complete: {iterations} iterations with {interval_secs} seconds between iterations")]
    Timeout { iterations: u32, interval_secs: u64 },

    #[error("Task {id} failed with status {status}")]
    TaskFailed { id: String, status: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Operation aborted: {0}")]
    Aborted(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::MissingCredentials { .. }
            | Error::Aborted(_)
            | Error::InvalidInput(_) => {
                ErrorKind::Config
            }
            Error::Remote { .. }
            | Error::UnexpectedResponse(_)
            | Error::NotFound(_)
            | Error::TaskFailed { .. }
            | Error::Http(_)
            | Error::Serialization(_) => ErrorKind::Remote,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Io(_) | Error::Command(_) => ErrorKind::LocalIo,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Error::Remote {
            status: Some(status),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_lists_every_field() {
        let err = Error::MissingCredentials {
            source_name: "AC_API_KEY/AC_API_SECRET".to_string(),
            fields: vec!["key", "secret"],
        };
        let message = err.to_string();
        assert!(message.contains("key, secret"));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::remote(500, "boom").kind(), ErrorKind::Remote);
        assert_eq!(
            Error::Timeout { iterations: 3, interval_secs: 1 }.kind(),
            ErrorKind::Timeout
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(Error::from(io).kind(), ErrorKind::LocalIo);
        assert_eq!(Error::config("bad url").kind(), ErrorKind::Config);
        assert_eq!(Error::InvalidInput("../x".into()).kind().as_str(), "config");
        assert_eq!(ErrorKind::LocalIo.as_str(), "local_io");
    }

    #[test]
    fn test_remote_message_includes_status() {
        assert_eq!(
            Error::remote(404, "no such site").to_string(),
            "Remote API error (HTTP 404): no such site"
        );
        let without_status = Error::Remote { status: None, message: "empty body".into() };
        assert_eq!(without_status.to_string(), "Remote API error: empty body");
    }
}
