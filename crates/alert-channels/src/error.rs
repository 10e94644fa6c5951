//! Error types for alert dispatch.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::event::ApiMethod;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an alert could not be dispatched.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Telegram {method} request failed: {reason}")]
    Transport { method: ApiMethod, reason: String },

    #[error("Telegram {method} rejected, response code: {}", .status.as_u16())]
    RemoteRejection { method: ApiMethod, status: StatusCode },

    #[error("Cannot read media file {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings store error: {0}")]
    Store(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Numeric HTTP status of a remote rejection.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteRejection { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_rejection_display() {
        let err = Error::RemoteRejection {
            method: ApiMethod::SendPhoto,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(
            err.to_string(),
            "Telegram sendPhoto rejected, response code: 500"
        );
    }

    #[test]
    fn test_status_code_only_for_rejections() {
        assert_eq!(Error::config("missing token").status_code(), None);
    }
}
