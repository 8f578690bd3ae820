//! Permission subsystem errors

use std::path::PathBuf;
use thiserror::Error;

/// Permission errors
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Invalid permission node '{node}': {reason}")]
    InvalidNode { node: String, reason: &'static str },

    #[error("Invalid actor id '{0}'")]
    InvalidActor(String),

    #[error("Unknown permission namespace: {0}")]
    UnknownNamespace(String),

    #[error("Permission file I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode permission file {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to encode permissions: {0}")]
    Encode(String),

    #[error("Unsupported permission file format: {0:?} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Permission backend unavailable: {0}")]
    Backend(String),
}

impl PermissionError {
    /// True if the error came from reading or writing durable storage
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            PermissionError::Io { .. }
                | PermissionError::Decode { .. }
                | PermissionError::Encode(_)
                | PermissionError::Backend(_)
        )
    }
}
