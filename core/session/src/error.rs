//! Error types for onyx-session operations.

use std::path::PathBuf;

/// All errors that can occur in onyx-session operations.
///
/// The expiration monitor itself has no recoverable errors; these cover the
/// persistence and configuration edges around it.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;
