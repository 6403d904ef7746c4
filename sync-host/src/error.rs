//! Error types for sync-host.

use syncpad_core::ApplyError;
use syncpad_types::{DocPath, WireError};

/// Main error type for sync-host operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Edit tracking error.
    #[error("tracking error: {0}")]
    Track(#[from] TrackError),

    /// Message encoding error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host actor is no longer running.
    #[error("host has shut down")]
    Closed,
}

/// Errors recording edits against a tracked file.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// The transaction does not fit the file's current text.
    #[error("invalid edit for {path}: {source}")]
    InvalidEdit {
        /// File the transaction was recorded against.
        path: DocPath,
        /// Why the edit did not fit.
        source: ApplyError,
    },
}

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
