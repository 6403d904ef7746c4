//! Error types for SyncPad wire handling.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Encoded message exceeds the frame limit
    #[error("message too large: {size} bytes (limit: {limit} bytes)")]
    TooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// Path cannot be tracked (non-local resource or empty)
    #[error("untrackable path: {0}")]
    UntrackablePath(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::TooLarge {
            size: 20,
            limit: 10,
        };
        assert_eq!(
            err.to_string(),
            "message too large: 20 bytes (limit: 10 bytes)"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
