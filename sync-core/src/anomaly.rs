//! Protocol anomalies seen by a viewer.
//!
//! None of these are fatal. Each one maps to a fixed reaction in
//! [`PathSync`](crate::PathSync): drop the message, or drop it and ask the
//! host for a fresh snapshot.

use syncpad_types::Version;
use thiserror::Error;

/// A message that could not be reconciled with local state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Anomaly {
    /// Snapshot older than what the viewer already holds.
    #[error("stale snapshot: version {received} is older than local version {local}")]
    Stale {
        /// Version the viewer holds.
        local: Version,
        /// Version carried by the snapshot.
        received: Version,
    },

    /// Change batch that does not directly follow the local version.
    #[error("sequence gap: expected version {expected}, received {received}")]
    SequenceGap {
        /// The only version that can be applied next.
        expected: Version,
        /// Version carried by the change.
        received: Version,
    },

    /// The document rejected one of the batch's edits.
    #[error("failed to apply change for version {version}: {reason}")]
    ApplyFailure {
        /// Version the batch would have produced.
        version: Version,
        /// Why the edit was rejected.
        reason: String,
    },

    /// Change for a file the viewer has never seen a snapshot of.
    #[error("change for unknown file")]
    UnknownFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_versions() {
        let gap = Anomaly::SequenceGap {
            expected: Version::new(6),
            received: Version::new(7),
        };
        assert_eq!(
            gap.to_string(),
            "sequence gap: expected version 6, received 7"
        );
    }
}
