//! Per-file reconciliation state machine for viewers.
//!
//! Like the rest of this crate, the machine performs no I/O: it takes an
//! input, returns the next state plus a list of actions, and the viewer
//! driver (`syncpad-client`) executes those actions against its documents
//! and transport.
//!
//! Applying a change batch is a two-step exchange. A `Change` input that
//! directly follows the local version yields [`SyncAction::ApplyBatch`]; the
//! driver applies the edits and reports back with
//! [`SyncInput::BatchApplied`] or [`SyncInput::BatchFailed`]. The local
//! version only moves once the whole batch is in.

use syncpad_types::Version;

use crate::Anomaly;

/// What a viewer knows about one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathSync {
    /// No snapshot received yet.
    #[default]
    Unknown,
    /// Local text matches the host's text at `version`.
    Synced {
        /// Version of the local text.
        version: Version,
    },
}

/// Inputs to [`PathSync::on_input`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncInput {
    /// A full-text snapshot arrived.
    Snapshot {
        /// Version of the snapshot.
        version: Version,
        /// Host asked for the file to be surfaced.
        open: bool,
    },
    /// A change batch arrived.
    Change {
        /// Version after the batch.
        version: Version,
    },
    /// Every edit of the batch for `version` was applied.
    BatchApplied {
        /// Version the batch produced.
        version: Version,
    },
    /// An edit of the batch for `version` was rejected.
    BatchFailed {
        /// Version the batch would have produced.
        version: Version,
        /// Rejection reason.
        reason: String,
    },
}

/// Actions for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Overwrite the local text with the snapshot's text.
    ReplaceText {
        /// Bring the document into view as well.
        reveal: bool,
    },
    /// Apply the change's transactions in order, then report back.
    ApplyBatch {
        /// Version the batch produces.
        version: Version,
    },
    /// Send `get_file` for this path.
    RequestResync(Anomaly),
    /// Discard the message.
    Drop(Anomaly),
}

impl PathSync {
    /// Create the state of a file never seen before.
    pub fn new() -> Self {
        Self::Unknown
    }

    /// Process an input and return the new state plus actions to execute.
    pub fn on_input(self, input: SyncInput) -> (Self, Vec<SyncAction>) {
        match (self, input) {
            // Snapshots
            (Self::Unknown, SyncInput::Snapshot { version, .. }) => (
                Self::Synced { version },
                vec![SyncAction::ReplaceText { reveal: true }],
            ),
            (Self::Synced { version: local }, SyncInput::Snapshot { version, .. })
                if version < local =>
            {
                (
                    self,
                    vec![SyncAction::Drop(Anomaly::Stale {
                        local,
                        received: version,
                    })],
                )
            }
            (Self::Synced { .. }, SyncInput::Snapshot { version, open }) => (
                Self::Synced { version },
                vec![SyncAction::ReplaceText { reveal: open }],
            ),

            // Changes
            (Self::Unknown, SyncInput::Change { .. }) => {
                (self, vec![SyncAction::Drop(Anomaly::UnknownFile)])
            }
            (Self::Synced { version: local }, SyncInput::Change { version })
                if local.is_followed_by(version) =>
            {
                (self, vec![SyncAction::ApplyBatch { version }])
            }
            (Self::Synced { version: local }, SyncInput::Change { version }) => (
                self,
                vec![SyncAction::RequestResync(Anomaly::SequenceGap {
                    expected: local.next(),
                    received: version,
                })],
            ),

            // Batch outcomes
            (Self::Synced { version: local }, SyncInput::BatchApplied { version })
                if local.is_followed_by(version) =>
            {
                (Self::Synced { version }, vec![])
            }
            (Self::Synced { .. }, SyncInput::BatchFailed { version, reason }) => (
                self,
                vec![SyncAction::RequestResync(Anomaly::ApplyFailure {
                    version,
                    reason,
                })],
            ),

            // Outcomes for a batch that no longer matches local state
            (state, _) => (state, vec![]),
        }
    }

    /// The local version, if a snapshot has been received.
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Unknown => None,
            Self::Synced { version } => Some(*version),
        }
    }

    /// Check if a snapshot has been received.
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(v: u64) -> PathSync {
        PathSync::Synced {
            version: Version::new(v),
        }
    }

    fn snapshot(v: u64, open: bool) -> SyncInput {
        SyncInput::Snapshot {
            version: Version::new(v),
            open,
        }
    }

    fn change(v: u64) -> SyncInput {
        SyncInput::Change {
            version: Version::new(v),
        }
    }

    #[test]
    fn initial_state_is_unknown() {
        let state = PathSync::new();
        assert_eq!(state, PathSync::Unknown);
        assert!(state.version().is_none());
    }

    #[test]
    fn first_snapshot_syncs_and_reveals() {
        let (state, actions) = PathSync::new().on_input(snapshot(0, false));
        assert_eq!(state, synced(0));
        assert_eq!(actions, vec![SyncAction::ReplaceText { reveal: true }]);
    }

    #[test]
    fn newer_snapshot_replaces_and_reveals_only_if_open() {
        let (state, actions) = synced(1).on_input(snapshot(3, false));
        assert_eq!(state, synced(3));
        assert_eq!(actions, vec![SyncAction::ReplaceText { reveal: false }]);

        let (_, actions) = synced(3).on_input(snapshot(4, true));
        assert_eq!(actions, vec![SyncAction::ReplaceText { reveal: true }]);
    }

    #[test]
    fn equal_version_snapshot_is_rewritten() {
        let (state, actions) = synced(2).on_input(snapshot(2, false));
        assert_eq!(state, synced(2));
        assert_eq!(actions, vec![SyncAction::ReplaceText { reveal: false }]);
    }

    #[test]
    fn stale_snapshot_is_dropped() {
        let (state, actions) = synced(5).on_input(snapshot(3, true));
        assert_eq!(state, synced(5));
        assert_eq!(
            actions,
            vec![SyncAction::Drop(Anomaly::Stale {
                local: Version::new(5),
                received: Version::new(3),
            })]
        );
    }

    #[test]
    fn change_for_unknown_file_is_dropped() {
        let (state, actions) = PathSync::new().on_input(change(1));
        assert_eq!(state, PathSync::Unknown);
        assert_eq!(actions, vec![SyncAction::Drop(Anomaly::UnknownFile)]);
    }

    #[test]
    fn next_change_applies_then_advances() {
        let (state, actions) = synced(0).on_input(change(1));
        assert_eq!(state, synced(0));
        assert_eq!(
            actions,
            vec![SyncAction::ApplyBatch {
                version: Version::new(1)
            }]
        );

        let (state, actions) = state.on_input(SyncInput::BatchApplied {
            version: Version::new(1),
        });
        assert_eq!(state, synced(1));
        assert!(actions.is_empty());
    }

    #[test]
    fn gap_requests_exactly_one_resync() {
        let (state, actions) = synced(5).on_input(change(7));
        assert_eq!(state, synced(5));
        assert_eq!(
            actions,
            vec![SyncAction::RequestResync(Anomaly::SequenceGap {
                expected: Version::new(6),
                received: Version::new(7),
            })]
        );
    }

    #[test]
    fn replayed_change_is_treated_as_gap() {
        let (state, actions) = synced(5).on_input(change(5));
        assert_eq!(state, synced(5));
        assert!(matches!(
            actions.as_slice(),
            [SyncAction::RequestResync(Anomaly::SequenceGap { .. })]
        ));
    }

    #[test]
    fn failed_batch_keeps_version_and_resyncs() {
        let (state, actions) = synced(2).on_input(SyncInput::BatchFailed {
            version: Version::new(3),
            reason: "line 9 out of range".into(),
        });
        assert_eq!(state, synced(2));
        assert_eq!(
            actions,
            vec![SyncAction::RequestResync(Anomaly::ApplyFailure {
                version: Version::new(3),
                reason: "line 9 out of range".into(),
            })]
        );
    }

    #[test]
    fn mismatched_batch_outcome_is_ignored() {
        let (state, actions) = synced(4).on_input(SyncInput::BatchApplied {
            version: Version::new(9),
        });
        assert_eq!(state, synced(4));
        assert!(actions.is_empty());
    }

    #[test]
    fn resync_snapshot_heals_after_gap() {
        let (state, _) = synced(5).on_input(change(7));
        let (state, actions) = state.on_input(snapshot(7, false));
        assert_eq!(state, synced(7));
        assert_eq!(actions, vec![SyncAction::ReplaceText { reveal: false }]);
    }
}
