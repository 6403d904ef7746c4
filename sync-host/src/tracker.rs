//! Change tracking for shared files.
//!
//! The [`ChangeTracker`] owns the table of tracked files. Edits are validated
//! and queued per file; the first edit after a quiet period arms that file's
//! throttle, and when the window ends the whole queue is broadcast as one
//! [`ChangeMessage`] with the version advanced by one.

use std::collections::BTreeMap;
use std::sync::Arc;

use syncpad_core::{FileState, SnapshotWaiter};
use syncpad_types::{ChangeMessage, DocPath, ServerMessage, Transaction, Version};
use tokio::sync::mpsc;

use crate::config::TrackerConfig;
use crate::error::TrackError;
use crate::hub::Outbox;
use crate::metrics::HostMetrics;
use crate::throttle::{Throttle, ThrottleFired};

/// What happened to a recorded edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Queued for the next throttled flush.
    Queued,
    /// Queued, and the queue hit its cap so the file was flushed at once.
    /// Carries the snapshot subscribers that flush released.
    FlushedEarly(Vec<SnapshotWaiter>),
    /// The path is not tracked; nothing happened.
    Untracked,
    /// Nothing to record (no edits, or the text already matches).
    Unchanged,
}

/// Table of tracked files plus their throttles.
#[derive(Debug)]
pub struct ChangeTracker<O: Outbox> {
    files: BTreeMap<DocPath, FileState>,
    throttle: Throttle<DocPath>,
    outbox: O,
    max_pending: usize,
    metrics: Arc<HostMetrics>,
}

impl<O: Outbox> ChangeTracker<O> {
    /// Create a tracker delivering through `outbox`.
    ///
    /// Throttle fires are reported on `fired`; the receiver's owner must pass
    /// them back through [`on_throttle_fired`](Self::on_throttle_fired).
    pub fn new(
        outbox: O,
        config: &TrackerConfig,
        fired: mpsc::UnboundedSender<ThrottleFired<DocPath>>,
        metrics: Arc<HostMetrics>,
    ) -> Self {
        Self {
            files: BTreeMap::new(),
            throttle: Throttle::new(config.throttle_delay(), fired),
            outbox,
            max_pending: config.max_pending_transactions.max(1),
            metrics,
        }
    }

    /// Start tracking `path` at version 0 and broadcast its snapshot.
    ///
    /// Returns `false` without effect if the path is already tracked.
    pub fn track(&mut self, path: DocPath, text: &str) -> bool {
        if self.files.contains_key(&path) {
            return false;
        }

        let file = FileState::new(path.clone(), text);
        if let Some(snapshot) = file.current_snapshot(false) {
            self.outbox.broadcast(&ServerMessage::File(snapshot));
        }
        tracing::info!("Tracking {}", path);
        self.files.insert(path, file);
        true
    }

    /// Replace a tracked file's text wholesale.
    ///
    /// Pending edits are discarded, the throttle is cancelled, the version is
    /// bumped and a snapshot marked `open` is broadcast. Returns the new
    /// version, or `None` if the path is not tracked.
    pub fn refresh(&mut self, path: &DocPath, text: &str) -> Option<Version> {
        let file = self.files.get_mut(path)?;
        self.throttle.cancel(path);

        let discarded = file.pending_len();
        let snapshot = file.refresh(text);
        let version = snapshot.version;
        self.outbox.broadcast(&ServerMessage::File(snapshot));

        tracing::info!(
            "Refreshed {} at version {} ({} pending transactions discarded)",
            path,
            version,
            discarded
        );
        Some(version)
    }

    /// Validate and queue a transaction, arming the file's throttle.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::InvalidEdit`] if any edit does not fit the
    /// file's text; nothing is queued in that case.
    pub fn record_edit(
        &mut self,
        path: &DocPath,
        transaction: Transaction,
    ) -> Result<RecordOutcome, TrackError> {
        let Some(file) = self.files.get_mut(path) else {
            tracing::debug!("Ignoring edit for untracked {}", path);
            return Ok(RecordOutcome::Untracked);
        };
        if transaction.is_empty() {
            return Ok(RecordOutcome::Unchanged);
        }

        if let Err(source) = file.add_transaction(transaction) {
            HostMetrics::incr(&self.metrics.edits_rejected);
            tracing::warn!("Rejected edit for {}: {}", path, source);
            return Err(TrackError::InvalidEdit {
                path: path.clone(),
                source,
            });
        }

        if file.pending_len() >= self.max_pending {
            tracing::debug!(
                "Pending queue for {} reached {}, flushing early",
                path,
                self.max_pending
            );
            return Ok(RecordOutcome::FlushedEarly(self.flush(path)));
        }

        self.throttle.arm(path);
        Ok(RecordOutcome::Queued)
    }

    /// Record whatever edit turns the file's current text into `text`.
    ///
    /// The file's current text includes edits still waiting for a flush.
    pub fn record_text(&mut self, path: &DocPath, text: &str) -> Result<RecordOutcome, TrackError> {
        let Some(file) = self.files.get(path) else {
            return Ok(RecordOutcome::Untracked);
        };
        match file.diff_working(text) {
            Some(edit) => self.record_edit(path, Transaction::single(edit)),
            None => Ok(RecordOutcome::Unchanged),
        }
    }

    /// Broadcast the file's pending queue as one change.
    ///
    /// No-op when nothing is pending. Returns the snapshot subscribers the
    /// flush released; each is returned exactly once.
    pub fn flush(&mut self, path: &DocPath) -> Vec<SnapshotWaiter> {
        self.throttle.cancel(path);

        let Some(file) = self.files.get_mut(path) else {
            return Vec::new();
        };
        let Some(flushed) = file.flush_and_increment() else {
            return Vec::new();
        };

        let change = ChangeMessage {
            path: path.clone(),
            version: flushed.version,
            txs: flushed.transactions,
        };
        tracing::debug!(
            "Flushing {} at version {} ({} transactions, {} edits)",
            path,
            change.version,
            change.txs.len(),
            change.edit_count()
        );
        self.outbox.broadcast(&ServerMessage::Change(change));
        HostMetrics::incr(&self.metrics.flushes_total);

        flushed.waiters
    }

    /// Handle a throttle window ending. Stale fires are ignored.
    pub fn on_throttle_fired(&mut self, fired: ThrottleFired<DocPath>) -> Vec<SnapshotWaiter> {
        if !self.throttle.take_fire(&fired) {
            tracing::debug!("Ignoring stale throttle fire for {}", fired.key);
            return Vec::new();
        }
        self.flush(&fired.key)
    }

    /// Cancel every throttle and drop every snapshot subscriber.
    pub fn dispose(&mut self) {
        self.throttle.cancel_all();
        for file in self.files.values_mut() {
            file.clear_waiters();
        }
        tracing::debug!("Tracker disposed ({} files)", self.files.len());
    }

    /// Whether `path` is tracked.
    pub fn is_tracked(&self, path: &DocPath) -> bool {
        self.files.contains_key(path)
    }

    /// State of a tracked file.
    pub fn file(&self, path: &DocPath) -> Option<&FileState> {
        self.files.get(path)
    }

    pub(crate) fn file_mut(&mut self, path: &DocPath) -> Option<&mut FileState> {
        self.files.get_mut(path)
    }

    /// Tracked paths, in order.
    pub fn paths(&self) -> Vec<DocPath> {
        self.files.keys().cloned().collect()
    }

    /// Whether a throttle window is running for `path`.
    pub fn is_throttled(&self, path: &DocPath) -> bool {
        self.throttle.is_armed(path)
    }

    /// The delivery table.
    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    /// The delivery table, mutably.
    pub fn outbox_mut(&mut self) -> &mut O {
        &mut self.outbox
    }
}
