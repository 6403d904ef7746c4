//! SyncServer: answers viewer requests on top of the change tracker.
//!
//! The server never hands out a snapshot of a file with unflushed edits. A
//! request for such a file parks the connection on the file's waiter list;
//! the next flush broadcasts the change and then releases the parked
//! connections, each of which gets the post-flush snapshot.

use std::sync::Arc;

use syncpad_core::SnapshotWaiter;
use syncpad_types::{
    AncillaryEvent, ClientMessage, ConnectionId, DocPath, ServerMessage, Transaction, Version,
};
use tokio::sync::mpsc;

use crate::config::TrackerConfig;
use crate::error::TrackError;
use crate::hub::Outbox;
use crate::metrics::HostMetrics;
use crate::throttle::ThrottleFired;
use crate::tracker::{ChangeTracker, RecordOutcome};

/// Result of sharing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// The file was not tracked before.
    NewlyShared,
    /// The file was already tracked and has been refreshed.
    AlreadyShared,
}

impl ShareOutcome {
    /// User-facing notice for sharing the file called `name`.
    pub fn message(&self, name: &str) -> String {
        match self {
            Self::NewlyShared => format!("Sharing {}.", name),
            Self::AlreadyShared => format!("Refreshing {}.", name),
        }
    }
}

/// Host-side protocol endpoint.
#[derive(Debug)]
pub struct SyncServer<O: Outbox> {
    tracker: ChangeTracker<O>,
    metrics: Arc<HostMetrics>,
}

impl<O: Outbox> SyncServer<O> {
    /// Create a server delivering through `outbox`.
    pub fn new(
        outbox: O,
        config: &TrackerConfig,
        fired: mpsc::UnboundedSender<ThrottleFired<DocPath>>,
        metrics: Arc<HostMetrics>,
    ) -> Self {
        Self {
            tracker: ChangeTracker::new(outbox, config, fired, metrics.clone()),
            metrics,
        }
    }

    /// Register a connection.
    pub fn attach(&mut self, connection: ConnectionId, sink: O::Sink) {
        self.tracker.outbox_mut().attach(connection, sink);
        HostMetrics::incr(&self.metrics.connections_total);
        tracing::info!("Viewer {} attached", connection);
    }

    /// Forget a connection and any snapshot it was waiting for.
    pub fn detach(&mut self, connection: ConnectionId) {
        self.tracker.outbox_mut().detach(connection);
        for path in self.tracker.paths() {
            if let Some(file) = self.tracker.file_mut(&path) {
                file.detach(connection);
            }
        }
        tracing::info!("Viewer {} detached", connection);
    }

    /// Dispatch a message received from a viewer.
    ///
    /// Returns the ancillary event if the message was one, for the caller to
    /// surface.
    pub fn on_client_message(
        &mut self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Option<AncillaryEvent> {
        match message {
            ClientMessage::GetFiles => {
                self.on_request_all_files(connection);
                None
            }
            ClientMessage::GetFile(path) => {
                self.on_request_one_file(connection, &path);
                None
            }
            ClientMessage::Ancillary(event) => {
                tracing::debug!("Ancillary event {:?} from {}", event.name, connection);
                Some(event)
            }
        }
    }

    /// Send every tracked file to `connection`.
    ///
    /// Clean files are sent at once; dirty ones after their next flush.
    pub fn on_request_all_files(&mut self, connection: ConnectionId) {
        let paths = self.tracker.paths();
        tracing::debug!("{} requested all {} files", connection, paths.len());
        for path in paths {
            self.serve_snapshot(connection, &path);
        }
    }

    /// Send one file to `connection`. Unknown paths are ignored.
    pub fn on_request_one_file(&mut self, connection: ConnectionId, path: &DocPath) {
        if !self.tracker.is_tracked(path) {
            tracing::debug!("{} requested untracked {}", connection, path);
            return;
        }
        self.serve_snapshot(connection, path);
    }

    /// Start sharing a file, or refresh it if it is already shared.
    pub fn share(&mut self, path: DocPath, text: &str) -> ShareOutcome {
        if self.tracker.refresh(&path, text).is_some() {
            ShareOutcome::AlreadyShared
        } else {
            self.tracker.track(path, text);
            ShareOutcome::NewlyShared
        }
    }

    /// Record an edit made on the host.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::InvalidEdit`] if the edit does not fit the file.
    pub fn record_edit(
        &mut self,
        path: &DocPath,
        transaction: Transaction,
    ) -> Result<RecordOutcome, TrackError> {
        let outcome = self.tracker.record_edit(path, transaction)?;
        self.after_record(path, &outcome);
        Ok(outcome)
    }

    /// Record the edit that turns the file's current text into `text`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::InvalidEdit`] if the computed edit does not fit.
    pub fn record_text(&mut self, path: &DocPath, text: &str) -> Result<RecordOutcome, TrackError> {
        let outcome = self.tracker.record_text(path, text)?;
        self.after_record(path, &outcome);
        Ok(outcome)
    }

    /// Handle a throttle window ending.
    pub fn on_throttle_fired(&mut self, fired: ThrottleFired<DocPath>) {
        let path = fired.key.clone();
        let waiters = self.tracker.on_throttle_fired(fired);
        self.release(&path, waiters);
    }

    /// Send a passthrough event to every viewer.
    pub fn broadcast_ancillary(&mut self, event: AncillaryEvent) -> usize {
        self.tracker
            .outbox_mut()
            .broadcast(&ServerMessage::Ancillary(event))
    }

    /// Stop every timer and drop every pending request.
    pub fn dispose(&mut self) {
        self.tracker.dispose();
    }

    /// Current version of a tracked file.
    pub fn version(&self, path: &DocPath) -> Option<Version> {
        self.tracker.file(path).map(|f| f.version())
    }

    /// The underlying tracker.
    pub fn tracker(&self) -> &ChangeTracker<O> {
        &self.tracker
    }

    fn after_record(&mut self, path: &DocPath, outcome: &RecordOutcome) {
        if let RecordOutcome::FlushedEarly(waiters) = outcome {
            self.release(path, waiters.clone());
        }
    }

    fn serve_snapshot(&mut self, connection: ConnectionId, path: &DocPath) {
        let Some(file) = self.tracker.file_mut(path) else {
            return;
        };

        match file.request_snapshot(connection, false) {
            Some(snapshot) => {
                if self
                    .tracker
                    .outbox_mut()
                    .send_to(connection, ServerMessage::File(snapshot))
                {
                    HostMetrics::incr(&self.metrics.snapshots_sent);
                }
            }
            None => {
                HostMetrics::incr(&self.metrics.snapshots_deferred);
                tracing::debug!("Deferring snapshot of {} for {} until flush", path, connection);
            }
        }
    }

    fn release(&mut self, path: &DocPath, waiters: Vec<SnapshotWaiter>) {
        for waiter in waiters {
            let Some(snapshot) = self
                .tracker
                .file(path)
                .and_then(|f| f.current_snapshot(waiter.open))
            else {
                continue;
            };
            if self
                .tracker
                .outbox_mut()
                .send_to(waiter.connection, ServerMessage::File(snapshot))
            {
                HostMetrics::incr(&self.metrics.snapshots_sent);
            }
        }
    }
}
