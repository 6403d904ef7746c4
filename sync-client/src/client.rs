//! SyncClient - the viewer side of SyncPad.
//!
//! This module provides [`SyncClient`], which keeps a set of documents in
//! step with a host.
//!
//! # Architecture
//!
//! SyncClient uses a pure per-file state machine (from sync-core) for the
//! reconciliation rules and interprets the actions it returns, performing the
//! actual I/O via the Transport trait and the document edits via a
//! [`DocumentAdapter`].
//!
//! ```text
//! Host → Transport → SyncClient → DocumentAdapter
//!                        ↓
//!              sync-core (PathSync per file)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use syncpad_client::{MemoryDocuments, SyncClient, TcpTransport};
//!
//! let mut client = SyncClient::new("127.0.0.1:8080", TcpTransport::new(), MemoryDocuments::new());
//! client.connect().await?;
//! loop {
//!     for event in client.next_events().await? {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;
use syncpad_core::{Anomaly, PathSync, SyncAction, SyncInput};
use syncpad_types::{
    AncillaryEvent, ChangeMessage, ClientMessage, DocPath, FileMessage, ServerMessage,
    Transaction, Version, WireError,
};

use crate::document::DocumentAdapter;
use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Message encoding error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Not connected to a host.
    #[error("not connected")]
    NotConnected,
}

/// Something the application may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A document was (re)loaded from a snapshot and should be shown.
    FileOpened {
        /// The document.
        path: DocPath,
        /// Its version.
        version: Version,
    },
    /// A document's content changed.
    FileUpdated {
        /// The document.
        path: DocPath,
        /// Its version.
        version: Version,
    },
    /// The document fell out of step and a fresh snapshot was requested.
    ResyncRequested {
        /// The document.
        path: DocPath,
        /// What went wrong.
        anomaly: Anomaly,
    },
    /// Passthrough event from the host.
    Ancillary(AncillaryEvent),
}

/// Content carried by the message being reconciled.
enum Payload<'a> {
    Text(&'a str),
    Batch(&'a [Transaction]),
}

/// Viewer connected to one host.
pub struct SyncClient<T: Transport, D: DocumentAdapter> {
    address: String,
    transport: T,
    documents: D,
    files: BTreeMap<DocPath, PathSync>,
}

impl<T: Transport, D: DocumentAdapter> std::fmt::Debug for SyncClient<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("address", &self.address)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, D: DocumentAdapter> SyncClient<T, D> {
    /// Create a client for the host at `address`.
    pub fn new(address: impl Into<String>, transport: T, documents: D) -> Self {
        Self {
            address: address.into(),
            transport,
            documents,
            files: BTreeMap::new(),
        }
    }

    /// Connect and request every file.
    ///
    /// Versions are never carried across connections: all local sync state
    /// is discarded first and rebuilt from the host's snapshots.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.files.clear();
        self.transport.connect(&self.address).await?;
        tracing::info!("Connected to {}", self.address);
        self.send(&ClientMessage::GetFiles).await
    }

    /// Close the connection and drop local sync state.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        self.files.clear();
        self.transport.close().await?;
        tracing::info!("Disconnected from {}", self.address);
        Ok(())
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Ask the host for a fresh snapshot of one file.
    pub async fn request_file(&mut self, path: DocPath) -> Result<(), ClientError> {
        self.send(&ClientMessage::GetFile(path)).await
    }

    /// Send a passthrough event to the host.
    pub async fn send_ancillary(&mut self, event: AncillaryEvent) -> Result<(), ClientError> {
        self.send(&ClientMessage::Ancillary(event)).await
    }

    /// Wait for the next host message and reconcile it.
    pub async fn next_events(&mut self) -> Result<Vec<ClientEvent>, ClientError> {
        let bytes = self.transport.recv().await?;
        let message = ServerMessage::from_bytes(&bytes)?;
        self.handle_message(message).await
    }

    /// Reconcile one host message.
    pub async fn handle_message(
        &mut self,
        message: ServerMessage,
    ) -> Result<Vec<ClientEvent>, ClientError> {
        match message {
            ServerMessage::File(file) => self.on_snapshot(file).await,
            ServerMessage::Change(change) => self.on_change(change).await,
            ServerMessage::Ancillary(event) => {
                tracing::debug!("Ancillary event {:?}", event.name);
                Ok(vec![ClientEvent::Ancillary(event)])
            }
        }
    }

    /// Reconcile a full-text snapshot.
    pub async fn on_snapshot(
        &mut self,
        file: FileMessage,
    ) -> Result<Vec<ClientEvent>, ClientError> {
        let input = SyncInput::Snapshot {
            version: file.version,
            open: file.open,
        };
        self.drive(&file.path, input, Payload::Text(&file.text))
            .await
    }

    /// Reconcile a change batch.
    pub async fn on_change(
        &mut self,
        change: ChangeMessage,
    ) -> Result<Vec<ClientEvent>, ClientError> {
        let input = SyncInput::Change {
            version: change.version,
        };
        self.drive(&change.path, input, Payload::Batch(&change.txs))
            .await
    }

    /// Local version of a file.
    pub fn version(&self, path: &DocPath) -> Option<Version> {
        self.files.get(path).and_then(PathSync::version)
    }

    /// Every file with a local version.
    pub fn files(&self) -> Vec<DocPath> {
        self.files.keys().cloned().collect()
    }

    /// The document store.
    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// The document store, mutably.
    pub fn documents_mut(&mut self) -> &mut D {
        &mut self.documents
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn drive(
        &mut self,
        path: &DocPath,
        input: SyncInput,
        payload: Payload<'_>,
    ) -> Result<Vec<ClientEvent>, ClientError> {
        let state = self.files.get(path).copied().unwrap_or_default();
        let (mut state, actions) = state.on_input(input);
        let mut queue: VecDeque<SyncAction> = actions.into();
        let mut events = Vec::new();

        while let Some(action) = queue.pop_front() {
            match action {
                SyncAction::ReplaceText { reveal } => {
                    let (Payload::Text(text), Some(version)) = (&payload, state.version()) else {
                        continue;
                    };
                    self.documents.replace_text(path, text);
                    if reveal {
                        self.documents.reveal(path);
                        events.push(ClientEvent::FileOpened {
                            path: path.clone(),
                            version,
                        });
                    } else {
                        events.push(ClientEvent::FileUpdated {
                            path: path.clone(),
                            version,
                        });
                    }
                }
                SyncAction::ApplyBatch { version } => {
                    let Payload::Batch(transactions) = &payload else {
                        continue;
                    };
                    let outcome = match self.apply_batch(path, transactions) {
                        Ok(()) => SyncInput::BatchApplied { version },
                        Err(reason) => SyncInput::BatchFailed { version, reason },
                    };
                    let (next, follow_up) = state.on_input(outcome);
                    if next != state {
                        events.push(ClientEvent::FileUpdated {
                            path: path.clone(),
                            version,
                        });
                    }
                    state = next;
                    queue.extend(follow_up);
                }
                SyncAction::RequestResync(anomaly) => {
                    tracing::warn!("Resyncing {}: {}", path, anomaly);
                    self.send(&ClientMessage::GetFile(path.clone())).await?;
                    events.push(ClientEvent::ResyncRequested {
                        path: path.clone(),
                        anomaly,
                    });
                }
                SyncAction::Drop(anomaly) => {
                    tracing::debug!("Dropping message for {}: {}", path, anomaly);
                }
            }
        }

        if state.is_synced() {
            self.files.insert(path.clone(), state);
        }
        Ok(events)
    }

    fn apply_batch(&mut self, path: &DocPath, transactions: &[Transaction]) -> Result<(), String> {
        for transaction in transactions {
            for edit in &transaction.changes {
                self.documents
                    .apply_edit(path, edit)
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }

    async fn send(&self, message: &ClientMessage) -> Result<(), ClientError> {
        if !self.transport.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let bytes = message.to_bytes()?;
        self.transport.send(&bytes).await?;
        Ok(())
    }
}
