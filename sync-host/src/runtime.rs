//! The host actor.
//!
//! One tokio task owns the [`SyncServer`] and with it every file's state, the
//! throttle table and the connection table. Everything that touches that state
//! (host edits, viewer requests, throttle fires, attach/detach) arrives as a
//! command on a single queue and is processed to completion before the next
//! one, so each file has exactly one writer.
//!
//! [`HostHandle`] is the cheap, cloneable front door to the actor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use syncpad_types::{
    AncillaryEvent, ClientMessage, ConnectionId, DocPath, ServerMessage, Transaction, Version,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::TrackerConfig;
use crate::error::{HostError, Result};
use crate::hub::ConnectionHub;
use crate::metrics::HostMetrics;
use crate::server::{ShareOutcome, SyncServer};
use crate::tracker::RecordOutcome;

/// Capacity of the command queue.
const COMMAND_QUEUE: usize = 1024;

/// Capacity of the incoming-ancillary fan-out.
const ANCILLARY_QUEUE: usize = 64;

/// An ancillary event sent by a viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingAncillary {
    /// Sender.
    pub connection: ConnectionId,
    /// The event.
    pub event: AncillaryEvent,
}

enum Command {
    Share {
        path: DocPath,
        text: String,
        reply: oneshot::Sender<ShareOutcome>,
    },
    RecordEdit {
        path: DocPath,
        transaction: Transaction,
        reply: oneshot::Sender<std::result::Result<RecordOutcome, crate::TrackError>>,
    },
    RecordText {
        path: DocPath,
        text: String,
        reply: oneshot::Sender<std::result::Result<RecordOutcome, crate::TrackError>>,
    },
    Attach {
        connection: ConnectionId,
        sink: mpsc::UnboundedSender<ServerMessage>,
    },
    Detach {
        connection: ConnectionId,
    },
    Client {
        connection: ConnectionId,
        message: ClientMessage,
    },
    BroadcastAncillary(AncillaryEvent),
    Version {
        path: DocPath,
        reply: oneshot::Sender<Option<Version>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running host actor.
#[derive(Debug, Clone)]
pub struct HostHandle {
    commands: mpsc::Sender<Command>,
    ancillary: broadcast::Sender<IncomingAncillary>,
    metrics: Arc<HostMetrics>,
    next_connection: Arc<AtomicU64>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Share { .. } => "Share",
            Command::RecordEdit { .. } => "RecordEdit",
            Command::RecordText { .. } => "RecordText",
            Command::Attach { .. } => "Attach",
            Command::Detach { .. } => "Detach",
            Command::Client { .. } => "Client",
            Command::BroadcastAncillary(_) => "BroadcastAncillary",
            Command::Version { .. } => "Version",
            Command::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Spawn the host actor.
///
/// Returns the handle plus the actor task, which ends after
/// [`HostHandle::shutdown`] or once every handle is dropped.
pub fn spawn_host(config: &TrackerConfig) -> (HostHandle, JoinHandle<()>) {
    let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
    let (ancillary, _) = broadcast::channel(ANCILLARY_QUEUE);
    let metrics = Arc::new(HostMetrics::default());

    let mut server = SyncServer::new(ConnectionHub::new(), config, fired_tx, metrics.clone());
    let handle = HostHandle {
        commands,
        ancillary: ancillary.clone(),
        metrics: metrics.clone(),
        next_connection: Arc::new(AtomicU64::new(1)),
    };

    let task = tokio::spawn(async move {
        let mut command_rx = command_rx;
        tracing::info!("Host actor started");

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        server.dispose();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => handle_command(&mut server, &ancillary, command),
                    None => {
                        server.dispose();
                        break;
                    }
                },
                Some(fired) = fired_rx.recv() => server.on_throttle_fired(fired),
            }
        }

        metrics.log_summary();
        tracing::info!("Host actor stopped");
    });

    (handle, task)
}

fn handle_command(
    server: &mut SyncServer<ConnectionHub>,
    ancillary: &broadcast::Sender<IncomingAncillary>,
    command: Command,
) {
    match command {
        Command::Share { path, text, reply } => {
            let outcome = server.share(path, &text);
            let _ = reply.send(outcome);
        }
        Command::RecordEdit {
            path,
            transaction,
            reply,
        } => {
            let _ = reply.send(server.record_edit(&path, transaction));
        }
        Command::RecordText { path, text, reply } => {
            let _ = reply.send(server.record_text(&path, &text));
        }
        Command::Attach { connection, sink } => server.attach(connection, sink),
        Command::Detach { connection } => server.detach(connection),
        Command::Client {
            connection,
            message,
        } => {
            if let Some(event) = server.on_client_message(connection, message) {
                // No subscribers is fine.
                let _ = ancillary.send(IncomingAncillary { connection, event });
            }
        }
        Command::BroadcastAncillary(event) => {
            server.broadcast_ancillary(event);
        }
        Command::Version { path, reply } => {
            let _ = reply.send(server.version(&path));
        }
        Command::Shutdown { .. } => {}
    }
}

impl HostHandle {
    /// Share a file, or refresh it if already shared.
    pub async fn share(&self, path: DocPath, text: impl Into<String>) -> Result<ShareOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Share {
            path,
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| HostError::Closed)
    }

    /// Record an edit made on the host.
    pub async fn record_edit(
        &self,
        path: DocPath,
        transaction: Transaction,
    ) -> Result<RecordOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RecordEdit {
            path,
            transaction,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| HostError::Closed)??)
    }

    /// Record the edit turning a file's current text into `text`.
    pub async fn record_text(
        &self,
        path: DocPath,
        text: impl Into<String>,
    ) -> Result<RecordOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RecordText {
            path,
            text: text.into(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| HostError::Closed)??)
    }

    /// Register a new viewer connection.
    ///
    /// Returns its id and the ordered queue of messages to deliver to it.
    pub async fn attach(&self) -> Result<(ConnectionId, mpsc::UnboundedReceiver<ServerMessage>)> {
        let connection = ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (sink, outgoing) = mpsc::unbounded_channel();
        self.send(Command::Attach { connection, sink }).await?;
        Ok((connection, outgoing))
    }

    /// Unregister a viewer connection.
    pub async fn detach(&self, connection: ConnectionId) -> Result<()> {
        self.send(Command::Detach { connection }).await
    }

    /// Hand a message received from a viewer to the actor.
    pub async fn client_message(
        &self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<()> {
        self.send(Command::Client {
            connection,
            message,
        })
        .await
    }

    /// Send a passthrough event to every viewer.
    pub async fn broadcast_ancillary(&self, event: AncillaryEvent) -> Result<()> {
        self.send(Command::BroadcastAncillary(event)).await
    }

    /// Current version of a shared file.
    pub async fn version(&self, path: DocPath) -> Result<Option<Version>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Version { path, reply }).await?;
        rx.await.map_err(|_| HostError::Closed)
    }

    /// Subscribe to ancillary events sent by viewers.
    pub fn ancillary_events(&self) -> broadcast::Receiver<IncomingAncillary> {
        self.ancillary.subscribe()
    }

    /// Operational counters.
    pub fn metrics(&self) -> &Arc<HostMetrics> {
        &self.metrics
    }

    /// Stop the actor, cancelling every pending timer.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| HostError::Closed)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HostError::Closed)
    }
}
