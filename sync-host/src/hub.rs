//! Per-connection delivery.
//!
//! Every message bound for a connection, whether a broadcast or a direct
//! reply, goes through that connection's single queue. Since only the host
//! actor pushes into the queues, each viewer receives messages in exactly the
//! order the actor issued them.

use std::collections::BTreeMap;
use syncpad_types::{ConnectionId, ServerMessage};
use tokio::sync::mpsc;

/// Delivery table for connected viewers.
pub trait Outbox {
    /// Handle through which a connection receives its messages.
    type Sink;

    /// Register a connection.
    fn attach(&mut self, connection: ConnectionId, sink: Self::Sink);

    /// Forget a connection. Returns `true` if it was registered.
    fn detach(&mut self, connection: ConnectionId) -> bool;

    /// Queue a message for one connection. Returns `false` if it is gone.
    fn send_to(&mut self, connection: ConnectionId, message: ServerMessage) -> bool;

    /// Queue a message for every connection. Returns the number reached.
    fn broadcast(&mut self, message: &ServerMessage) -> usize;

    /// Number of registered connections.
    fn connection_count(&self) -> usize;
}

/// Outbox backed by one unbounded channel per connection.
///
/// A connection whose receiver was dropped is removed on the next send.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: BTreeMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `connection` is registered.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }
}

impl Outbox for ConnectionHub {
    type Sink = mpsc::UnboundedSender<ServerMessage>;

    fn attach(&mut self, connection: ConnectionId, sink: Self::Sink) {
        self.connections.insert(connection, sink);
    }

    fn detach(&mut self, connection: ConnectionId) -> bool {
        self.connections.remove(&connection).is_some()
    }

    fn send_to(&mut self, connection: ConnectionId, message: ServerMessage) -> bool {
        let Some(sink) = self.connections.get(&connection) else {
            return false;
        };

        if sink.send(message).is_err() {
            tracing::debug!("Dropping closed connection {}", connection);
            self.connections.remove(&connection);
            return false;
        }
        true
    }

    fn broadcast(&mut self, message: &ServerMessage) -> usize {
        let mut closed = Vec::new();
        for (connection, sink) in &self.connections {
            if sink.send(message.clone()).is_err() {
                closed.push(*connection);
            }
        }

        for connection in &closed {
            tracing::debug!("Dropping closed connection {}", connection);
            self.connections.remove(connection);
        }
        self.connections.len()
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// A message recorded by [`MemoryOutbox`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Sent to every connection.
    Broadcast(ServerMessage),
    /// Sent to one connection.
    Direct(ConnectionId, ServerMessage),
}

/// Outbox that records deliveries instead of sending them.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    connections: Vec<ConnectionId>,
    deliveries: Vec<Delivery>,
}

impl MemoryOutbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order.
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Take and clear the recorded deliveries.
    pub fn drain(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.deliveries)
    }
}

impl Outbox for MemoryOutbox {
    type Sink = ();

    fn attach(&mut self, connection: ConnectionId, _sink: ()) {
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
    }

    fn detach(&mut self, connection: ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| *c != connection);
        before != self.connections.len()
    }

    fn send_to(&mut self, connection: ConnectionId, message: ServerMessage) -> bool {
        if !self.connections.contains(&connection) {
            return false;
        }
        self.deliveries.push(Delivery::Direct(connection, message));
        true
    }

    fn broadcast(&mut self, message: &ServerMessage) -> usize {
        self.deliveries.push(Delivery::Broadcast(message.clone()));
        self.connections.len()
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncpad_types::AncillaryEvent;

    fn ping(name: &str) -> ServerMessage {
        ServerMessage::Ancillary(AncillaryEvent::new(name, serde_json::Value::Null))
    }

    #[test]
    fn broadcast_and_direct_share_one_queue() {
        let mut hub = ConnectionHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.attach(ConnectionId::new(1), tx);

        hub.broadcast(&ping("first"));
        hub.send_to(ConnectionId::new(1), ping("second"));
        hub.broadcast(&ping("third"));

        for expected in ["first", "second", "third"] {
            assert_eq!(rx.try_recv().unwrap(), ping(expected));
        }
    }

    #[test]
    fn closed_connections_are_pruned() {
        let mut hub = ConnectionHub::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        hub.attach(ConnectionId::new(1), tx1);
        hub.attach(ConnectionId::new(2), tx2);
        drop(rx1);

        assert_eq!(hub.broadcast(&ping("x")), 1);
        assert!(!hub.contains(ConnectionId::new(1)));
        assert!(!hub.send_to(ConnectionId::new(1), ping("y")));
    }

    #[test]
    fn send_to_unknown_connection_fails() {
        let mut hub = ConnectionHub::new();
        assert!(!hub.send_to(ConnectionId::new(9), ping("x")));
        assert!(!hub.detach(ConnectionId::new(9)));
    }

    #[test]
    fn memory_outbox_records_in_order() {
        let mut outbox = MemoryOutbox::new();
        outbox.attach(ConnectionId::new(1), ());

        outbox.broadcast(&ping("a"));
        outbox.send_to(ConnectionId::new(1), ping("b"));
        assert!(!outbox.send_to(ConnectionId::new(2), ping("c")));

        assert_eq!(
            outbox.drain(),
            vec![
                Delivery::Broadcast(ping("a")),
                Delivery::Direct(ConnectionId::new(1), ping("b")),
            ]
        );
        assert!(outbox.deliveries().is_empty());
    }
}
