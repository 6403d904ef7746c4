//! Mock transport for testing.
//!
//! Scripted host messages are queued up front; everything the client sends is
//! captured for inspection. Clones share state, so a test can keep one clone
//! while the client owns another.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use syncpad_types::{ClientMessage, ServerMessage};

/// Mock transport for testing.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    connect_count: usize,
    sent: Vec<Vec<u8>>,
    incoming: VecDeque<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue raw bytes to be returned by a later `recv()`.
    pub fn queue_bytes(&self, data: Vec<u8>) {
        self.lock().incoming.push_back(data);
    }

    /// Queue a host message to be returned by a later `recv()`.
    pub fn queue_message(&self, message: &ServerMessage) {
        // Encoding a well-formed message cannot fail; skip it if it somehow does.
        if let Ok(bytes) = message.to_bytes() {
            self.queue_bytes(bytes);
        }
    }

    /// Raw bytes of every sent message.
    pub fn sent_bytes(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Every sent message, decoded. Undecodable messages are skipped.
    pub fn sent_messages(&self) -> Vec<ClientMessage> {
        self.lock()
            .sent
            .iter()
            .filter_map(|bytes| ClientMessage::from_bytes(bytes).ok())
            .collect()
    }

    /// Forget captured outgoing messages.
    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        self.lock().connected_address.clone()
    }

    /// Number of successful `connect()` calls.
    pub fn connect_count(&self) -> usize {
        self.lock().connect_count
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        inner.connect_count += 1;
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // An exhausted script behaves like the host hanging up.
        inner
            .incoming
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.lock().connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncpad_types::{AncillaryEvent, DocPath};

    #[tokio::test]
    async fn captures_sent_client_messages() {
        let transport = MockTransport::new();
        transport.connect("127.0.0.1:8080").await.unwrap();

        transport
            .send(&ClientMessage::GetFiles.to_bytes().unwrap())
            .await
            .unwrap();
        transport
            .send(
                &ClientMessage::GetFile(DocPath::new("a.txt").unwrap())
                    .to_bytes()
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            transport.sent_messages(),
            vec![
                ClientMessage::GetFiles,
                ClientMessage::GetFile(DocPath::new("a.txt").unwrap())
            ]
        );
        assert_eq!(
            transport.connected_address().as_deref(),
            Some("127.0.0.1:8080")
        );
    }

    #[tokio::test]
    async fn replays_queued_messages_then_closes() {
        let transport = MockTransport::new();
        transport.connect("host").await.unwrap();
        let message =
            ServerMessage::Ancillary(AncillaryEvent::new("clear", serde_json::Value::Null));
        transport.queue_message(&message);

        let bytes = transport.recv().await.unwrap();
        assert_eq!(ServerMessage::from_bytes(&bytes).unwrap(), message);
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let transport = MockTransport::new();
        let handle = transport.clone();

        transport.connect("host").await.unwrap();
        transport.send(b"x").await.unwrap();

        assert!(handle.is_connected());
        assert_eq!(handle.sent_bytes(), vec![b"x".to_vec()]);
    }

    #[tokio::test]
    async fn io_requires_connection() {
        let transport = MockTransport::new();
        assert!(matches!(
            transport.send(b"x").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn forced_failures_fire_once() {
        let transport = MockTransport::new();
        transport.fail_next_connect("refused");
        assert!(matches!(
            transport.connect("host").await,
            Err(TransportError::ConnectionFailed(_))
        ));
        transport.connect("host").await.unwrap();
        assert_eq!(transport.connect_count(), 1);

        transport.fail_next_send("broken pipe");
        assert!(transport.send(b"a").await.is_err());
        assert!(transport.send(b"b").await.is_ok());
    }
}
