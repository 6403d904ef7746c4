//! Transport abstraction for SyncPad.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (framed TCP, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `send()` transmits one encoded message
//! - `recv()` receives one encoded message
//! - `close()` gracefully terminates
//!
//! Delivery is ordered and at-most-once; a lost connection is surfaced as
//! [`TransportError::ConnectionClosed`] and recovered by reconnecting, which
//! always starts a fresh bootstrap.

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::{TcpTransport, TcpTransportConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Transport trait for sending and receiving protocol messages.
///
/// Implementations handle the underlying connection mechanism and framing;
/// callers deal in whole encoded messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the host at the given address.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one encoded message.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive one encoded message.
    ///
    /// Blocks until a message is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
