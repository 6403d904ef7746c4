//! # sync-client
//!
//! Viewer library for SyncPad.
//!
//! This is the library a viewer uses to mirror the files a host shares.
//!
//! ## Features
//!
//! - **Full bootstrap**: every connect requests a fresh snapshot of every file
//! - **Ordered batches**: change batches apply only on top of the version
//!   they were produced from
//! - **Self-healing**: gaps and rejected edits trigger a per-file resync
//! - **Transport Abstraction**: Pluggable transport layer (TCP, mock)
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use syncpad_client::{MemoryDocuments, SyncClient, TcpTransport};
//!
//! let mut client = SyncClient::new("127.0.0.1:8080", TcpTransport::new(), MemoryDocuments::new());
//! client.connect().await?;
//! let events = client.next_events().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod document;
pub mod transport;

pub use client::{ClientError, ClientEvent, SyncClient};
pub use document::{DocumentAdapter, MemoryDocuments};
pub use transport::{MockTransport, TcpTransport, TcpTransportConfig, Transport, TransportError};
