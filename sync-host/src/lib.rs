//! # sync-host
//!
//! Authoring side of SyncPad.
//!
//! This crate implements the host that:
//! - Tracks shared files with a per-file version counter
//! - Batches edits behind a per-file trailing-edge throttle
//! - Broadcasts change batches and full-text snapshots to every viewer
//! - Never hands out a snapshot whose text and version disagree
//!
//! ## Architecture
//!
//! ```text
//!  editor / file watcher
//!            │ share, record_edit
//!            ▼
//!  ┌─────────────────────────────────────┐
//!  │            host actor               │
//!  │  SyncServer ─► ChangeTracker        │
//!  │                 ├─ FileState × N    │
//!  │                 ├─ Throttle         │
//!  │                 └─ ConnectionHub    │
//!  └──────────────┬──────────────────────┘
//!                 │ one ordered queue per viewer
//!        ┌────────┼────────┐
//!        ▼        ▼        ▼
//!     Session  Session  Session   (TCP, length-prefixed MessagePack)
//! ```
//!
//! ## Protocol
//!
//! Viewers send `get_files` / `get_file`; the host answers with `file`
//! snapshots and pushes `change` batches as edits are flushed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod hub;
pub mod listener;
pub mod metrics;
pub mod runtime;
pub mod server;
pub mod session;
pub mod throttle;
pub mod tracker;

pub use config::{Config, ConfigError, ServerConfig, TrackerConfig, WatchConfig};
pub use error::{HostError, TrackError};
pub use hub::{ConnectionHub, Delivery, MemoryOutbox, Outbox};
pub use metrics::{HostMetrics, MetricsSnapshot};
pub use runtime::{spawn_host, HostHandle, IncomingAncillary};
pub use server::{ShareOutcome, SyncServer};
pub use throttle::{Throttle, ThrottleFired};
pub use tracker::{ChangeTracker, RecordOutcome};
