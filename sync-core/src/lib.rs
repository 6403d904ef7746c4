//! # sync-core
//!
//! Pure logic for SyncPad (no I/O, instant tests).
//!
//! This crate implements the text model, the host's per-file bookkeeping and
//! the viewer's reconciliation machine without any network or disk I/O,
//! enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! Timers, sockets and connection tables live in `sync-host` and
//! `sync-client`, which drive these types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anomaly;
pub mod document;
pub mod file_state;
pub mod viewer;

pub use anomaly::Anomaly;
pub use document::{ApplyError, Document};
pub use file_state::{FileState, Flushed, SnapshotWaiter};
pub use viewer::{PathSync, SyncAction, SyncInput};
