//! # sync-types
//!
//! Wire format types for the SyncPad document sync protocol.
//!
//! This crate provides the foundational types used across all SyncPad crates:
//! - [`DocPath`], [`Version`], [`ConnectionId`] - Identity and ordering types
//! - [`Edit`], [`Transaction`] - Range replacements captured on the host
//! - [`ClientMessage`], [`ServerMessage`] - Protocol events (get_files, file, change, ...)
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;

pub use error::WireError;
pub use ids::{ConnectionId, DocPath, Version};
pub use messages::{
    AncillaryEvent, ChangeMessage, ClientMessage, Edit, FileMessage, ServerMessage, Transaction,
    MAX_MESSAGE_SIZE,
};
