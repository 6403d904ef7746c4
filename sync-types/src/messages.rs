//! Protocol messages for SyncPad.
//!
//! Every event travels as `{"event": <name>, "payload": <body>}`. Viewers send
//! [`ClientMessage`]s, the host sends [`ServerMessage`]s.

use serde::{Deserialize, Serialize};

use crate::{DocPath, Version, WireError};

/// Maximum encoded message size (16MB, bounds a full-text snapshot).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Replacement of a zero-based `[start, end)` range by literal text.
///
/// An empty `text` is a deletion, a zero-width range is an insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// Replacement text
    pub text: String,
    /// Start line
    #[serde(rename = "sl")]
    pub start_line: u32,
    /// Start column
    #[serde(rename = "sc")]
    pub start_col: u32,
    /// End line
    #[serde(rename = "el")]
    pub end_line: u32,
    /// End column
    #[serde(rename = "ec")]
    pub end_col: u32,
}

impl Edit {
    /// Replace the range `(start_line, start_col)..(end_line, end_col)` with `text`.
    pub fn replace(
        start: (u32, u32),
        end: (u32, u32),
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            start_line: start.0,
            start_col: start.1,
            end_line: end.0,
            end_col: end.1,
        }
    }

    /// Insert `text` at `(line, col)`.
    pub fn insert(line: u32, col: u32, text: impl Into<String>) -> Self {
        Self::replace((line, col), (line, col), text)
    }

    /// Delete the range `start..end`.
    pub fn delete(start: (u32, u32), end: (u32, u32)) -> Self {
        Self::replace(start, end, String::new())
    }
}

/// An ordered group of edits captured together.
///
/// Edits are replayed strictly in list order; each one is expressed in the
/// coordinates produced by the edits before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The edits, in application order
    pub changes: Vec<Edit>,
}

impl Transaction {
    /// Create a transaction from an ordered list of edits.
    pub fn new(changes: Vec<Edit>) -> Self {
        Self { changes }
    }

    /// Create a transaction holding a single edit.
    pub fn single(edit: Edit) -> Self {
        Self {
            changes: vec![edit],
        }
    }

    /// Number of edits in this transaction.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check whether the transaction carries no edits.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Full-text snapshot of a file. `text` and `version` always describe the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMessage {
    /// Document key
    pub path: DocPath,
    /// Version the text corresponds to
    pub version: Version,
    /// Complete document text
    pub text: String,
    /// Ask the viewer to surface this file
    #[serde(default)]
    pub open: bool,
}

/// Incremental batch produced by one flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// Document key
    pub path: DocPath,
    /// Version after applying `txs`
    pub version: Version,
    /// Transactions, in application order
    pub txs: Vec<Transaction>,
}

impl ChangeMessage {
    /// Total number of edits across all transactions.
    pub fn edit_count(&self) -> usize {
        self.txs.iter().map(Transaction::len).sum()
    }
}

/// Opaque passthrough event (console mirroring, window control, ...).
///
/// Carries no version or ordering semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncillaryEvent {
    /// Event name, e.g. `dump`, `clear`, `showWindow`
    pub name: String,
    /// Arbitrary JSON payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AncillaryEvent {
    /// Create a passthrough event.
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Messages sent from a viewer to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request a snapshot of every tracked file
    GetFiles,
    /// Request a snapshot of one file
    GetFile(DocPath),
    /// Passthrough event
    Ancillary(AncillaryEvent),
}

/// Messages sent from the host to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full-text snapshot
    File(FileMessage),
    /// Incremental batch
    Change(ChangeMessage),
    /// Passthrough event
    Ancillary(AncillaryEvent),
}

impl ClientMessage {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec_named(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }
}

impl ServerMessage {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec_named(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }

    /// The document this message refers to, if any.
    pub fn path(&self) -> Option<&DocPath> {
        match self {
            ServerMessage::File(file) => Some(&file.path),
            ServerMessage::Change(change) => Some(&change.path),
            ServerMessage::Ancillary(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> DocPath {
        DocPath::new(p).unwrap()
    }

    #[test]
    fn change_message_wire_shape() {
        let msg = ServerMessage::Change(ChangeMessage {
            path: path("a.txt"),
            version: Version::new(1),
            txs: vec![Transaction::single(Edit::replace((0, 0), (0, 3), "bar"))],
        });

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "change",
                "payload": {
                    "path": "a.txt",
                    "version": 1,
                    "txs": [{"changes": [{"text": "bar", "sl": 0, "sc": 0, "el": 0, "ec": 3}]}]
                }
            })
        );
    }

    #[test]
    fn file_message_wire_shape() {
        let msg = ServerMessage::File(FileMessage {
            path: path("a.txt"),
            version: Version::new(3),
            text: "hello".into(),
            open: false,
        });

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "file",
                "payload": {"path": "a.txt", "version": 3, "text": "hello", "open": false}
            })
        );
    }

    #[test]
    fn file_message_open_defaults_to_false() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "event": "file",
            "payload": {"path": "a.txt", "version": 0, "text": ""}
        }))
        .unwrap();

        match msg {
            ServerMessage::File(file) => assert!(!file.open),
            other => panic!("Expected File, got {:?}", other),
        }
    }

    #[test]
    fn client_requests_wire_shape() {
        assert_eq!(
            serde_json::to_value(ClientMessage::GetFiles).unwrap(),
            json!({"event": "get_files"})
        );
        assert_eq!(
            serde_json::to_value(ClientMessage::GetFile(path("a.txt"))).unwrap(),
            json!({"event": "get_file", "payload": "a.txt"})
        );
    }

    #[test]
    fn server_message_msgpack_roundtrip() {
        let msg = ServerMessage::Change(ChangeMessage {
            path: path("/src/main.rs"),
            version: Version::new(42),
            txs: vec![
                Transaction::new(vec![
                    Edit::insert(0, 0, "fn"),
                    Edit::delete((1, 0), (2, 0)),
                ]),
                Transaction::single(Edit::insert(3, 4, "\n")),
            ],
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = ServerMessage::from_bytes(&bytes).unwrap();

        assert_eq!(msg, restored);
    }

    #[test]
    fn client_message_msgpack_roundtrip() {
        for msg in [
            ClientMessage::GetFiles,
            ClientMessage::GetFile(path("b.txt")),
            ClientMessage::Ancillary(AncillaryEvent::new("sync_console", json!(null))),
        ] {
            let bytes = msg.to_bytes().unwrap();
            assert_eq!(ClientMessage::from_bytes(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn ancillary_payload_survives_msgpack() {
        let msg = ServerMessage::Ancillary(AncillaryEvent::new(
            "dump",
            json!([{"$value": {"$type": "html", "$html": "<b>hi</b>"}}]),
        ));

        let restored = ServerMessage::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, msg);
        assert!(restored.path().is_none());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = ServerMessage::from_bytes(&[0xc1, 0x00, 0xff]);
        assert!(matches!(result, Err(WireError::Deserialization(_))));
    }

    #[test]
    fn edit_count_sums_transactions() {
        let change = ChangeMessage {
            path: path("a"),
            version: Version::new(1),
            txs: vec![
                Transaction::new(vec![Edit::insert(0, 0, "a"), Edit::insert(0, 1, "b")]),
                Transaction::single(Edit::insert(0, 2, "c")),
            ],
        };
        assert_eq!(change.edit_count(), 3);
    }
}
