//! Where a viewer keeps its copies of the host's files.
//!
//! [`SyncClient`](crate::SyncClient) never touches text directly; it drives a
//! [`DocumentAdapter`]. An editor integration implements the trait against its
//! own buffers; [`MemoryDocuments`] keeps plain in-memory copies.

use std::collections::BTreeMap;
use syncpad_core::{ApplyError, Document};
use syncpad_types::{DocPath, Edit};

/// Document store driven by the viewer.
pub trait DocumentAdapter: Send {
    /// Replace a document's full content, creating it if needed.
    fn replace_text(&mut self, path: &DocPath, text: &str);

    /// Apply one edit. A rejected edit must leave the document untouched.
    fn apply_edit(&mut self, path: &DocPath, edit: &Edit) -> Result<(), ApplyError>;

    /// Bring a document into view.
    fn reveal(&mut self, path: &DocPath);
}

/// In-memory document store.
#[derive(Debug, Default, Clone)]
pub struct MemoryDocuments {
    documents: BTreeMap<DocPath, Document>,
    revealed: Vec<DocPath>,
}

impl MemoryDocuments {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text of a document.
    pub fn text(&self, path: &DocPath) -> Option<String> {
        self.documents.get(path).map(Document::text)
    }

    /// Every known document, in order.
    pub fn paths(&self) -> Vec<DocPath> {
        self.documents.keys().cloned().collect()
    }

    /// Documents revealed so far, in reveal order.
    pub fn revealed(&self) -> &[DocPath] {
        &self.revealed
    }

    /// Forget every document.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.revealed.clear();
    }
}

impl DocumentAdapter for MemoryDocuments {
    fn replace_text(&mut self, path: &DocPath, text: &str) {
        self.documents
            .entry(path.clone())
            .or_default()
            .replace_all(text);
    }

    fn apply_edit(&mut self, path: &DocPath, edit: &Edit) -> Result<(), ApplyError> {
        self.documents
            .get_mut(path)
            .ok_or_else(|| ApplyError::MissingDocument(path.to_string()))?
            .apply(edit)
    }

    fn reveal(&mut self, path: &DocPath) {
        self.revealed.push(path.clone());
    }
}
