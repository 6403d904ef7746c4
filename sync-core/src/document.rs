//! Text model for SyncPad documents.
//!
//! A [`Document`] is a rope addressed by zero-based `(line, column)`
//! positions. Lines break on `\n`, `\r\n` or `\r`; columns count Unicode
//! scalar values and may not point past the end of a line's content.
//!
//! Positions are validated strictly: an edit that does not fit the current
//! text is rejected with an [`ApplyError`] instead of being clamped, so a
//! desynchronized viewer is detected rather than silently corrupted.

use ropey::Rope;
use syncpad_types::{Edit, Transaction};
use thiserror::Error;

/// Reasons an edit cannot be applied to a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Line index past the last line.
    #[error("line {line} out of range (document has {lines} lines)")]
    LineOutOfRange {
        /// Requested line.
        line: u32,
        /// Number of lines in the document.
        lines: usize,
    },

    /// Column past the end of the line's content.
    #[error("column {column} out of range on line {line} (line has {len} columns)")]
    ColumnOutOfRange {
        /// Requested line.
        line: u32,
        /// Requested column.
        column: u32,
        /// Length of the line without its line break.
        len: usize,
    },

    /// Range end precedes its start.
    #[error("range end {end_line}:{end_col} precedes start {start_line}:{start_col}")]
    InvertedRange {
        /// Start line.
        start_line: u32,
        /// Start column.
        start_col: u32,
        /// End line.
        end_line: u32,
        /// End column.
        end_col: u32,
    },

    /// The document is not known to the adapter.
    #[error("no open document for {0}")]
    MissingDocument(String),
}

/// Rope-backed document text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    rope: Rope,
}

impl Document {
    /// Create a document holding `text`.
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// The full text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Number of lines. A trailing line break starts a new, empty line.
    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Replace the whole text.
    pub fn replace_all(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
    }

    /// Convert a `(line, column)` position into a character index.
    pub fn position_to_char(&self, line: u32, column: u32) -> Result<usize, ApplyError> {
        let lines = self.rope.len_lines();
        let line_idx = line as usize;
        if line_idx >= lines {
            return Err(ApplyError::LineOutOfRange { line, lines });
        }

        let len = self.line_content_len(line_idx);
        if column as usize > len {
            return Err(ApplyError::ColumnOutOfRange { line, column, len });
        }

        Ok(self.rope.line_to_char(line_idx) + column as usize)
    }

    /// Convert a character index into a `(line, column)` position.
    ///
    /// Indices past the end are clamped to the end of the document.
    pub fn char_to_position(&self, char_idx: usize) -> (u32, u32) {
        let idx = char_idx.min(self.rope.len_chars());
        let line = self.rope.char_to_line(idx);
        let column = idx - self.rope.line_to_char(line);
        (to_u32(line), to_u32(column))
    }

    /// Apply one edit.
    pub fn apply(&mut self, edit: &Edit) -> Result<(), ApplyError> {
        let start = self.position_to_char(edit.start_line, edit.start_col)?;
        let end = self.position_to_char(edit.end_line, edit.end_col)?;
        if end < start {
            return Err(ApplyError::InvertedRange {
                start_line: edit.start_line,
                start_col: edit.start_col,
                end_line: edit.end_line,
                end_col: edit.end_col,
            });
        }

        if end > start {
            self.rope.remove(start..end);
        }
        if !edit.text.is_empty() {
            self.rope.insert(start, &edit.text);
        }
        Ok(())
    }

    /// Apply every edit of a transaction in order.
    ///
    /// Stops at the first failing edit; earlier edits stay applied.
    pub fn apply_transaction(&mut self, transaction: &Transaction) -> Result<(), ApplyError> {
        for edit in &transaction.changes {
            self.apply(edit)?;
        }
        Ok(())
    }

    /// Compute a single edit turning this document into `new_text`.
    ///
    /// The edit replaces the span between the longest common prefix and the
    /// longest common suffix. Returns `None` when the texts are identical.
    pub fn diff_to(&self, new_text: &str) -> Option<Edit> {
        let old: Vec<char> = self.rope.chars().collect();
        let new: Vec<char> = new_text.chars().collect();

        let mut prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if prefix == old.len() && prefix == new.len() {
            return None;
        }

        let max_suffix = old.len().min(new.len()) - prefix;
        let mut suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        // Never split a CRLF pair: the middle of one is not an addressable position.
        if prefix > 0 && old[prefix - 1] == '\r' && old.get(prefix) == Some(&'\n') {
            prefix -= 1;
        }
        let old_end = old.len() - suffix;
        if suffix > 0 && old_end > 0 && old[old_end - 1] == '\r' && old[old_end] == '\n' {
            suffix -= 1;
        }

        let old_end = old.len() - suffix;
        let new_end = new.len() - suffix;
        let start = self.char_to_position(prefix);
        let end = self.char_to_position(old_end);
        let text: String = new[prefix..new_end].iter().collect();

        Some(Edit::replace(start, end, text))
    }

    fn line_content_len(&self, line_idx: usize) -> usize {
        let line = self.rope.line(line_idx);
        let mut len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len -= 1;
        }
        if len > 0 && line.char(len - 1) == '\r' {
            len -= 1;
        }
        len
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
