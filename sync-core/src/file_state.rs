//! Per-file authoritative state on the host.
//!
//! A [`FileState`] owns:
//! - the file's [`Version`] counter
//! - the pending queue of transactions captured since the last flush
//! - the *published* text (the text that matches the current version)
//! - a *working* text (published text with the pending queue applied)
//! - the one-shot subscribers waiting for the next flush
//!
//! Snapshots are only ever built from the published text, and only while the
//! pending queue is empty, so a snapshot's `(text, version)` pair can never be
//! mismatched. While the file is dirty a snapshot request is parked as a
//! [`SnapshotWaiter`] and released by the next flush.

use syncpad_types::{ConnectionId, DocPath, Edit, FileMessage, Transaction, Version};

use crate::document::{ApplyError, Document};

/// A connection waiting for the next flush before it receives a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotWaiter {
    /// Connection that asked for the snapshot.
    pub connection: ConnectionId,
    /// Whether the viewer should surface the file.
    pub open: bool,
}

/// Result of draining a dirty file.
#[derive(Debug, Clone, PartialEq)]
pub struct Flushed {
    /// Version after the flush.
    pub version: Version,
    /// Drained transactions, in capture order.
    pub transactions: Vec<Transaction>,
    /// Subscribers released by this flush, each exactly once.
    pub waiters: Vec<SnapshotWaiter>,
}

/// Authoritative state for one tracked file.
#[derive(Debug, Clone)]
pub struct FileState {
    path: DocPath,
    version: Version,
    pending: Vec<Transaction>,
    published: Document,
    working: Document,
    waiters: Vec<SnapshotWaiter>,
}

impl FileState {
    /// Start tracking `path` at version 0 with the given text.
    pub fn new(path: DocPath, text: &str) -> Self {
        let document = Document::new(text);
        Self {
            path,
            version: Version::zero(),
            pending: Vec::new(),
            published: document.clone(),
            working: document,
            waiters: Vec::new(),
        }
    }

    /// The tracked path.
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Current version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether there are unflushed transactions.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of unflushed transactions.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of connections parked until the next flush.
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Text as of the current version.
    pub fn published_text(&self) -> String {
        self.published.text()
    }

    /// Text including pending transactions.
    pub fn working_text(&self) -> String {
        self.working.text()
    }

    /// Single edit turning the working text into `text`, if they differ.
    pub fn diff_working(&self, text: &str) -> Option<Edit> {
        self.working.diff_to(text)
    }

    /// Validate and queue a transaction.
    ///
    /// The transaction is applied to a copy of the working text first; if any
    /// edit does not fit, nothing is queued and the working text is untouched.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), ApplyError> {
        let mut candidate = self.working.clone();
        candidate.apply_transaction(&transaction)?;
        self.working = candidate;
        self.pending.push(transaction);
        Ok(())
    }

    /// Drain the pending queue and advance the version.
    ///
    /// Returns `None` (and leaves the version alone) when nothing is pending.
    pub fn flush_and_increment(&mut self) -> Option<Flushed> {
        if !self.is_dirty() {
            return None;
        }

        self.version = self.version.next();
        self.published = self.working.clone();
        Some(Flushed {
            version: self.version,
            transactions: std::mem::take(&mut self.pending),
            waiters: std::mem::take(&mut self.waiters),
        })
    }

    /// Replace the text wholesale, discarding pending transactions.
    ///
    /// Parked waiters are dropped: the caller broadcasts the returned snapshot
    /// to every connection, which covers them. The returned snapshot has
    /// `open` set.
    pub fn refresh(&mut self, text: &str) -> FileMessage {
        self.pending.clear();
        self.waiters.clear();
        self.version = self.version.next();
        self.published = Document::new(text);
        self.working = self.published.clone();
        self.snapshot(true)
    }

    /// Snapshot of the current state, or `None` while the file is dirty.
    pub fn current_snapshot(&self, open: bool) -> Option<FileMessage> {
        if self.is_dirty() {
            None
        } else {
            Some(self.snapshot(open))
        }
    }

    /// Snapshot for `connection`, deferred until the next flush if dirty.
    ///
    /// Returns the snapshot immediately when the file is clean. Otherwise the
    /// connection is parked (once; repeated requests merge their `open` flag)
    /// and `None` is returned.
    pub fn request_snapshot(
        &mut self,
        connection: ConnectionId,
        open: bool,
    ) -> Option<FileMessage> {
        if let Some(snapshot) = self.current_snapshot(open) {
            return Some(snapshot);
        }

        match self.waiters.iter_mut().find(|w| w.connection == connection) {
            Some(existing) => existing.open |= open,
            None => self.waiters.push(SnapshotWaiter { connection, open }),
        }
        None
    }

    /// Drop any parked request from `connection`.
    pub fn detach(&mut self, connection: ConnectionId) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|w| w.connection != connection);
        before != self.waiters.len()
    }

    /// Drop every parked request.
    pub fn clear_waiters(&mut self) {
        self.waiters.clear();
    }

    fn snapshot(&self, open: bool) -> FileMessage {
        FileMessage {
            path: self.path.clone(),
            version: self.version,
            text: self.published.text(),
            open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(text: &str) -> FileState {
        FileState::new(DocPath::new("a.txt").unwrap(), text)
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn starts_clean_at_version_zero() {
        let file = state("foo");
        assert_eq!(file.version(), Version::zero());
        assert!(!file.is_dirty());
        assert_eq!(file.current_snapshot(false).unwrap().text, "foo");
    }

    #[test]
    fn flush_on_empty_queue_is_noop() {
        let mut file = state("foo");
        assert!(file.flush_and_increment().is_none());
        assert_eq!(file.version(), Version::zero());
    }

    #[test]
    fn flush_drains_in_order_and_increments_once() {
        let mut file = state("foo");
        file.add_transaction(Transaction::single(Edit::insert(0, 3, "1")))
            .unwrap();
        file.add_transaction(Transaction::single(Edit::insert(0, 4, "2")))
            .unwrap();

        let flushed = file.flush_and_increment().unwrap();
        assert_eq!(flushed.version, Version::new(1));
        assert_eq!(flushed.transactions.len(), 2);
        assert_eq!(flushed.transactions[0].changes[0].text, "1");
        assert_eq!(flushed.transactions[1].changes[0].text, "2");
        assert!(!file.is_dirty());
        assert_eq!(file.published_text(), "foo12");
    }

    #[test]
    fn invalid_transaction_is_not_queued() {
        let mut file = state("foo");
        let tx = Transaction::new(vec![Edit::insert(0, 0, "ok"), Edit::insert(5, 0, "bad")]);

        assert!(file.add_transaction(tx).is_err());
        assert!(!file.is_dirty());
        assert_eq!(file.working_text(), "foo");
    }

    #[test]
    fn snapshot_is_withheld_while_dirty() {
        let mut file = state("foo");
        file.add_transaction(Transaction::single(Edit::insert(0, 0, "x")))
            .unwrap();

        assert!(file.current_snapshot(false).is_none());
        assert!(file.request_snapshot(conn(1), false).is_none());
        assert_eq!(file.waiter_count(), 1);
    }

    #[test]
    fn flush_releases_waiters_exactly_once() {
        let mut file = state("foo");
        file.add_transaction(Transaction::single(Edit::insert(0, 0, "x")))
            .unwrap();
        file.request_snapshot(conn(1), false);
        file.request_snapshot(conn(2), false);

        let flushed = file.flush_and_increment().unwrap();
        assert_eq!(flushed.waiters.len(), 2);

        file.add_transaction(Transaction::single(Edit::insert(0, 0, "y")))
            .unwrap();
        let second = file.flush_and_increment().unwrap();
        assert!(second.waiters.is_empty());
    }

    #[test]
    fn deferred_snapshot_matches_post_flush_state() {
        let mut file = state("foo");
        file.add_transaction(Transaction::single(Edit::replace((0, 0), (0, 3), "bar")))
            .unwrap();
        assert!(file.request_snapshot(conn(7), false).is_none());

        let flushed = file.flush_and_increment().unwrap();
        let snapshot = file.current_snapshot(flushed.waiters[0].open).unwrap();
        assert_eq!(snapshot.version, Version::new(1));
        assert_eq!(snapshot.text, "bar");
    }

    #[test]
    fn repeated_requests_merge_open_flag() {
        let mut file = state("foo");
        file.add_transaction(Transaction::single(Edit::insert(0, 0, "x")))
            .unwrap();
        file.request_snapshot(conn(1), false);
        file.request_snapshot(conn(1), true);

        let flushed = file.flush_and_increment().unwrap();
        assert_eq!(
            flushed.waiters,
            vec![SnapshotWaiter {
                connection: conn(1),
                open: true
            }]
        );
    }

    #[test]
    fn refresh_discards_pending_and_bumps_version() {
        let mut file = state("foo");
        file.add_transaction(Transaction::single(Edit::insert(0, 0, "x")))
            .unwrap();
        file.request_snapshot(conn(1), false);

        let snapshot = file.refresh("fresh");
        assert_eq!(snapshot.version, Version::new(1));
        assert_eq!(snapshot.text, "fresh");
        assert!(snapshot.open);
        assert!(!file.is_dirty());
        assert_eq!(file.waiter_count(), 0);
        assert!(file.flush_and_increment().is_none());
    }

    #[test]
    fn diff_is_taken_against_pending_text() {
        let mut file = state("abc");
        file.add_transaction(Transaction::single(Edit::insert(0, 3, "d")))
            .unwrap();

        let edit = file.diff_working("abcde").unwrap();
        assert_eq!(edit, Edit::insert(0, 4, "e"));
        assert!(file.diff_working("abcd").is_none());
    }

    #[test]
    fn detach_removes_only_that_connection() {
        let mut file = state("foo");
        file.add_transaction(Transaction::single(Edit::insert(0, 0, "x")))
            .unwrap();
        file.request_snapshot(conn(1), false);
        file.request_snapshot(conn(2), false);

        assert!(file.detach(conn(1)));
        assert!(!file.detach(conn(1)));
        let flushed = file.flush_and_increment().unwrap();
        assert_eq!(flushed.waiters.len(), 1);
        assert_eq!(flushed.waiters[0].connection, conn(2));
    }
}
