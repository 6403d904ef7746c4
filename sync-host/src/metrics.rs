//! Operational counters for the host.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational metrics for monitoring host activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64`, so the actor can bump them while other tasks
/// read them through [`HostHandle::metrics`](crate::HostHandle::metrics).
#[derive(Debug, Default)]
pub struct HostMetrics {
    /// Change batches broadcast.
    pub flushes_total: AtomicU64,
    /// Snapshots delivered to a single connection.
    pub snapshots_sent: AtomicU64,
    /// Snapshot requests parked until the next flush.
    pub snapshots_deferred: AtomicU64,
    /// Connections attached since startup.
    pub connections_total: AtomicU64,
    /// Transactions rejected because they did not fit the text.
    pub edits_rejected: AtomicU64,
}

/// Point-in-time copy of [`HostMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// See [`HostMetrics::flushes_total`].
    pub flushes_total: u64,
    /// See [`HostMetrics::snapshots_sent`].
    pub snapshots_sent: u64,
    /// See [`HostMetrics::snapshots_deferred`].
    pub snapshots_deferred: u64,
    /// See [`HostMetrics::connections_total`].
    pub connections_total: u64,
    /// See [`HostMetrics::edits_rejected`].
    pub edits_rejected: u64,
}

impl HostMetrics {
    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            flushes_total: self.flushes_total.load(Ordering::Relaxed),
            snapshots_sent: self.snapshots_sent.load(Ordering::Relaxed),
            snapshots_deferred: self.snapshots_deferred.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            edits_rejected: self.edits_rejected.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Log every counter at info level.
    pub fn log_summary(&self) {
        let m = self.snapshot();
        tracing::info!(
            "Host metrics: flushes={} snapshots_sent={} snapshots_deferred={} connections={} edits_rejected={}",
            m.flushes_total,
            m.snapshots_sent,
            m.snapshots_deferred,
            m.connections_total,
            m.edits_rejected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_counters() {
        let metrics = HostMetrics::default();
        HostMetrics::incr(&metrics.flushes_total);
        HostMetrics::incr(&metrics.flushes_total);
        HostMetrics::incr(&metrics.edits_rejected);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.flushes_total, 2);
        assert_eq!(snapshot.edits_rejected, 1);
        assert_eq!(snapshot.snapshots_sent, 0);
    }
}
