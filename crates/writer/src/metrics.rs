//! Bulk writer metrics
//!
//! Atomic counters for tracking writer throughput and failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Metrics
// =============================================================================

/// Counters for one bulk writer
#[derive(Debug, Default)]
pub struct WriterMetrics {
    /// Records accepted by `append`
    pub records_appended: AtomicU64,

    /// Records refused because the buffer was full
    pub records_dropped_capacity: AtomicU64,

    /// Records the sink accepted
    pub records_written: AtomicU64,

    /// Records the sink rejected individually
    pub records_rejected: AtomicU64,

    /// Records dropped after exceeding the retry limit
    pub records_exhausted: AtomicU64,

    /// Records trimmed from the buffer tail after a rollback
    pub records_trimmed: AtomicU64,

    /// Unbuffered records whose only send failed
    pub records_failed: AtomicU64,

    /// Records still buffered when the writer shut down
    pub records_abandoned: AtomicU64,

    /// Bulk requests sent
    pub bulk_requests: AtomicU64,

    /// Bulk requests that failed as a whole
    pub bulk_failures: AtomicU64,

    /// Health checks made
    pub connection_attempts: AtomicU64,

    /// Templates created on the sink
    pub templates_created: AtomicU64,
}

impl WriterMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            records_appended: AtomicU64::new(0),
            records_dropped_capacity: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            records_rejected: AtomicU64::new(0),
            records_exhausted: AtomicU64::new(0),
            records_trimmed: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            records_abandoned: AtomicU64::new(0),
            bulk_requests: AtomicU64::new(0),
            bulk_failures: AtomicU64::new(0),
            connection_attempts: AtomicU64::new(0),
            templates_created: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_appended(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_capacity(&self) {
        self.records_dropped_capacity.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self, count: u64) {
        self.records_written.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self, count: u64) {
        self.records_rejected.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exhausted(&self, count: u64) {
        self.records_exhausted.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trimmed(&self, count: u64) {
        self.records_trimmed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed(&self, count: u64) {
        self.records_failed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_abandoned(&self, count: u64) {
        self.records_abandoned.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a bulk request being sent
    #[inline]
    pub fn record_bulk_request(&self) {
        self.bulk_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bulk request failing as a whole
    #[inline]
    pub fn record_bulk_failure(&self) {
        self.bulk_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_template_created(&self) {
        self.templates_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_appended: self.records_appended.load(Ordering::Relaxed),
            records_dropped_capacity: self.records_dropped_capacity.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            records_exhausted: self.records_exhausted.load(Ordering::Relaxed),
            records_trimmed: self.records_trimmed.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_abandoned: self.records_abandoned.load(Ordering::Relaxed),
            bulk_requests: self.bulk_requests.load(Ordering::Relaxed),
            bulk_failures: self.bulk_failures.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            templates_created: self.templates_created.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_appended: u64,
    pub records_dropped_capacity: u64,
    pub records_written: u64,
    pub records_rejected: u64,
    pub records_exhausted: u64,
    pub records_trimmed: u64,
    pub records_failed: u64,
    pub records_abandoned: u64,
    pub bulk_requests: u64,
    pub bulk_failures: u64,
    pub connection_attempts: u64,
    pub templates_created: u64,
}

impl MetricsSnapshot {
    /// Records that left the writer without reaching the sink
    pub fn records_lost(&self) -> u64 {
        self.records_dropped_capacity
            + self.records_rejected
            + self.records_exhausted
            + self.records_trimmed
            + self.records_failed
            + self.records_abandoned
    }
}

// =============================================================================
// Metrics Handle
// =============================================================================

/// Handle for reading writer metrics
///
/// Holds an Arc to the counters, so it stays valid after the writer task has
/// been consumed by `run()`.
#[derive(Debug, Clone)]
pub struct WriterMetricsHandle {
    metrics: Arc<WriterMetrics>,
}

impl WriterMetricsHandle {
    pub(crate) fn new(metrics: Arc<WriterMetrics>) -> Self {
        Self { metrics }
    }

    /// Current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = WriterMetrics::new();
        metrics.record_appended();
        metrics.record_appended();
        metrics.record_written(2);
        metrics.record_bulk_request();

        let s = metrics.snapshot();
        assert_eq!(s.records_appended, 2);
        assert_eq!(s.records_written, 2);
        assert_eq!(s.bulk_requests, 1);
        assert_eq!(s.bulk_failures, 0);
    }

    #[test]
    fn test_records_lost_sums_drop_paths() {
        let metrics = WriterMetrics::new();
        metrics.record_dropped_capacity();
        metrics.record_rejected(2);
        metrics.record_exhausted(3);
        metrics.record_trimmed(4);
        metrics.record_failed(5);
        metrics.record_abandoned(6);

        assert_eq!(metrics.snapshot().records_lost(), 21);
    }

    #[test]
    fn test_handle_outlives_owner() {
        let metrics = Arc::new(WriterMetrics::new());
        let handle = WriterMetricsHandle::new(Arc::clone(&metrics));
        metrics.record_template_created();
        drop(metrics);

        assert_eq!(handle.snapshot().templates_created, 1);
    }
}
