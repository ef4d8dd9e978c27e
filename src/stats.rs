//! Pool metrics and status snapshots.
//!
//! [`PoolMetrics`] holds the pool's monotonic lifetime counters; updates
//! use release ordering and snapshots use acquire ordering, so a
//! [`status()`](crate::pool::BrowserPool::status) call observes every
//! transition that happened before it. Counters survive shutdown — only
//! the instance accounting is cleared.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic lifetime counters maintained by the pool.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    created: AtomicU64,
    reused: AtomicU64,
    destroyed: AtomicU64,
    errors: AtomicU64,
}

impl PoolMetrics {
    /// Record a successful instance creation.
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::AcqRel);
    }

    /// Record an acquire served from an existing instance.
    pub fn record_reused(&self) {
        self.reused.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a verified destruction.
    pub fn record_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a creation or destruction failure.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::AcqRel);
    }

    /// Consistent point-in-time copy of the counters.
    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            created: self.created.load(Ordering::Acquire),
            reused: self.reused.load(Ordering::Acquire),
            destroyed: self.destroyed.load(Ordering::Acquire),
            errors: self.errors.load(Ordering::Acquire),
        }
    }
}

/// Copied counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    /// Instances created over the pool's lifetime.
    pub created: u64,
    /// Acquires served by an existing instance.
    pub reused: u64,
    /// Instances destroyed with verified termination.
    pub destroyed: u64,
    /// Creation/destruction failures.
    pub errors: u64,
}

/// Snapshot of the pool's current shape.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    /// All live instances (available + busy + being destroyed).
    pub total_browsers: usize,
    /// Instances ready for checkout.
    pub available: usize,
    /// Instances currently borrowed.
    pub busy: usize,
    /// Instances whose health flag is set.
    pub healthy: usize,
    /// Whether shutdown has begun.
    pub draining: bool,
    /// Lifetime counters.
    pub metrics: PoolMetricsSnapshot,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PoolStatus {{ total: {}, available: {}, busy: {}, healthy: {}, created: {}, reused: {}, destroyed: {}, errors: {} }}",
            self.total_browsers,
            self.available,
            self.busy,
            self.healthy,
            self.metrics.created,
            self.metrics.reused,
            self.metrics.destroyed,
            self.metrics.errors,
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies counters increment independently and snapshot together.
    #[test]
    fn test_metrics_counters() {
        let metrics = PoolMetrics::default();
        metrics.record_created();
        metrics.record_created();
        metrics.record_reused();
        metrics.record_destroyed();
        metrics.record_error();

        let snap = metrics.snapshot();
        assert_eq!(snap.created, 2);
        assert_eq!(snap.reused, 1);
        assert_eq!(snap.destroyed, 1);
        assert_eq!(snap.errors, 1);
    }

    /// Verifies counters are monotonic across interleaved snapshots.
    #[test]
    fn test_metrics_monotonic() {
        let metrics = PoolMetrics::default();
        let mut last = metrics.snapshot();
        for _ in 0..100 {
            metrics.record_created();
            metrics.record_reused();
            let now = metrics.snapshot();
            assert!(now.created >= last.created);
            assert!(now.reused >= last.reused);
            last = now;
        }
    }

    /// Verifies the Display rendering used in logs.
    #[test]
    fn test_status_display() {
        let status = PoolStatus {
            total_browsers: 3,
            available: 1,
            busy: 2,
            healthy: 3,
            draining: false,
            metrics: PoolMetricsSnapshot {
                created: 4,
                reused: 9,
                destroyed: 1,
                errors: 0,
            },
        };
        let rendered = status.to_string();
        assert!(rendered.contains("total: 3"));
        assert!(rendered.contains("reused: 9"));
    }
}
