//! Pool-side instance bookkeeping.
//!
//! [`TrackedInstance`] wraps an opaque factory handle with the metadata the
//! pool needs for lifecycle decisions: a stable id, creation time for
//! diagnostics, last-use time for idle culling, and a health flag flipped
//! by failed probes.
//!
//! Identity is stable for the instance's lifetime: clones share the same
//! id, handle and timestamps, which is what lets the pool keep one copy in
//! its accounting while a borrower holds another.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::factory::BrowserHandle;

/// A live browser plus pool metadata. Cheap to clone; clones alias.
#[derive(Clone)]
pub(crate) struct TrackedInstance {
    id: u64,
    handle: Arc<dyn BrowserHandle>,
    created_at: Instant,
    last_used: Arc<Mutex<Instant>>,
    healthy: Arc<AtomicBool>,
}

impl TrackedInstance {
    /// Wrap a freshly created handle.
    pub(crate) fn new(handle: Box<dyn BrowserHandle>) -> Self {
        // Process-wide monotonic id, stable across the engine lifetime.
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        let now = Instant::now();
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            handle: Arc::from(handle),
            created_at: now,
            last_used: Arc::new(Mutex::new(now)),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Pool-assigned id.
    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Shared handle, for moving into blocking closures.
    #[inline]
    pub(crate) fn handle_arc(&self) -> Arc<dyn BrowserHandle> {
        Arc::clone(&self.handle)
    }

    /// Borrow the handle.
    #[inline]
    pub(crate) fn handle(&self) -> &dyn BrowserHandle {
        self.handle.as_ref()
    }

    /// Time since creation.
    #[inline]
    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the last acquire or release touched this instance.
    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used.lock().unwrap().elapsed()
    }

    /// Mark the instance as just used.
    pub(crate) fn touch(&self) {
        *self.last_used.lock().unwrap() = Instant::now();
    }

    /// Health flag as last observed by a probe.
    #[inline]
    pub(crate) fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Record a failed probe.
    pub(crate) fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for TrackedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedInstance")
            .field("id", &self.id)
            .field("age", &self.age())
            .field("healthy", &self.is_healthy())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::MockBrowserFactory;
    use crate::factory::BrowserFactory;

    fn instance() -> TrackedInstance {
        let factory = MockBrowserFactory::new();
        TrackedInstance::new(factory.create(&factory.optimal_launch_options()).unwrap())
    }

    /// Verifies ids are unique and clones alias the same instance.
    #[test]
    fn test_identity() {
        let a = instance();
        let b = instance();
        assert_ne!(a.id(), b.id());

        let a2 = a.clone();
        assert_eq!(a.id(), a2.id());
        a2.mark_unhealthy();
        assert!(!a.is_healthy(), "clones must share the health flag");
    }

    /// Verifies touch resets the idle clock.
    #[test]
    fn test_touch() {
        let inst = instance();
        std::thread::sleep(Duration::from_millis(15));
        assert!(inst.idle_for() >= Duration::from_millis(10));
        inst.touch();
        assert!(inst.idle_for() < Duration::from_millis(10));
    }

    /// Verifies new instances start healthy.
    #[test]
    fn test_starts_healthy() {
        assert!(instance().is_healthy());
    }
}
