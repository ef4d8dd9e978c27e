//! RAII borrow of a pooled browser.
//!
//! [`PooledBrowser`] represents the window between acquire and release.
//! Dropping it returns the instance to the pool (health probe included)
//! even on early returns and panics; [`release`](PooledBrowser::release)
//! does the same but lets the caller await the probe instead of leaving it
//! to a background task.
//!
//! Ownership rules: the pool owns every instance it created; a
//! `PooledBrowser` is a borrow, and release transfers the instance back.
//! The instance is never in the available set while a borrow exists.

use std::sync::Arc;

use crate::factory::BrowserHandle;

use super::tracked::TrackedInstance;
use super::PoolInner;

/// A browser checked out of the pool.
pub struct PooledBrowser {
    /// `Option` so `Drop` can take the instance out.
    tracked: Option<TrackedInstance>,
    pool: Arc<PoolInner>,
}

impl PooledBrowser {
    pub(crate) fn new(tracked: TrackedInstance, pool: Arc<PoolInner>) -> Self {
        Self {
            tracked: Some(tracked),
            pool,
        }
    }

    /// Pool-assigned id of the borrowed instance.
    pub fn id(&self) -> u64 {
        self.tracked.as_ref().map(TrackedInstance::id).unwrap_or(0)
    }

    /// The opaque browser handle, for passing to a renderer adapter.
    ///
    /// # Panics
    ///
    /// Panics if called after release; impossible through safe use, since
    /// `release` consumes the borrow.
    pub fn browser(&self) -> &dyn BrowserHandle {
        self.tracked.as_ref().unwrap().handle()
    }

    /// Shared handle for moving into blocking render closures.
    pub fn browser_arc(&self) -> Arc<dyn BrowserHandle> {
        self.tracked.as_ref().unwrap().handle_arc()
    }

    /// Return the instance to the pool, awaiting the release-time health
    /// probe. Never returns an error: an unhealthy instance is destroyed
    /// by the pool, not surfaced to the releasing caller.
    pub async fn release(mut self) {
        if let Some(tracked) = self.tracked.take() {
            PoolInner::release(Arc::clone(&self.pool), tracked).await;
        }
    }
}

impl Drop for PooledBrowser {
    /// Fallback return path: schedule the release on the pool's runtime
    /// so the dropping thread never blocks on the health probe.
    fn drop(&mut self) {
        if let Some(tracked) = self.tracked.take() {
            log::debug!(
                "PooledBrowser {} dropped without explicit release; returning in background",
                tracked.id()
            );
            let pool = Arc::clone(&self.pool);
            self.pool.runtime().spawn(async move {
                PoolInner::release(pool, tracked).await;
            });
        }
    }
}

impl std::fmt::Debug for PooledBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tracked {
            Some(tracked) => f
                .debug_struct("PooledBrowser")
                .field("id", &tracked.id())
                .finish(),
            None => f
                .debug_struct("PooledBrowser")
                .field("state", &"released")
                .finish(),
        }
    }
}
