//! Health-monitored browser pool.
//!
//! [`BrowserPool`] owns every browser instance it creates and enforces the
//! lifecycle state machine:
//!
//! ```text
//!           create
//!    ──────────────▶ available
//!                       │  acquire
//!                       ▼
//!                      busy
//!                   ┌───┴───┐
//!        release(ok)│       │ release(unhealthy) / idle>timeout (above min) / shutdown
//!                   ▼       ▼
//!                available  destroyed (terminal)
//! ```
//!
//! # Guarantees
//!
//! - **Acquire** takes the most recently used available instance (LIFO,
//!   for warmth), creates a new one while under `pool.max`, or waits on a
//!   notification up to a bounded timeout. A timed-out wait leaves the
//!   accounting untouched.
//! - **Release** probes health off the lock; healthy instances return to
//!   the available stack, unhealthy ones are destroyed aggressively.
//! - **Aggressive destruction** requests a graceful close with a 10 s
//!   bound, force-kills the process if it survives, verifies no process
//!   remains, and retries a small number of times. Only a verified-dead
//!   instance leaves the accounting.
//! - **Shutdown** drains: new acquires fail fast, waiters are woken with
//!   the same error, every instance is destroyed in parallel, the
//!   maintenance loop stops, and the instance map is cleared. Metrics
//!   counters survive. Idempotent.
//!
//! # Locking
//!
//! Lock order is `instances` before `available`; both critical sections
//! are short. Launches, probes and destruction run outside any lock with
//! per-instance state for identity-preserving updates, the discipline the
//! keep-alive design depends on.

mod handle;
pub(crate) mod launcher;
pub mod registry;
mod tracked;

pub use handle::PooledBrowser;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::Notify;

use crate::config::{EffectiveConfig, PoolConfig};
use crate::error::{PrinteerError, Result};
use crate::factory::BrowserFactory;
use crate::monitor::ResourceMonitor;
use crate::stats::{PoolMetrics, PoolStatus};

use tracked::TrackedInstance;

/// Default bound on how long an acquire may wait for a free slot.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on the release-time health probe.
const RELEASE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on a graceful close before force-kill takes over.
const GRACEFUL_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Kill/verify attempts before destruction is declared incomplete.
const DESTROY_VERIFY_ATTEMPTS: usize = 3;

/// Pause between kill/verify attempts.
const DESTROY_RETRY_DELAY: Duration = Duration::from_millis(200);

pub(crate) struct PoolInner {
    config: PoolConfig,
    factory: Arc<dyn BrowserFactory>,
    monitor: Option<ResourceMonitor>,

    /// All live instances by id (available, busy and being destroyed).
    instances: Mutex<HashMap<u64, TrackedInstance>>,
    /// Instances ready for checkout; top of the Vec is the warmest.
    available: Mutex<Vec<TrackedInstance>>,
    /// Launches in flight, counted against `pool.max`.
    creating: AtomicUsize,

    draining: AtomicBool,
    /// Woken when capacity frees up (release, destruction, failed launch).
    slot_free: Notify,
    metrics: PoolMetrics,

    runtime: tokio::runtime::Handle,
    maintenance_signal: Arc<(Mutex<bool>, Condvar)>,
    maintenance_thread: Mutex<Option<JoinHandle<()>>>,
    destruction_tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl PoolInner {
    pub(crate) fn runtime(&self) -> &tokio::runtime::Handle {
        &self.runtime
    }

    fn total(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    fn pop_available(&self) -> Option<TrackedInstance> {
        self.available.lock().unwrap().pop()
    }

    /// Reserve a creation slot if instance count plus in-flight launches
    /// sit under the ceiling. The reservation itself is made under the
    /// instances lock so concurrent acquirers cannot over-commit.
    fn try_reserve_creation_slot(&self) -> bool {
        let instances = self.instances.lock().unwrap();
        if instances.len() + self.creating.load(Ordering::Acquire) < self.config.max {
            self.creating.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    fn release_creation_slot(&self) {
        self.creating.fetch_sub(1, Ordering::AcqRel);
    }

    /// Factory probe with a bound, off the scheduler.
    async fn probe(&self, instance: &TrackedInstance, bound: Duration) -> bool {
        let factory = Arc::clone(&self.factory);
        let handle = instance.handle_arc();
        let probe =
            tokio::task::spawn_blocking(move || factory.validate(handle.as_ref()));
        match tokio::time::timeout(bound, probe).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(_)) => {
                log::error!("Health probe task panicked");
                false
            }
            Err(_) => {
                log::warn!("Health probe timed out after {bound:?}");
                false
            }
        }
    }

    /// Walk the launch ladder and register the result as a busy instance.
    ///
    /// Consumes a reservation made with
    /// [`try_reserve_creation_slot`](Self::try_reserve_creation_slot); the
    /// slot converts into the registered instance under the instances
    /// lock, so capacity can never be double-spent between the two.
    async fn create_registered(self: &Arc<Self>) -> Result<TrackedInstance> {
        let result = launcher::create_validated(Arc::clone(&self.factory)).await;

        match result {
            Ok(handle) => {
                let instance = TrackedInstance::new(handle);
                {
                    let mut instances = self.instances.lock().unwrap();
                    instances.insert(instance.id(), instance.clone());
                    self.release_creation_slot();
                }
                self.metrics.record_created();
                if let Some(monitor) = &self.monitor {
                    monitor.inc_browsers();
                }
                log::info!("Browser instance {} created (total {})", instance.id(), self.total());
                Ok(instance)
            }
            Err(e) => {
                self.release_creation_slot();
                self.metrics.record_error();
                // The reserved capacity is free again; let a waiter retry.
                self.slot_free.notify_one();
                Err(e)
            }
        }
    }

    /// The acquire path.
    async fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<PooledBrowser> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut unhealthy_pops = 0usize;

        loop {
            if self.draining.load(Ordering::Acquire) {
                return Err(PrinteerError::ShuttingDown);
            }

            // Warmest available instance first.
            if let Some(instance) = self.pop_available() {
                if self.probe(&instance, RELEASE_PROBE_TIMEOUT).await {
                    instance.touch();
                    self.metrics.record_reused();
                    log::debug!("Reusing browser instance {}", instance.id());
                    return Ok(PooledBrowser::new(instance, Arc::clone(self)));
                }

                // One internal retry, then surface.
                unhealthy_pops += 1;
                instance.mark_unhealthy();
                self.metrics.record_error();
                log::warn!(
                    "Browser instance {} failed its acquire probe; destroying",
                    instance.id()
                );
                self.spawn_destroy(instance, "failed acquire probe");
                if unhealthy_pops > 1 {
                    return Err(PrinteerError::UnhealthyOnAcquire);
                }
                continue;
            }

            if self.try_reserve_creation_slot() {
                let instance = self.create_registered().await?;
                instance.touch();
                return Ok(PooledBrowser::new(instance, Arc::clone(self)));
            }

            // At capacity: wait for a release/destruction, bounded.
            let notified = self.slot_free.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                log::warn!("Browser acquisition timed out after {timeout:?}");
                return Err(PrinteerError::PoolTimeout { waited: timeout });
            }
        }
    }

    /// Return a borrowed instance (called by [`PooledBrowser`]).
    pub(crate) async fn release(self: Arc<Self>, instance: TrackedInstance) {
        let known = self
            .instances
            .lock()
            .unwrap()
            .contains_key(&instance.id());
        if !known {
            log::warn!(
                "Release of unknown browser instance {}; ignoring",
                instance.id()
            );
            return;
        }

        if self.draining.load(Ordering::Acquire) {
            let _ = Self::destroy(&self, instance, "released while draining").await;
            return;
        }

        if self.probe(&instance, RELEASE_PROBE_TIMEOUT).await {
            instance.touch();
            self.available.lock().unwrap().push(instance);
            self.slot_free.notify_one();
        } else {
            instance.mark_unhealthy();
            log::warn!(
                "Browser instance {} unhealthy on release; destroying",
                instance.id()
            );
            let _ = Self::destroy(&self, instance, "unhealthy on release").await;
        }
    }

    /// Aggressive destruction: graceful close, force kill, verification,
    /// bounded retries. The instance leaves the accounting only after its
    /// process is verified gone.
    async fn destroy(self: &Arc<Self>, instance: TrackedInstance, reason: &str) -> Result<()> {
        log::info!("Destroying browser instance {} ({reason})", instance.id());

        // Make sure nobody can check it out while it dies.
        self.available
            .lock()
            .unwrap()
            .retain(|i| i.id() != instance.id());

        let factory = Arc::clone(&self.factory);
        let handle = instance.handle_arc();

        // Step 1: graceful close, bounded.
        let close = tokio::task::spawn_blocking({
            let factory = Arc::clone(&factory);
            let handle = Arc::clone(&handle);
            move || factory.close(handle.as_ref())
        });
        match tokio::time::timeout(GRACEFUL_CLOSE_TIMEOUT, close).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => log::warn!(
                "Graceful close of instance {} failed: {e}",
                instance.id()
            ),
            Ok(Err(_)) => log::error!("Graceful close task panicked"),
            Err(_) => log::warn!(
                "Graceful close of instance {} exceeded {GRACEFUL_CLOSE_TIMEOUT:?}",
                instance.id()
            ),
        }

        // Steps 2–4: kill, verify, retry.
        let mut verified = false;
        for attempt in 0..DESTROY_VERIFY_ATTEMPTS {
            let alive = {
                let factory = Arc::clone(&factory);
                let handle = Arc::clone(&handle);
                tokio::task::spawn_blocking(move || factory.process_alive(handle.as_ref()))
                    .await
                    .unwrap_or(true)
            };
            if !alive {
                verified = true;
                break;
            }

            log::warn!(
                "Browser instance {} still alive (attempt {}); force-killing",
                instance.id(),
                attempt + 1
            );
            let kill = {
                let factory = Arc::clone(&factory);
                let handle = Arc::clone(&handle);
                tokio::task::spawn_blocking(move || factory.kill_process(handle.as_ref()))
            };
            if let Ok(Err(e)) = kill.await {
                log::error!("Force-kill of instance {} failed: {e}", instance.id());
            }
            tokio::time::sleep(DESTROY_RETRY_DELAY).await;
        }

        if verified {
            // Concurrent destroys of the same instance (late release vs
            // shutdown) must count it exactly once: whoever removes it
            // from the map owns the accounting update.
            let removed = self
                .instances
                .lock()
                .unwrap()
                .remove(&instance.id())
                .is_some();
            if removed {
                self.metrics.record_destroyed();
                if let Some(monitor) = &self.monitor {
                    monitor.dec_browsers();
                }
                log::info!(
                    "Browser instance {} destroyed and verified (total {})",
                    instance.id(),
                    self.total()
                );
            }
            self.slot_free.notify_one();
            Ok(())
        } else {
            // Stays in the accounting: a slot held by a zombie is better
            // than an untracked child process.
            self.metrics.record_error();
            let err = PrinteerError::DestructionIncomplete {
                instance_id: instance.id(),
            };
            log::error!("{err}");
            Err(err)
        }
    }

    /// Dispatch a destruction without blocking the caller. Tracked so
    /// shutdown can wait for in-flight destructions.
    fn spawn_destroy(self: &Arc<Self>, instance: TrackedInstance, reason: &'static str) {
        let inner = Arc::clone(self);
        let task = self.runtime.spawn(async move {
            let _ = PoolInner::destroy(&inner, instance, reason).await;
        });
        let mut tasks = self.destruction_tasks.lock().unwrap();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    async fn drain_destruction_tasks(&self) {
        let tasks: Vec<_> = std::mem::take(&mut *self.destruction_tasks.lock().unwrap());
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Destroy every instance in parallel and clear the accounting. The
    /// shared tail of shutdown and emergency cleanup.
    pub(crate) async fn destroy_all(self: &Arc<Self>, reason: &'static str) {
        let doomed: Vec<TrackedInstance> = {
            let instances = self.instances.lock().unwrap();
            instances.values().cloned().collect()
        };

        let tasks: Vec<_> = doomed
            .into_iter()
            .map(|instance| {
                let inner = Arc::clone(self);
                self.runtime.spawn(async move {
                    let _ = PoolInner::destroy(&inner, instance, reason).await;
                })
            })
            .collect();
        for task in tasks {
            let _ = task.await;
        }

        self.drain_destruction_tasks().await;

        // Anything destruction could not verify is logged and dropped
        // from the map; shutdown's post-condition is best-effort honesty,
        // not an infinite wait on a zombie.
        let leaked = {
            let mut instances = self.instances.lock().unwrap();
            let leaked: Vec<u64> = instances.keys().copied().collect();
            instances.clear();
            leaked
        };
        self.available.lock().unwrap().clear();
        if !leaked.is_empty() {
            log::error!("Instances with unverified termination at shutdown: {leaked:?}");
        }
    }

    /// One pass of the maintenance loop: probe available instances,
    /// destroy unhealthy and idle-above-min ones, top up to min.
    fn maintenance_pass(self: &Arc<Self>) {
        if self.draining.load(Ordering::Acquire) {
            return;
        }

        // Probe the idle stock without holding the lock.
        let snapshot: Vec<TrackedInstance> = self.available.lock().unwrap().clone();
        for instance in &snapshot {
            if !self.factory.validate(instance.handle()) {
                instance.mark_unhealthy();
            }
        }

        // Decide culls under the lock, destroy outside it.
        let mut doomed = Vec::new();
        {
            let mut total = self.total();
            let mut available = self.available.lock().unwrap();
            let mut keep = Vec::with_capacity(available.len());
            // Oldest (coldest) instances live at the bottom of the stack.
            for instance in available.drain(..) {
                if !instance.is_healthy() {
                    doomed.push((instance, "unhealthy in maintenance"));
                    total -= 1;
                } else if total > self.config.min
                    && instance.idle_for() > self.config.idle_timeout
                {
                    doomed.push((instance, "idle past timeout"));
                    total -= 1;
                } else {
                    keep.push(instance);
                }
            }
            *available = keep;
        }
        for (instance, reason) in doomed {
            let _ = self.runtime.block_on(PoolInner::destroy(self, instance, reason));
        }

        // Top up to the warm floor.
        while !self.draining.load(Ordering::Acquire)
            && self.total() + self.creating.load(Ordering::Acquire) < self.config.min
        {
            if !self.try_reserve_creation_slot() {
                break;
            }
            match self.runtime.block_on(self.create_registered()) {
                Ok(instance) => {
                    self.available.lock().unwrap().push(instance);
                    self.slot_free.notify_one();
                }
                Err(e) => {
                    log::warn!("Maintenance top-up failed: {e}");
                    break;
                }
            }
        }
    }
}

/// The public pool surface.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use printeer::config::{EffectiveConfig, Environment};
/// use printeer::factory::ChromeBrowserFactory;
/// use printeer::pool::BrowserPool;
///
/// # async fn example() -> printeer::Result<()> {
/// let config = EffectiveConfig::defaults(Environment::Production);
/// let factory = Arc::new(ChromeBrowserFactory::from_config(&config.browser));
/// let pool = BrowserPool::new(&config, factory, None);
/// pool.initialize();
/// pool.warm_up().await?;
///
/// let browser = pool.get_browser().await?;
/// // ... render with browser ...
/// browser.release().await;
///
/// pool.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct BrowserPool {
    inner: Arc<PoolInner>,
}

impl BrowserPool {
    /// Build a pool over `factory`, reporting instance counts to
    /// `monitor` when given.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context (the runtime
    /// handle is captured here so `Drop`-path releases can be spawned
    /// from sync contexts).
    pub fn new(
        config: &EffectiveConfig,
        factory: Arc<dyn BrowserFactory>,
        monitor: Option<ResourceMonitor>,
    ) -> Self {
        log::info!(
            "Initializing browser pool (min {}, max {}, idle timeout {:?})",
            config.browser.pool.min,
            config.browser.pool.max,
            config.browser.pool.idle_timeout
        );
        Self {
            inner: Arc::new(PoolInner {
                config: config.browser.pool.clone(),
                factory,
                monitor,
                instances: Mutex::new(HashMap::new()),
                available: Mutex::new(Vec::new()),
                creating: AtomicUsize::new(0),
                draining: AtomicBool::new(false),
                slot_free: Notify::new(),
                metrics: PoolMetrics::default(),
                runtime: tokio::runtime::Handle::current(),
                maintenance_signal: Arc::new((Mutex::new(false), Condvar::new())),
                maintenance_thread: Mutex::new(None),
                destruction_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start the maintenance loop and register this pool in the
    /// emergency-cleanup slot. Idempotent per pool.
    pub fn initialize(&self) {
        registry::register(&self.inner);

        let mut slot = self.inner.maintenance_thread.lock().unwrap();
        if slot.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let signal = Arc::clone(&self.inner.maintenance_signal);
        let interval = self.inner.config.cleanup_interval;
        *slot = Some(std::thread::spawn(move || {
            log::info!("Pool maintenance loop started (interval {interval:?})");
            loop {
                let (lock, cvar) = &*signal;
                let (stop, wait) = {
                    let stopped = lock.lock().unwrap();
                    let result = cvar.wait_timeout(stopped, interval).unwrap();
                    (*result.0, result.1)
                };
                if stop {
                    break;
                }
                if !wait.timed_out() {
                    continue;
                }
                inner.maintenance_pass();
            }
            log::info!("Pool maintenance loop stopped");
        }));
    }

    /// Pre-create instances up to `pool.min`.
    pub async fn warm_up(&self) -> Result<()> {
        while self.inner.total() + self.inner.creating.load(Ordering::Acquire)
            < self.inner.config.min
        {
            if !self.inner.try_reserve_creation_slot() {
                break;
            }
            let instance = self.inner.create_registered().await?;
            self.inner.available.lock().unwrap().push(instance);
            self.inner.slot_free.notify_one();
        }
        Ok(())
    }

    /// Acquire a browser with the default 30 s timeout.
    pub async fn get_browser(&self) -> Result<PooledBrowser> {
        self.get_browser_with_timeout(DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// Acquire a browser, waiting at most `timeout` for capacity.
    pub async fn get_browser_with_timeout(&self, timeout: Duration) -> Result<PooledBrowser> {
        self.inner.acquire(timeout).await
    }

    /// Destroy one idle instance now, if the pool sits above its floor.
    ///
    /// This is the shrink signal the limit enforcer and the optimizer
    /// drive; busy instances are never interrupted.
    pub fn request_shrink(&self) {
        if self.inner.total() <= self.inner.config.min {
            return;
        }
        // The bottom of the stack is the coldest instance.
        let victim = {
            let mut available = self.inner.available.lock().unwrap();
            if available.is_empty() {
                None
            } else {
                Some(available.remove(0))
            }
        };
        if let Some(instance) = victim {
            log::info!("Shrink requested; destroying idle instance {}", instance.id());
            self.inner.spawn_destroy(instance, "pool shrink");
        }
    }

    /// Current shape and lifetime counters.
    pub fn status(&self) -> PoolStatus {
        let (total, healthy) = {
            let instances = self.inner.instances.lock().unwrap();
            let healthy = instances.values().filter(|i| i.is_healthy()).count();
            (instances.len(), healthy)
        };
        let available = self.inner.available.lock().unwrap().len();
        PoolStatus {
            total_browsers: total,
            available,
            busy: total.saturating_sub(available),
            healthy,
            draining: self.inner.draining.load(Ordering::Acquire),
            metrics: self.inner.metrics.snapshot(),
        }
    }

    /// Drain and destroy everything. Idempotent; metrics counters are
    /// left untouched.
    pub async fn shutdown(&self) {
        if self.inner.draining.swap(true, Ordering::AcqRel) {
            log::debug!("Pool shutdown already in progress");
            return;
        }
        log::info!("Shutting down browser pool");

        // Fail fast for everyone parked in acquire.
        self.inner.slot_free.notify_waiters();

        // Stop the maintenance loop before tearing instances down.
        {
            let (lock, cvar) = &*self.inner.maintenance_signal;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
        let maintenance_thread = self.inner.maintenance_thread.lock().unwrap().take();
        if let Some(thread) = maintenance_thread {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }

        self.inner.destroy_all("shutdown").await;

        let status = self.status();
        log::info!("Pool shutdown complete: {status}");
    }

    pub(crate) fn inner(&self) -> &Arc<PoolInner> {
        &self.inner
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::factory::mock::MockBrowserFactory;

    fn test_config(min: usize, max: usize) -> EffectiveConfig {
        let mut config = EffectiveConfig::defaults(Environment::Test);
        config.browser.pool.min = min;
        config.browser.pool.max = max;
        config.browser.pool.idle_timeout = Duration::from_secs(300);
        config.resources.max_browser_instances = max.max(1);
        config
    }

    fn pool_with(
        factory: MockBrowserFactory,
        min: usize,
        max: usize,
    ) -> (BrowserPool, Arc<MockBrowserFactory>) {
        let factory = Arc::new(factory);
        let dyn_factory: Arc<dyn BrowserFactory> = factory.clone() as Arc<dyn BrowserFactory>;
        let pool = BrowserPool::new(&test_config(min, max), dyn_factory, None);
        (pool, factory)
    }

    /// Verifies creation on demand, reuse on re-acquire, and the
    /// created/reused counters.
    #[tokio::test]
    async fn test_create_then_reuse() {
        let (pool, factory) = pool_with(MockBrowserFactory::new(), 0, 2);

        let first = pool.get_browser().await.unwrap();
        let first_id = first.id();
        first.release().await;

        let second = pool.get_browser().await.unwrap();
        assert_eq!(second.id(), first_id, "LIFO reuse should return the same instance");
        second.release().await;

        let status = pool.status();
        assert_eq!(status.metrics.created, 1);
        assert!(status.metrics.reused >= 1);
        assert_eq!(factory.creation_count(), 1);
    }

    /// Verifies acquire blocks at capacity and resumes when a borrower
    /// releases.
    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let (pool, _factory) = pool_with(MockBrowserFactory::new(), 0, 1);
        let pool = Arc::new(pool);

        let held = pool.get_browser().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.get_browser_with_timeout(Duration::from_secs(5)).await
            })
        };

        // Give the waiter time to park.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        held.release().await;
        let acquired = waiter.await.unwrap();
        assert!(acquired.is_ok());
        acquired.unwrap().release().await;
    }

    /// Verifies a timed-out acquire surfaces `PoolTimeout` and leaves the
    /// accounting unchanged.
    #[tokio::test]
    async fn test_acquire_timeout_accounting_unchanged() {
        let (pool, _factory) = pool_with(MockBrowserFactory::new(), 0, 1);

        let held = pool.get_browser().await.unwrap();
        let before = pool.status();

        let result = pool
            .get_browser_with_timeout(Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(PrinteerError::PoolTimeout { .. })));

        let after = pool.status();
        assert_eq!(before.total_browsers, after.total_browsers);
        assert_eq!(before.available, after.available);
        assert_eq!(before.metrics.created, after.metrics.created);

        held.release().await;
    }

    /// Verifies an unhealthy instance is destroyed on release instead of
    /// returning to the stack.
    #[tokio::test]
    async fn test_unhealthy_release_destroys() {
        let (pool, factory) = pool_with(MockBrowserFactory::new(), 0, 2);

        let browser = pool.get_browser().await.unwrap();
        factory.states()[0]
            .healthy
            .store(false, std::sync::atomic::Ordering::SeqCst);
        browser.release().await;

        let status = pool.status();
        assert_eq!(status.total_browsers, 0);
        assert_eq!(status.metrics.destroyed, 1);
        assert!(!factory.states()[0]
            .alive
            .load(std::sync::atomic::Ordering::SeqCst));
    }

    /// Verifies creation failure surfaces the tried profiles.
    #[tokio::test]
    async fn test_creation_failure_details() {
        let (pool, _factory) = pool_with(MockBrowserFactory::always_fails("no binary"), 0, 2);

        match pool.get_browser().await {
            Err(PrinteerError::CreationFailed { tried, .. }) => {
                assert_eq!(tried.len(), 5, "whole ladder should be tried");
            }
            other => panic!("expected CreationFailed, got {other:?}"),
        }
        assert_eq!(pool.status().metrics.errors, 1);
    }

    /// Verifies shutdown destroys everything, fails new acquires fast,
    /// keeps counters, and is idempotent.
    #[tokio::test]
    async fn test_shutdown() {
        let (pool, factory) = pool_with(MockBrowserFactory::new(), 0, 3);

        let a = pool.get_browser().await.unwrap();
        let b = pool.get_browser().await.unwrap();
        a.release().await;
        b.release().await;

        pool.shutdown().await;

        let status = pool.status();
        assert_eq!(status.total_browsers, 0);
        assert!(status.draining);
        assert_eq!(status.metrics.created, 2, "counters survive shutdown");
        assert_eq!(status.metrics.destroyed, 2);
        for state in factory.states() {
            assert!(!state.alive.load(std::sync::atomic::Ordering::SeqCst));
        }

        assert!(matches!(
            pool.get_browser().await,
            Err(PrinteerError::ShuttingDown)
        ));

        // Second shutdown is a no-op.
        pool.shutdown().await;
        assert_eq!(pool.status().metrics.destroyed, 2);
    }

    /// Verifies shutdown wakes parked acquirers with `ShuttingDown`.
    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let (pool, _factory) = pool_with(MockBrowserFactory::new(), 0, 1);
        let pool = Arc::new(pool);

        let held = pool.get_browser().await.unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.get_browser_with_timeout(Duration::from_secs(30)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.shutdown().await;
        drop(held);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(PrinteerError::ShuttingDown)));
    }

    /// Verifies warm_up pre-creates to the floor and acquire then reuses.
    #[tokio::test]
    async fn test_warm_up() {
        let (pool, factory) = pool_with(MockBrowserFactory::new(), 2, 4);
        pool.warm_up().await.unwrap();

        let status = pool.status();
        assert_eq!(status.total_browsers, 2);
        assert_eq!(status.available, 2);
        assert_eq!(factory.creation_count(), 2);

        let browser = pool.get_browser().await.unwrap();
        assert_eq!(pool.status().metrics.reused, 1);
        browser.release().await;
        pool.shutdown().await;
    }

    /// Verifies request_shrink culls an idle instance but respects the
    /// floor.
    #[tokio::test]
    async fn test_request_shrink() {
        let (pool, _factory) = pool_with(MockBrowserFactory::new(), 1, 4);

        let a = pool.get_browser().await.unwrap();
        let b = pool.get_browser().await.unwrap();
        a.release().await;
        b.release().await;
        assert_eq!(pool.status().total_browsers, 2);

        pool.request_shrink();
        // Destruction is async; wait for it to land.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.status().total_browsers, 1);

        // At the floor now; further shrinks are refused.
        pool.request_shrink();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.status().total_browsers, 1);
        pool.shutdown().await;
    }

    /// Verifies a browser that refuses to die stays in the accounting
    /// with an error recorded, rather than leaking silently.
    #[tokio::test]
    async fn test_destruction_incomplete_keeps_accounting() {
        let (pool, factory) = pool_with(MockBrowserFactory::new(), 0, 2);

        let browser = pool.get_browser().await.unwrap();
        let state = factory.states()[0].clone();
        state
            .refuse_to_die
            .store(true, std::sync::atomic::Ordering::SeqCst);
        state
            .healthy
            .store(false, std::sync::atomic::Ordering::SeqCst);
        browser.release().await;

        let status = pool.status();
        assert_eq!(
            status.total_browsers, 1,
            "unverified instance must stay accounted"
        );
        assert!(status.metrics.errors >= 1);
        assert_eq!(status.metrics.destroyed, 0);

        // Let it die so shutdown can finish.
        state
            .refuse_to_die
            .store(false, std::sync::atomic::Ordering::SeqCst);
        pool.shutdown().await;
        assert_eq!(pool.status().total_browsers, 0);
    }

    /// Verifies unknown releases are ignored (logged no-op).
    #[tokio::test]
    async fn test_unknown_release_ignored() {
        let (pool, factory) = pool_with(MockBrowserFactory::new(), 0, 2);
        let foreign = TrackedInstance::new(
            factory.create(&factory.optimal_launch_options()).unwrap(),
        );
        PoolInner::release(Arc::clone(pool.inner()), foreign).await;
        assert_eq!(pool.status().total_browsers, 0);
    }
}
