//! Host resource monitoring.
//!
//! [`ResourceMonitor`] samples memory, CPU and temp-area disk usage on a
//! background thread, keeps a bounded history ring, tracks the live
//! browser/request counters, and evaluates [`Pressure`] against the
//! configured thresholds on every tick.
//!
//! # Design
//!
//! - The sampling loop is a dedicated thread woken through a
//!   `(Mutex<bool>, Condvar)` shutdown signal, so `stop()` interrupts the
//!   sleep immediately instead of waiting out the interval.
//! - The history ring is single-writer (the sampling thread) and
//!   multi-reader; readers take a locked snapshot.
//! - Counters are atomics with saturating decrement — an unbalanced `dec`
//!   can never drive them negative.
//! - Pressure callbacks run synchronously on the sampling thread; a
//!   panicking subscriber is caught and logged, never killing monitoring.
//! - OS sampling failures degrade to the last good sample with the
//!   `degraded` flag set; they are not errors.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sysinfo::{Disks, System};

use crate::config::AlertThresholds;

/// Samples retained in the history ring.
const HISTORY_CAPACITY: usize = 20;

/// One observation of host and engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    /// Used fraction of physical memory, in `[0, 1]`.
    pub memory_usage: f64,
    /// Global CPU usage fraction, in `[0, 1]`.
    pub cpu_usage: f64,
    /// Used fraction of the filesystem holding the temp dir, in `[0, 1]`.
    pub disk_usage: f64,
    /// Live browser instances (engine counter, not an OS probe).
    pub browser_instances: usize,
    /// In-flight conversion requests.
    pub active_requests: usize,
    /// Wall-clock time the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// True when OS sampling failed and usage values were carried over
    /// from the last good sample.
    pub degraded: bool,
}

impl ResourceSample {
    /// A zeroed sample, used before the first tick completes.
    pub fn empty() -> Self {
        Self {
            memory_usage: 0.0,
            cpu_usage: 0.0,
            disk_usage: 0.0,
            browser_instances: 0,
            active_requests: 0,
            timestamp: Utc::now(),
            degraded: false,
        }
    }
}

/// Per-resource pressure booleans derived from the warning thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pressure {
    /// Memory above its warning threshold.
    pub memory: bool,
    /// CPU above its warning threshold.
    pub cpu: bool,
    /// Disk above its warning threshold.
    pub disk: bool,
    /// Any of the above.
    pub overall: bool,
}

/// Evaluate pressure for a sample. Pure.
pub fn evaluate_pressure(sample: &ResourceSample, thresholds: &AlertThresholds) -> Pressure {
    let memory = sample.memory_usage > thresholds.memory_warn;
    let cpu = sample.cpu_usage > thresholds.cpu_warn;
    let disk = sample.disk_usage > thresholds.disk_warn;
    Pressure {
        memory,
        cpu,
        disk,
        overall: memory || cpu || disk,
    }
}

type PressureCallback = Box<dyn Fn(&Pressure, &ResourceSample) + Send + Sync>;

/// Identifies a pressure subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Raw OS readings for one tick.
struct OsReadings {
    memory_usage: f64,
    cpu_usage: f64,
    disk_usage: f64,
}

/// Wraps the `sysinfo` handles kept warm between ticks (CPU usage is a
/// rolling delta, so the `System` must persist across refreshes).
struct Sampler {
    system: System,
    temp_dir: PathBuf,
}

impl Sampler {
    fn new() -> Self {
        Self {
            system: System::new(),
            temp_dir: std::env::temp_dir(),
        }
    }

    fn read(&mut self) -> Result<OsReadings, String> {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        let total = self.system.total_memory();
        if total == 0 {
            return Err("total memory reported as zero".to_string());
        }
        let available = self.system.available_memory().min(total);
        let memory_usage = (total - available) as f64 / total as f64;

        let cpu_usage = (f64::from(self.system.global_cpu_usage()) / 100.0).clamp(0.0, 1.0);

        let disk_usage = self.temp_disk_usage()?;

        Ok(OsReadings {
            memory_usage,
            cpu_usage,
            disk_usage,
        })
    }

    /// Usage of the filesystem holding the temp dir: the mount point with
    /// the longest path prefix of the temp dir wins.
    fn temp_disk_usage(&self) -> Result<f64, String> {
        let disks = Disks::new_with_refreshed_list();
        let best = disks
            .list()
            .iter()
            .filter(|disk| self.temp_dir.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len());
        match best {
            Some(disk) if disk.total_space() > 0 => {
                let total = disk.total_space() as f64;
                let available = disk.available_space() as f64;
                Ok(((total - available) / total).clamp(0.0, 1.0))
            }
            _ => Err(format!(
                "no filesystem found for temp dir {}",
                self.temp_dir.display()
            )),
        }
    }
}

struct MonitorInner {
    thresholds: AlertThresholds,
    history: Mutex<VecDeque<ResourceSample>>,
    browsers: AtomicUsize,
    requests: AtomicUsize,
    degraded: AtomicBool,
    next_subscription: AtomicUsize,
    subscribers: Mutex<Vec<(SubscriptionId, PressureCallback)>>,
    running: AtomicBool,
    shutdown_signal: Arc<(Mutex<bool>, Condvar)>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorInner {
    fn record(&self, sample: ResourceSample) {
        let pressure = evaluate_pressure(&sample, &self.thresholds);
        {
            let mut history = self.history.lock().unwrap();
            if history.len() == HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(sample.clone());
        }

        if pressure.overall {
            log::debug!(
                "Resource pressure: memory={} cpu={} disk={} (sample mem={:.2} cpu={:.2} disk={:.2})",
                pressure.memory,
                pressure.cpu,
                pressure.disk,
                sample.memory_usage,
                sample.cpu_usage,
                sample.disk_usage
            );
        }

        let subscribers = self.subscribers.lock().unwrap();
        for (_, callback) in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(&pressure, &sample))).is_err() {
                log::error!("Pressure subscriber panicked; continuing monitoring");
            }
        }
    }

    fn take_sample(&self, sampler: &mut Sampler) {
        let browser_instances = self.browsers.load(Ordering::Acquire);
        let active_requests = self.requests.load(Ordering::Acquire);

        let sample = match sampler.read() {
            Ok(readings) => {
                self.degraded.store(false, Ordering::Release);
                ResourceSample {
                    memory_usage: readings.memory_usage,
                    cpu_usage: readings.cpu_usage,
                    disk_usage: readings.disk_usage,
                    browser_instances,
                    active_requests,
                    timestamp: Utc::now(),
                    degraded: false,
                }
            }
            Err(message) => {
                // Carry the last good usage numbers forward; counters are
                // still live.
                log::warn!("Resource sampling failed, serving degraded sample: {message}");
                self.degraded.store(true, Ordering::Release);
                let last = self
                    .history
                    .lock()
                    .unwrap()
                    .back()
                    .cloned()
                    .unwrap_or_else(ResourceSample::empty);
                ResourceSample {
                    browser_instances,
                    active_requests,
                    timestamp: Utc::now(),
                    degraded: true,
                    ..last
                }
            }
        };

        self.record(sample);
    }
}

/// Periodic sampler of host resources and engine counters.
///
/// Cloning is cheap and shares the underlying state, so the monitor can be
/// handed to the pool, the limit enforcer and the batch scheduler at once.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use printeer::config::AlertThresholds;
/// use printeer::monitor::ResourceMonitor;
///
/// let monitor = ResourceMonitor::new(AlertThresholds::default());
/// monitor.on_pressure(|pressure, _sample| {
///     if pressure.memory {
///         log::warn!("memory pressure");
///     }
/// });
/// monitor.start(Duration::from_secs(5));
/// // ...
/// monitor.stop();
/// ```
#[derive(Clone)]
pub struct ResourceMonitor {
    inner: Arc<MonitorInner>,
}

impl ResourceMonitor {
    /// Create a stopped monitor with the given thresholds.
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                thresholds,
                history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
                browsers: AtomicUsize::new(0),
                requests: AtomicUsize::new(0),
                degraded: AtomicBool::new(false),
                next_subscription: AtomicUsize::new(0),
                subscribers: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                shutdown_signal: Arc::new((Mutex::new(false), Condvar::new())),
                thread: Mutex::new(None),
            }),
        }
    }

    /// Start the sampling loop. Re-starting a running monitor is a no-op.
    pub fn start(&self, interval: Duration) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            log::debug!("Resource monitor already running");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let signal = Arc::clone(&self.inner.shutdown_signal);
        let handle = std::thread::spawn(move || {
            log::info!("Resource monitor started (interval {interval:?})");
            let mut sampler = Sampler::new();

            // First sample immediately so `latest()` has data before the
            // first interval elapses.
            inner.take_sample(&mut sampler);

            loop {
                let (lock, cvar) = &*signal;
                let (guard, wait) = {
                    let stopped = lock.lock().unwrap();
                    let result = cvar.wait_timeout(stopped, interval).unwrap();
                    (*result.0, result.1)
                };
                if guard {
                    break;
                }
                if !wait.timed_out() {
                    // Spurious wakeup: neither shutdown nor a full interval.
                    continue;
                }
                inner.take_sample(&mut sampler);
            }
            log::info!("Resource monitor stopped");
        });

        *self.inner.thread.lock().unwrap() = Some(handle);
    }

    /// Stop the sampling loop and join it. Idempotent.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let (lock, cvar) = &*self.inner.shutdown_signal;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
        if let Some(handle) = self.inner.thread.lock().unwrap().take() {
            if handle.join().is_err() {
                log::error!("Resource monitor thread panicked");
            }
        }
        // Re-arm the signal so the monitor can be started again.
        *self.inner.shutdown_signal.0.lock().unwrap() = false;
    }

    /// The most recent sample, with live counters substituted in so the
    /// reading is current even between ticks.
    pub fn latest(&self) -> ResourceSample {
        let mut sample = self
            .inner
            .history
            .lock()
            .unwrap()
            .back()
            .cloned()
            .unwrap_or_else(ResourceSample::empty);
        sample.browser_instances = self.inner.browsers.load(Ordering::Acquire);
        sample.active_requests = self.inner.requests.load(Ordering::Acquire);
        sample.degraded = self.inner.degraded.load(Ordering::Acquire);
        sample
    }

    /// Snapshot of the history ring, oldest first.
    pub fn history(&self) -> Vec<ResourceSample> {
        self.inner.history.lock().unwrap().iter().cloned().collect()
    }

    /// Pressure of the latest sample.
    pub fn pressure(&self) -> Pressure {
        evaluate_pressure(&self.latest(), &self.inner.thresholds)
    }

    /// Subscribe to per-tick pressure evaluations. The returned id can be
    /// passed to [`off_pressure`](Self::off_pressure) when the subscriber
    /// goes away (batch runs subscribe per run).
    pub fn on_pressure<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Pressure, &ResourceSample) + Send + Sync + 'static,
    {
        let id = SubscriptionId(
            self.inner.next_subscription.fetch_add(1, Ordering::AcqRel) as u64,
        );
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a pressure subscription. Unknown ids are ignored.
    pub fn off_pressure(&self, id: SubscriptionId) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .retain(|(existing, _)| *existing != id);
    }

    /// Record a browser instance coming up.
    pub fn inc_browsers(&self) {
        self.inner.browsers.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a browser instance going away. Saturates at zero.
    pub fn dec_browsers(&self) {
        let _ = self
            .inner
            .browsers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
    }

    /// Record an admitted request.
    pub fn inc_requests(&self) {
        self.inner.requests.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a finished request. Saturates at zero.
    pub fn dec_requests(&self) {
        let _ = self
            .inner
            .requests
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
    }

    /// Current browser counter.
    pub fn browser_count(&self) -> usize {
        self.inner.browsers.load(Ordering::Acquire)
    }

    /// Current request counter.
    pub fn request_count(&self) -> usize {
        self.inner.requests.load(Ordering::Acquire)
    }

    /// Push a synthetic sample through the normal pressure/callback path.
    ///
    /// Test hook: lets suites simulate memory or CPU spikes without
    /// depending on the host.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn inject_sample(&self, mut sample: ResourceSample) {
        sample.browser_instances = self.inner.browsers.load(Ordering::Acquire);
        sample.active_requests = self.inner.requests.load(Ordering::Acquire);
        self.inner.record(sample);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
