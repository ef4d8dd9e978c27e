//! Mock browser factory for testing.
//!
//! [`MockBrowserFactory`] implements the whole [`BrowserFactory`] contract
//! in memory so pool, scheduler and orchestrator behavior can be exercised
//! without a Chrome binary. Each created handle exposes its shared
//! [`MockHandleState`], letting tests flip health, simulate crashes, or
//! refuse to die to exercise destruction verification.
//!
//! # Feature flag
//!
//! Available under `#[cfg(test)]` and the `test-utils` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use printeer::factory::mock::MockBrowserFactory;
//!
//! let factory = MockBrowserFactory::new();
//! let handle = factory.create(&factory.optimal_launch_options())?;
//! assert!(factory.validate(handle.as_ref()));
//!
//! // Simulate a crash:
//! factory.states()[0].healthy.store(false, Ordering::SeqCst);
//! assert!(!factory.validate(handle.as_ref()));
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrowserFactory, BrowserHandle, LaunchOptions, LaunchProfile};
use crate::error::{PrinteerError, Result};

/// Shared, test-visible state of one mock browser.
#[derive(Debug)]
pub struct MockHandleState {
    /// Sequential id of this browser.
    pub id: u64,
    /// Whether the simulated process exists.
    pub alive: AtomicBool,
    /// Whether the probe should succeed.
    pub healthy: AtomicBool,
    /// Set when a graceful close was requested.
    pub closed_gracefully: AtomicBool,
    /// Set when a force-kill was requested.
    pub killed: AtomicBool,
    /// When set, close/kill leave `alive` untouched — the browser refuses
    /// to die, exercising destruction verification.
    pub refuse_to_die: AtomicBool,
}

impl MockHandleState {
    fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            alive: AtomicBool::new(true),
            healthy: AtomicBool::new(true),
            closed_gracefully: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            refuse_to_die: AtomicBool::new(false),
        })
    }
}

/// The handle handed to the pool.
#[derive(Debug, Clone)]
pub struct MockBrowserHandle {
    state: Arc<MockHandleState>,
}

impl MockBrowserHandle {
    /// The shared state behind this handle.
    pub fn state(&self) -> &Arc<MockHandleState> {
        &self.state
    }
}

impl BrowserHandle for MockBrowserHandle {
    fn process_id(&self) -> Option<u32> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// In-memory browser factory with configurable failure behavior.
pub struct MockBrowserFactory {
    next_id: AtomicU64,
    creation_count: Arc<AtomicUsize>,
    states: Mutex<Vec<Arc<MockHandleState>>>,
    fail_all: Option<String>,
    fail_after: Option<usize>,
    failing_profiles: HashSet<&'static str>,
    unhealthy_profiles: HashSet<&'static str>,
    error_message: String,
}

impl MockBrowserFactory {
    /// Factory whose creations always succeed.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            creation_count: Arc::new(AtomicUsize::new(0)),
            states: Mutex::new(Vec::new()),
            fail_all: None,
            fail_after: None,
            failing_profiles: HashSet::new(),
            unhealthy_profiles: HashSet::new(),
            error_message: String::new(),
        }
    }

    /// Factory that fails every creation with `message`.
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self {
            fail_all: Some(message.into()),
            ..Self::new()
        }
    }

    /// Factory that fails after `n` successful creations.
    pub fn fail_after_n<S: Into<String>>(n: usize, message: S) -> Self {
        Self {
            fail_after: Some(n),
            error_message: message.into(),
            ..Self::new()
        }
    }

    /// Factory that fails creation for specific launch-profile names,
    /// exercising the fallback ladder.
    pub fn failing_profiles<S: Into<String>>(
        profiles: impl IntoIterator<Item = &'static str>,
        message: S,
    ) -> Self {
        Self {
            failing_profiles: profiles.into_iter().collect(),
            error_message: message.into(),
            ..Self::new()
        }
    }

    /// Factory whose browsers for the named profiles launch but fail the
    /// validation probe, exercising the ladder's tear-down path.
    pub fn unhealthy_profiles(profiles: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            unhealthy_profiles: profiles.into_iter().collect(),
            ..Self::new()
        }
    }

    /// Creation attempts so far.
    pub fn creation_count(&self) -> usize {
        self.creation_count.load(Ordering::SeqCst)
    }

    /// Shared counter for tests that move the factory into a pool.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.creation_count)
    }

    /// States of every browser created so far, in creation order.
    pub fn states(&self) -> Vec<Arc<MockHandleState>> {
        self.states.lock().unwrap().clone()
    }

    fn state_of(handle: &dyn BrowserHandle) -> Option<Arc<MockHandleState>> {
        handle
            .as_any()
            .downcast_ref::<MockBrowserHandle>()
            .map(|mock| Arc::clone(&mock.state))
    }
}

impl Default for MockBrowserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserFactory for MockBrowserFactory {
    fn create(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserHandle>> {
        let attempt = self.creation_count.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_all {
            return Err(PrinteerError::CreationFailed {
                tried: vec![options.profile.name().to_string()],
                last_error: message.clone(),
            });
        }
        if let Some(limit) = self.fail_after {
            if attempt >= limit {
                return Err(PrinteerError::CreationFailed {
                    tried: vec![options.profile.name().to_string()],
                    last_error: self.error_message.clone(),
                });
            }
        }
        if self.failing_profiles.contains(options.profile.name()) {
            return Err(PrinteerError::CreationFailed {
                tried: vec![options.profile.name().to_string()],
                last_error: self.error_message.clone(),
            });
        }

        let state = MockHandleState::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        if self.unhealthy_profiles.contains(options.profile.name()) {
            state.healthy.store(false, Ordering::SeqCst);
        }
        self.states.lock().unwrap().push(Arc::clone(&state));
        log::debug!(
            "MockBrowserFactory created browser {} ({} profile)",
            state.id,
            options.profile
        );
        Ok(Box::new(MockBrowserHandle { state }))
    }

    fn validate(&self, handle: &dyn BrowserHandle) -> bool {
        Self::state_of(handle)
            .map(|s| s.alive.load(Ordering::SeqCst) && s.healthy.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn close(&self, handle: &dyn BrowserHandle) -> Result<()> {
        if let Some(state) = Self::state_of(handle) {
            state.closed_gracefully.store(true, Ordering::SeqCst);
            if !state.refuse_to_die.load(Ordering::SeqCst) {
                state.alive.store(false, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn kill_process(&self, handle: &dyn BrowserHandle) -> Result<()> {
        if let Some(state) = Self::state_of(handle) {
            state.killed.store(true, Ordering::SeqCst);
            if !state.refuse_to_die.load(Ordering::SeqCst) {
                state.alive.store(false, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn process_alive(&self, handle: &dyn BrowserHandle) -> bool {
        Self::state_of(handle)
            .map(|s| s.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn version(&self, _handle: &dyn BrowserHandle) -> Result<String> {
        Ok("MockBrowser/1.0".to_string())
    }

    fn optimal_launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            profile: LaunchProfile::Optimal,
            headless: true,
            executable_path: None,
            args: Vec::new(),
            launch_timeout: Duration::from_secs(5),
            sandbox: true,
        }
    }

    fn fallback_launch_options(&self) -> Vec<LaunchOptions> {
        [
            LaunchProfile::Standard,
            LaunchProfile::Minimal,
            LaunchProfile::ContainerOptimized,
            LaunchProfile::HeadlessServer,
        ]
        .into_iter()
        .map(|profile| LaunchOptions {
            profile,
            headless: true,
            executable_path: None,
            args: Vec::new(),
            launch_timeout: Duration::from_secs(5),
            sandbox: false,
        })
        .collect()
    }
}

impl std::fmt::Debug for MockBrowserFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBrowserFactory")
            .field("creation_count", &self.creation_count())
            .field("fail_all", &self.fail_all)
            .field("fail_after", &self.fail_after)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
