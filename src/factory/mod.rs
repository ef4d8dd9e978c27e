//! Browser factory abstraction.
//!
//! The engine never drives a browser directly: it consumes an opaque
//! [`BrowserHandle`] produced by a [`BrowserFactory`]. The factory owns
//! every browser-specific concern — launching, the trivial page-load probe
//! used for validation, graceful close, and hard process termination —
//! while the pool owns lifecycle ordering and accounting.
//!
//! # Launch ladder
//!
//! Creation does not get one shot. The factory advertises an *optimal*
//! launch configuration plus an ordered list of progressively more
//! conservative fallbacks ([`LaunchProfile`]); the pool walks the ladder,
//! validating each launched browser with the probe, and the first
//! validated instance wins.
//!
//! # Implementations
//!
//! | Factory | Description |
//! |---------|-------------|
//! | [`ChromeBrowserFactory`] | Drives Chrome/Chromium via `headless_chrome` |
//! | [`mock::MockBrowserFactory`] | In-memory browsers for tests (feature-gated) |

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::ChromeBrowserFactory;

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// A live browser as the engine sees it: opaque, with just enough surface
/// for process hygiene.
///
/// Renderer adapters that know the concrete type can recover it through
/// [`as_any`](Self::as_any).
pub trait BrowserHandle: Send + Sync + fmt::Debug {
    /// OS process id of the browser, when one exists.
    fn process_id(&self) -> Option<u32>;

    /// Downcast support for renderer adapters.
    fn as_any(&self) -> &dyn Any;
}

/// Conservativeness tier of a launch configuration.
///
/// Ordered from most capable to most defensive; the pool tries them in
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchProfile {
    /// Render-tuned configuration derived from the effective config.
    Optimal,
    /// Plain defaults.
    Standard,
    /// Bare minimum arguments.
    Minimal,
    /// Container-safe: no sandbox, no /dev/shm reliance, no GPU.
    ContainerOptimized,
    /// Headless servers with no display stack at all.
    HeadlessServer,
}

impl LaunchProfile {
    /// Stable name used in diagnostics and `CreationFailed` details.
    pub fn name(&self) -> &'static str {
        match self {
            LaunchProfile::Optimal => "optimal",
            LaunchProfile::Standard => "standard",
            LaunchProfile::Minimal => "minimal",
            LaunchProfile::ContainerOptimized => "container-optimized",
            LaunchProfile::HeadlessServer => "headless-server",
        }
    }
}

impl fmt::Display for LaunchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One launch configuration the factory can attempt.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Which tier of the ladder this is.
    pub profile: LaunchProfile,
    /// Launch headless.
    pub headless: bool,
    /// Explicit binary; `None` lets the factory auto-detect.
    pub executable_path: Option<PathBuf>,
    /// Extra command-line arguments.
    pub args: Vec<String>,
    /// How long a launch may take before it counts as failed.
    pub launch_timeout: Duration,
    /// Whether the browser sandbox stays enabled.
    pub sandbox: bool,
}

/// Creates, probes and terminates browsers.
///
/// # Thread safety
///
/// Implementations are shared across the pool's worker tasks and its
/// maintenance thread, hence `Send + Sync`. All methods are synchronous;
/// the pool off-loads them with `spawn_blocking` so launch and probe I/O
/// never stalls the scheduler.
pub trait BrowserFactory: Send + Sync {
    /// Launch a browser with the given configuration.
    fn create(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserHandle>>;

    /// Trivial page-load probe: `true` means the browser accepted a tab,
    /// navigated and cleaned up.
    fn validate(&self, handle: &dyn BrowserHandle) -> bool;

    /// Request a graceful close.
    fn close(&self, handle: &dyn BrowserHandle) -> Result<()>;

    /// Terminate the underlying process without ceremony.
    fn kill_process(&self, handle: &dyn BrowserHandle) -> Result<()>;

    /// Whether the underlying process still exists.
    fn process_alive(&self, handle: &dyn BrowserHandle) -> bool;

    /// Browser version string, for diagnostics.
    fn version(&self, handle: &dyn BrowserHandle) -> Result<String>;

    /// The render-tuned first rung of the launch ladder.
    fn optimal_launch_options(&self) -> LaunchOptions;

    /// The remaining rungs, most capable first.
    fn fallback_launch_options(&self) -> Vec<LaunchOptions>;
}

// ============================================================================
// Unit Tests
// ============================================================================
