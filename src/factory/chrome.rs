//! Chrome/Chromium factory over `headless_chrome`.
//!
//! [`ChromeBrowserFactory`] turns the engine's [`LaunchOptions`] into
//! `headless_chrome` launches and implements the probe/close/kill contract
//! the pool relies on for process-level lifecycle certainty.
//!
//! `headless auto` resolves here: headful only when a display server is
//! discoverable (`DISPLAY`/`WAYLAND_DISPLAY` on Unix); everywhere else
//! `auto` means headless.

use std::any::Any;
use std::ffi::OsStr;
use std::sync::Mutex;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions as ChromeLaunchOptions};

use super::{BrowserFactory, BrowserHandle, LaunchOptions, LaunchProfile};
use crate::config::{BrowserConfig, HeadlessMode};
use crate::error::{PrinteerError, Result};

/// A launched Chrome wrapped for the engine.
///
/// The `Browser` sits behind a `Mutex<Option<..>>` so a graceful close can
/// take it out and drop it (dropping a `headless_chrome::Browser`
/// terminates the child process) while later probe calls observe a closed
/// handle instead of panicking.
pub struct ChromeHandle {
    browser: Mutex<Option<Browser>>,
    process_id: Option<u32>,
}

impl ChromeHandle {
    fn new(browser: Browser) -> Self {
        let process_id = browser.get_process_id();
        Self {
            browser: Mutex::new(Some(browser)),
            process_id,
        }
    }

    /// Access the underlying browser, if it has not been closed.
    ///
    /// Renderer adapters downcast to `ChromeHandle` and drive tabs through
    /// this.
    pub fn with_browser<T>(&self, f: impl FnOnce(&Browser) -> T) -> Option<T> {
        self.browser.lock().unwrap().as_ref().map(f)
    }
}

impl std::fmt::Debug for ChromeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeHandle")
            .field("process_id", &self.process_id)
            .field("closed", &self.browser.lock().unwrap().is_none())
            .finish()
    }
}

impl BrowserHandle for ChromeHandle {
    fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for Chrome/Chromium browsers.
pub struct ChromeBrowserFactory {
    executable_path: Option<std::path::PathBuf>,
    headless: HeadlessMode,
    launch_timeout: Duration,
    base_args: Vec<String>,
}

impl ChromeBrowserFactory {
    /// Factory configured from the effective browser config.
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            executable_path: config.executable_path.clone(),
            headless: config.headless,
            launch_timeout: config.timeout,
            base_args: config.args.clone(),
        }
    }

    /// Factory with auto-detection and conservative defaults.
    pub fn with_defaults() -> Self {
        Self {
            executable_path: None,
            headless: HeadlessMode::Auto,
            launch_timeout: Duration::from_secs(30),
            base_args: Vec::new(),
        }
    }

    /// Resolve the `auto` headless preference for this host.
    fn resolve_headless(&self) -> bool {
        match self.headless {
            HeadlessMode::True => true,
            HeadlessMode::False => false,
            HeadlessMode::Auto => !display_server_present(),
        }
    }

    fn options(&self, profile: LaunchProfile, extra_args: &[&str]) -> LaunchOptions {
        let mut args = match profile {
            // Optimal carries the configured args; conservative rungs
            // deliberately drop them in case one of them is the problem.
            LaunchProfile::Optimal => self.base_args.clone(),
            _ => Vec::new(),
        };
        args.extend(extra_args.iter().map(|s| s.to_string()));
        LaunchOptions {
            profile,
            headless: match profile {
                LaunchProfile::Optimal | LaunchProfile::Standard => self.resolve_headless(),
                // The conservative rungs exist for hosts without a display.
                _ => true,
            },
            executable_path: self.executable_path.clone(),
            args,
            launch_timeout: self.launch_timeout,
            sandbox: !matches!(
                profile,
                LaunchProfile::ContainerOptimized | LaunchProfile::HeadlessServer
            ),
        }
    }
}

/// Whether a display server is discoverable on this host.
fn display_server_present() -> bool {
    if cfg!(unix) {
        std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
    } else {
        // No portable probe off Unix; treat `auto` as headless.
        false
    }
}

fn expect_chrome(handle: &dyn BrowserHandle) -> Option<&ChromeHandle> {
    let chrome = handle.as_any().downcast_ref::<ChromeHandle>();
    if chrome.is_none() {
        log::error!("ChromeBrowserFactory given a foreign handle: {handle:?}");
    }
    chrome
}

impl BrowserFactory for ChromeBrowserFactory {
    fn create(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserHandle>> {
        log::debug!(
            "Launching Chrome ({} profile, headless={})",
            options.profile,
            options.headless
        );

        let arg_refs: Vec<&OsStr> = options.args.iter().map(OsStr::new).collect();
        let chrome_options = ChromeLaunchOptions::default_builder()
            .headless(options.headless)
            .sandbox(options.sandbox)
            .path(options.executable_path.clone())
            .args(arg_refs)
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| PrinteerError::CreationFailed {
                tried: vec![options.profile.name().to_string()],
                last_error: e.to_string(),
            })?;

        let browser = Browser::new(chrome_options).map_err(|e| PrinteerError::CreationFailed {
            tried: vec![options.profile.name().to_string()],
            last_error: e.to_string(),
        })?;

        let handle = ChromeHandle::new(browser);
        log::info!(
            "Chrome launched ({} profile, pid {:?})",
            options.profile,
            handle.process_id
        );
        Ok(Box::new(handle))
    }

    fn validate(&self, handle: &dyn BrowserHandle) -> bool {
        let Some(chrome) = expect_chrome(handle) else {
            return false;
        };
        chrome
            .with_browser(|browser| {
                let tab = match browser.new_tab() {
                    Ok(tab) => tab,
                    Err(e) => {
                        log::debug!("Probe failed at new_tab: {e}");
                        return false;
                    }
                };
                let ok = tab
                    .navigate_to("data:text/html,<html><body>probe</body></html>")
                    .is_ok();
                if !ok {
                    log::debug!("Probe failed at navigation");
                }
                let _ = tab.close(true);
                ok
            })
            .unwrap_or(false)
    }

    fn close(&self, handle: &dyn BrowserHandle) -> Result<()> {
        let Some(chrome) = expect_chrome(handle) else {
            return Err(PrinteerError::CleanupFailed("foreign handle".to_string()));
        };
        // Dropping the Browser sends the close and reaps the child.
        let browser = chrome.browser.lock().unwrap().take();
        match browser {
            Some(browser) => {
                drop(browser);
                log::debug!("Chrome pid {:?} closed gracefully", chrome.process_id);
                Ok(())
            }
            None => Ok(()), // already closed
        }
    }

    fn kill_process(&self, handle: &dyn BrowserHandle) -> Result<()> {
        // Drop the Browser first so its own teardown does not race ours.
        if let Some(chrome) = expect_chrome(handle) {
            drop(chrome.browser.lock().unwrap().take());
        }

        let Some(pid) = handle.process_id() else {
            return Ok(());
        };

        #[cfg(unix)]
        {
            let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
            if result == 0 {
                log::warn!("Force-killed Chrome pid {pid}");
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            log::warn!("No force-kill available for pid {pid} on this platform");
            Ok(())
        }
    }

    fn process_alive(&self, handle: &dyn BrowserHandle) -> bool {
        let Some(pid) = handle.process_id() else {
            // Without a pid, the dropped Browser is the best evidence.
            return expect_chrome(handle)
                .map(|c| c.browser.lock().unwrap().is_some())
                .unwrap_or(false);
        };

        #[cfg(unix)]
        {
            // Signal 0 probes existence without touching the process.
            unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
        }
        #[cfg(not(unix))]
        {
            expect_chrome(handle)
                .map(|c| c.browser.lock().unwrap().is_some())
                .unwrap_or(false)
        }
    }

    fn version(&self, handle: &dyn BrowserHandle) -> Result<String> {
        let Some(chrome) = expect_chrome(handle) else {
            return Err(PrinteerError::RendererFailed("foreign handle".to_string()));
        };
        chrome
            .with_browser(|browser| {
                browser
                    .get_version()
                    .map(|info| info.product)
                    .map_err(|e| PrinteerError::RendererFailed(e.to_string()))
            })
            .unwrap_or_else(|| Err(PrinteerError::ShuttingDown))
    }

    fn optimal_launch_options(&self) -> LaunchOptions {
        self.options(LaunchProfile::Optimal, &[])
    }

    fn fallback_launch_options(&self) -> Vec<LaunchOptions> {
        vec![
            self.options(LaunchProfile::Standard, &[]),
            self.options(LaunchProfile::Minimal, &["--no-first-run"]),
            self.options(
                LaunchProfile::ContainerOptimized,
                &["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"],
            ),
            self.options(
                LaunchProfile::HeadlessServer,
                &[
                    "--no-sandbox",
                    "--disable-dev-shm-usage",
                    "--disable-gpu",
                    "--disable-software-rasterizer",
                    "--hide-scrollbars",
                    "--mute-audio",
                ],
            ),
        ]
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
