//! Layered configuration resolution and hot reload.
//!
//! [`ConfigResolver`] owns the configuration lifecycle:
//!
//! 1. [`load`](ConfigResolver::load) resolves defaults ← user file ←
//!    project file ← environment ← CLI into an immutable
//!    [`EffectiveConfig`] and publishes it behind an `Arc` swap.
//! 2. [`watch`](ConfigResolver::watch) installs a `notify` watcher over the
//!    discovered files; change bursts are debounced for 500 ms on a
//!    dedicated thread before triggering [`reload`](ConfigResolver::reload).
//! 3. Reloads are atomic: a config that fails validation is discarded, the
//!    previous one stays in force, and the failure is delivered to
//!    [`on_change`](ConfigResolver::on_change) subscribers.
//!
//! Validation failures are fatal on the initial load only. I/O failures on
//! individual source files are never fatal — the layer is skipped with a
//! warning.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use super::cli::CliOverrides;
use super::overlay::ConfigOverlay;
use super::{env as env_source, file as file_source};
use super::{EffectiveConfig, ValidationWarning};
use crate::error::{PrinteerError, Result};

/// Quiet period required before a file-change burst triggers a reload.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Outcome of a reload, delivered to subscribers.
#[derive(Debug)]
pub enum ConfigEvent {
    /// A new configuration was validated and published.
    Applied {
        /// The now-active configuration.
        config: Arc<EffectiveConfig>,
        /// Non-fatal findings from validation.
        warnings: Vec<ValidationWarning>,
    },
    /// The reload was rejected; the previous configuration stays active.
    Rejected {
        /// Why the candidate was refused.
        error: PrinteerError,
    },
}

type ChangeCallback = Box<dyn Fn(&ConfigEvent) + Send + Sync>;

struct WatchHandle {
    // Dropping the watcher closes the event channel, which ends the
    // debounce thread.
    _watcher: notify::RecommendedWatcher,
    thread: Option<JoinHandle<()>>,
}

struct ResolverInner {
    base_dir: PathBuf,
    current: RwLock<Arc<EffectiveConfig>>,
    cli: Mutex<Option<ConfigOverlay>>,
    subscribers: Mutex<Vec<ChangeCallback>>,
}

impl ResolverInner {
    fn notify_subscribers(&self, event: &ConfigEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for callback in subscribers.iter() {
            // One panicking subscriber must not take down the resolver.
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                log::error!("Config change subscriber panicked; continuing");
            }
        }
    }

    fn resolve(&self) -> Result<(EffectiveConfig, Vec<ValidationWarning>)> {
        let mut combined = ConfigOverlay::default();

        // File layers, lowest precedence first. A missing or unreadable
        // file skips its layer; a malformed file is a schema error.
        let mut file_layers = Vec::new();
        if let Some(user) = file_source::user_config_path() {
            file_layers.push(user);
        }
        if let Some(project) = file_source::project_config_path(&self.base_dir) {
            file_layers.push(project);
        }
        for path in file_layers {
            match file_source::load_file(&path) {
                Ok(overlay) => {
                    log::debug!("Loaded config layer from {}", path.display());
                    combined.merge(overlay);
                }
                Err(PrinteerError::ConfigIo { path, message }) => {
                    log::warn!("Skipping unreadable config file {}: {message}", path.display());
                }
                Err(other) => return Err(other),
            }
        }

        combined.merge(env_source::overlay_from_env());

        if let Some(cli) = self.cli.lock().unwrap().as_ref() {
            combined.merge(cli.clone());
        }

        // The environment decides which default profile the overlays land
        // on; an explicit `environment` in any layer overrides detection.
        let environment = combined
            .environment
            .unwrap_or_else(env_source::detect_environment);

        let mut config = EffectiveConfig::defaults(environment);
        combined.apply_to(&mut config);
        config.environment = environment;

        let warnings = config.validate()?;
        for warning in &warnings {
            log::warn!("Suspicious config value {}: {}", warning.field, warning.message);
        }
        Ok((config, warnings))
    }

    /// Re-resolve and publish; on failure keep the active config.
    fn reload(&self) -> Result<Arc<EffectiveConfig>> {
        match self.resolve() {
            Ok((config, warnings)) => {
                let config = Arc::new(config);
                *self.current.write().unwrap() = Arc::clone(&config);
                log::info!("Configuration reloaded ({:?})", config.environment);
                self.notify_subscribers(&ConfigEvent::Applied {
                    config: Arc::clone(&config),
                    warnings,
                });
                Ok(config)
            }
            Err(error) => {
                let rejected = PrinteerError::ReloadRejected(error.to_string());
                log::warn!("{rejected}");
                self.notify_subscribers(&ConfigEvent::Rejected {
                    error: PrinteerError::ReloadRejected(error.to_string()),
                });
                Err(rejected)
            }
        }
    }
}

/// Resolves and owns the effective configuration.
///
/// # Example
///
/// ```rust,no_run
/// use printeer::config::{CliOverrides, ConfigResolver};
///
/// let cli = CliOverrides::parse(["--pool-max", "4"]).unwrap();
/// let resolver = ConfigResolver::new(std::env::current_dir().unwrap());
/// let config = resolver.load(Some(cli)).unwrap();
/// assert_eq!(config.browser.pool.max, 4);
/// ```
pub struct ConfigResolver {
    inner: Arc<ResolverInner>,
    watch: Mutex<Option<WatchHandle>>,
}

impl ConfigResolver {
    /// Create a resolver rooted at `base_dir` (the directory searched for
    /// project config files).
    pub fn new(base_dir: PathBuf) -> Self {
        let placeholder = Arc::new(EffectiveConfig::defaults(
            env_source::detect_environment(),
        ));
        Self {
            inner: Arc::new(ResolverInner {
                base_dir,
                current: RwLock::new(placeholder),
                cli: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
            }),
            watch: Mutex::new(None),
        }
    }

    /// Resolve all layers and publish the result.
    ///
    /// CLI overrides are remembered and re-applied on every subsequent
    /// [`reload`](Self::reload).
    ///
    /// # Errors
    ///
    /// Fatal on schema or validation failure — an engine must not start on
    /// a broken configuration.
    pub fn load(&self, cli: Option<CliOverrides>) -> Result<Arc<EffectiveConfig>> {
        *self.inner.cli.lock().unwrap() = cli.map(CliOverrides::into_overlay);
        let (config, _warnings) = self.inner.resolve()?;
        let config = Arc::new(config);
        *self.inner.current.write().unwrap() = Arc::clone(&config);
        log::info!(
            "Configuration loaded: environment={:?}, pool={}..{}",
            config.environment,
            config.browser.pool.min,
            config.browser.pool.max
        );
        Ok(config)
    }

    /// The active configuration.
    ///
    /// Cheap (an `Arc` clone); safe to call from any thread.
    pub fn current(&self) -> Arc<EffectiveConfig> {
        Arc::clone(&self.inner.current.read().unwrap())
    }

    /// Re-resolve all layers now.
    ///
    /// On validation failure the previous configuration remains active,
    /// subscribers receive [`ConfigEvent::Rejected`], and the error is
    /// returned for the caller's benefit.
    pub fn reload(&self) -> Result<Arc<EffectiveConfig>> {
        self.inner.reload()
    }

    /// Subscribe to reload outcomes.
    ///
    /// Callbacks run synchronously on the thread performing the reload;
    /// panics inside a callback are caught and logged.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&ConfigEvent) + Send + Sync + 'static,
    {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push(Box::new(callback));
    }

    /// Watch the discovered config files and reload on change.
    ///
    /// Change events are debounced: a reload fires only after the files
    /// have been quiet for 500 ms. Calling `watch` while already watching
    /// is a no-op.
    pub fn watch(&self) -> Result<()> {
        let mut slot = self.watch.lock().unwrap();
        if slot.is_some() {
            log::debug!("Config watcher already installed");
            return Ok(());
        }

        let paths = file_source::discover(&self.inner.base_dir);
        if paths.is_empty() {
            log::debug!("No config files discovered; nothing to watch");
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<()>();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            match event {
                Ok(_) => {
                    let _ = tx.send(());
                }
                Err(e) => log::warn!("Config watcher error: {e}"),
            }
        })
        .map_err(|e| PrinteerError::ConfigIo {
            path: self.inner.base_dir.clone(),
            message: format!("failed to create watcher: {e}"),
        })?;

        for path in &paths {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|e| PrinteerError::ConfigIo {
                    path: path.clone(),
                    message: format!("failed to watch: {e}"),
                })?;
            log::debug!("Watching config file {}", path.display());
        }

        let inner = Arc::clone(&self.inner);
        let thread = std::thread::spawn(move || {
            // Wait for a first event, then absorb the burst until the
            // debounce window passes without further changes.
            while rx.recv().is_ok() {
                loop {
                    match rx.recv_timeout(DEBOUNCE_WINDOW) {
                        Ok(()) => continue,
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                // Outcome (applied or rejected) reaches subscribers; a
                // rejected reload keeps the previous config in force.
                let _ = inner.reload();
            }
        });

        *slot = Some(WatchHandle {
            _watcher: watcher,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Stop watching config files. Idempotent.
    pub fn unwatch(&self) {
        if let Some(mut handle) = self.watch.lock().unwrap().take() {
            // Dropping the watcher disconnects the channel; the debounce
            // thread exits on its own.
            if let Some(thread) = handle.thread.take() {
                drop(handle);
                let _ = thread.join();
            }
            log::debug!("Config watcher stopped");
        }
    }
}

impl Drop for ConfigResolver {
    fn drop(&mut self) {
        self.unwatch();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies a project file layer lands between defaults and CLI.
    #[test]
    fn test_layer_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".printeerrc.json"),
            r#"{ "environment": "development",
                 "browser": { "timeout_ms": 20000, "pool": { "max": 4 } } }"#,
        )
        .unwrap();

        let cli = CliOverrides::parse(["--pool-max", "6"]).unwrap();
        let resolver = ConfigResolver::new(dir.path().to_path_buf());
        let config = resolver.load(Some(cli)).unwrap();

        // File supplied the timeout, CLI won the pool ceiling.
        assert_eq!(config.browser.timeout, Duration::from_secs(20));
        assert_eq!(config.browser.pool.max, 6);
    }

    /// Verifies the initial load fails fatally on an invalid layered
    /// result.
    #[test]
    fn test_initial_load_fatal_on_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".printeerrc.json"),
            r#"{ "environment": "development",
                 "browser": { "pool": { "min": 9, "max": 2 } } }"#,
        )
        .unwrap();

        let resolver = ConfigResolver::new(dir.path().to_path_buf());
        assert!(matches!(
            resolver.load(None),
            Err(PrinteerError::Validation(_))
        ));
    }

    /// Verifies a rejected reload keeps the previous config and notifies
    /// subscribers.
    #[test]
    fn test_reload_rejection_keeps_previous() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".printeerrc.json");
        std::fs::write(
            &file,
            r#"{ "environment": "development", "browser": { "pool": { "max": 3 } } }"#,
        )
        .unwrap();

        let resolver = ConfigResolver::new(dir.path().to_path_buf());
        let config = resolver.load(None).unwrap();
        assert_eq!(config.browser.pool.max, 3);

        let rejections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&rejections);
        resolver.on_change(move |event| {
            if matches!(event, ConfigEvent::Rejected { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Break the file and reload explicitly.
        std::fs::write(
            &file,
            r#"{ "environment": "development", "browser": { "pool": { "min": 8, "max": 3 } } }"#,
        )
        .unwrap();
        assert!(matches!(
            resolver.reload(),
            Err(PrinteerError::ReloadRejected(_))
        ));

        assert_eq!(rejections.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.current().browser.pool.max, 3);
    }

    /// Verifies a successful reload swaps the published config and
    /// notifies subscribers with the new value.
    #[test]
    fn test_reload_applies_new_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".printeerrc.json");
        std::fs::write(
            &file,
            r#"{ "environment": "development", "browser": { "pool": { "max": 3 } } }"#,
        )
        .unwrap();

        let resolver = ConfigResolver::new(dir.path().to_path_buf());
        resolver.load(None).unwrap();

        std::fs::write(
            &file,
            r#"{ "environment": "development", "browser": { "pool": { "max": 5 } } }"#,
        )
        .unwrap();
        let reloaded = resolver.reload().unwrap();
        assert_eq!(reloaded.browser.pool.max, 5);
        assert_eq!(resolver.current().browser.pool.max, 5);
    }

    /// Verifies a panicking subscriber does not poison later reloads.
    #[test]
    fn test_subscriber_panic_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".printeerrc.json");
        std::fs::write(&file, r#"{ "environment": "development" }"#).unwrap();

        let resolver = ConfigResolver::new(dir.path().to_path_buf());
        resolver.load(None).unwrap();
        resolver.on_change(|_| panic!("misbehaving subscriber"));

        assert!(resolver.reload().is_ok());
    }

    /// Verifies watch/unwatch are idempotent.
    #[test]
    fn test_watch_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".printeerrc.json"),
            r#"{ "environment": "development" }"#,
        )
        .unwrap();

        let resolver = ConfigResolver::new(dir.path().to_path_buf());
        resolver.load(None).unwrap();
        resolver.watch().unwrap();
        resolver.watch().unwrap();
        resolver.unwatch();
        resolver.unwatch();
    }
}
