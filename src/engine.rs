//! Conversion orchestration.
//!
//! [`Printeer`] is the engine's public entry point. It owns the wired
//! subsystem graph — configuration resolver, resource monitor, cleanup
//! manager, limit enforcer, browser pool — and exposes the small surface
//! everything else goes through:
//!
//! - [`convert`](Printeer::convert): one URL to one output file.
//! - [`run_batch`](Printeer::run_batch): a job set through the scheduler.
//! - Introspection: [`pool_status`](Printeer::pool_status),
//!   [`diagnostics`](Printeer::diagnostics),
//!   [`emergency_cleanup`](Printeer::emergency_cleanup).
//!
//! # Conversion algorithm
//!
//! 1. Validate the URL (including the security domain lists) and the
//!    output path; the extension picks the media type.
//! 2. Deep-merge per-call overrides onto the active render config.
//! 3. Select oneshot vs pooled execution.
//! 4. Acquire a browser: oneshot creates directly through the factory's
//!    launch ladder without registering with the pool; pooled borrows.
//!    A failed *pooled acquisition* transparently retries once oneshot.
//! 5. Invoke the renderer adapter off the scheduler under the
//!    `render.wait.timeout` deadline.
//! 6. Cleanup is unconditional: pooled instances are released (release
//!    never throws to the caller), oneshot browsers are destroyed with
//!    graceful close, force-kill and process-gone verification.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use url::Url;

use crate::batch::{BatchJob, BatchOptions, BatchReport, BatchScheduler};
use crate::cleanup::CleanupManager;
use crate::config::{
    CliOverrides, ConfigResolver, EffectiveConfig, Mode, RenderConfig, RenderOverlay,
};
use crate::config::resolver::ConfigEvent;
use crate::error::{PrinteerError, Result};
use crate::factory::{BrowserFactory, BrowserHandle, ChromeBrowserFactory};
use crate::limits::{DegradationSnapshot, EnforcementAction, LimitEnforcer};
use crate::monitor::{Pressure, ResourceMonitor, ResourceSample};
use crate::optimizer::PoolOptimizer;
use crate::pool::{launcher, registry, BrowserPool};
use crate::renderer::{MediaType, OutputDescriptor, Renderer};
use crate::stats::PoolStatus;
use crate::strategy::{select_strategy, HostSignals, InvocationSignals, Strategy};

/// Default resource sampling interval.
const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Pause inserted before admission while throttling degradation is on.
const THROTTLE_BEAT: Duration = Duration::from_millis(250);

/// Bound on the graceful stage of oneshot destruction.
const ONESHOT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

struct EngineInner {
    resolver: ConfigResolver,
    monitor: ResourceMonitor,
    cleanup: CleanupManager,
    enforcer: LimitEnforcer,
    optimizer: PoolOptimizer,
    pool: BrowserPool,
    factory: Arc<dyn BrowserFactory>,
    renderer: Arc<dyn Renderer>,
    draining: std::sync::atomic::AtomicBool,
}

/// Point-in-time view over every subsystem, for doctor-style tooling.
#[derive(Debug)]
pub struct EngineDiagnostics {
    /// Pool shape and lifetime counters.
    pub pool: PoolStatus,
    /// Latest resource sample.
    pub sample: ResourceSample,
    /// Pressure of that sample.
    pub pressure: Pressure,
    /// Current degradation flags.
    pub degradation: DegradationSnapshot,
}

/// Decrements the request counter on every exit path.
struct RequestGuard<'a>(&'a ResourceMonitor);

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.0.dec_requests();
    }
}

/// A browser obtained for one conversion, under either strategy.
enum AcquiredBrowser {
    Pooled(crate::pool::PooledBrowser),
    Oneshot(Arc<dyn BrowserHandle>),
}

impl AcquiredBrowser {
    fn browser_arc(&self) -> Arc<dyn BrowserHandle> {
        match self {
            AcquiredBrowser::Pooled(pooled) => pooled.browser_arc(),
            AcquiredBrowser::Oneshot(handle) => Arc::clone(handle),
        }
    }
}

impl EngineInner {
    fn active_config(&self) -> Arc<EffectiveConfig> {
        self.resolver.current()
    }

    /// URL validation: parse, then the security allow/deny lists.
    fn validate_url(&self, raw: &str, config: &EffectiveConfig) -> Result<Url> {
        let url = Url::parse(raw)
            .map_err(|e| PrinteerError::NavigationFailed(format!("invalid URL {raw:?}: {e}")))?;

        if let Some(host) = url.host_str() {
            let blocked = config
                .security
                .blocked_domains
                .iter()
                .any(|pattern| domain_matches(host, pattern));
            if blocked {
                return Err(PrinteerError::NavigationFailed(format!(
                    "domain {host:?} is blocked by security.blocked_domains"
                )));
            }
            if !config.security.allowed_domains.is_empty() {
                let allowed = config
                    .security
                    .allowed_domains
                    .iter()
                    .any(|pattern| domain_matches(host, pattern));
                if !allowed {
                    return Err(PrinteerError::NavigationFailed(format!(
                        "domain {host:?} is not in security.allowed_domains"
                    )));
                }
            }
        }
        Ok(url)
    }

    /// Output validation: extension maps to a media type, the file name
    /// is non-empty, and the parent directory exists (created on demand).
    fn validate_output(&self, output: &Path) -> Result<(PathBuf, MediaType)> {
        if output.file_stem().map(|s| s.is_empty()).unwrap_or(true) {
            return Err(PrinteerError::BadOutputPath(format!(
                "{} has no file name",
                output.display()
            )));
        }
        let extension = output
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                PrinteerError::BadOutputPath(format!(
                    "{} has no file extension",
                    output.display()
                ))
            })?;
        let media_type = MediaType::from_extension(extension).ok_or_else(|| {
            PrinteerError::BadOutputPath(format!("unsupported extension {extension:?}"))
        })?;

        let normalized = if output.is_absolute() {
            output.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| PrinteerError::BadOutputPath(e.to_string()))?
                .join(output)
        };
        if let Some(parent) = normalized.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PrinteerError::BadOutputPath(format!(
                    "cannot create parent of {}: {e}",
                    normalized.display()
                ))
            })?;
        }
        Ok((normalized, media_type))
    }

    /// The conversion pipeline shared by `convert` and batch dispatch.
    ///
    /// `counted` is false when the batch scheduler already accounted for
    /// this request in the monitor.
    async fn convert_inner(
        &self,
        raw_url: &str,
        output: &Path,
        overrides: Option<&RenderOverlay>,
        invocation: InvocationSignals,
        counted: bool,
    ) -> Result<OutputDescriptor> {
        if self.draining.load(std::sync::atomic::Ordering::Acquire) {
            return Err(PrinteerError::ShuttingDown);
        }
        let config = self.active_config();
        let url = self.validate_url(raw_url, &config)?;
        let (output, media_type) = self.validate_output(output)?;

        let mut params: RenderConfig = config.render.clone();
        if let Some(overrides) = overrides {
            overrides.apply_to(&mut params);
        }
        let deadline = params.wait.timeout;

        // Throttling degradation slows admission rather than refusing it.
        if self.enforcer.degradation().throttling {
            tokio::time::sleep(THROTTLE_BEAT).await;
        }

        let _guard = if counted {
            self.monitor.inc_requests();
            Some(RequestGuard(&self.monitor))
        } else {
            None
        };

        let strategy = select_strategy(config.environment, &invocation, &HostSignals::from_env());
        log::debug!("Converting {url} -> {} ({strategy:?})", output.display());

        let acquired = self.acquire(strategy).await?;

        let render_result = self
            .render_bounded(&acquired, &url, &params, &output, media_type, deadline)
            .await;

        // Unconditional cleanup, success or not.
        match acquired {
            AcquiredBrowser::Pooled(pooled) => pooled.release().await,
            AcquiredBrowser::Oneshot(handle) => {
                destroy_oneshot(Arc::clone(&self.factory), handle).await;
            }
        }

        let descriptor = render_result?;
        if let Some(bytes) = descriptor.bytes {
            if bytes > config.security.max_file_size {
                let _ = std::fs::remove_file(&descriptor.path);
                return Err(PrinteerError::RendererFailed(format!(
                    "output of {bytes} bytes exceeds security.max_file_size ({})",
                    config.security.max_file_size
                )));
            }
        }
        log::info!(
            "Converted {url} -> {} ({} bytes)",
            descriptor.path.display(),
            descriptor.bytes.unwrap_or(0)
        );
        Ok(descriptor)
    }

    /// Acquire under the chosen strategy, with the pool-to-oneshot
    /// acquisition fallback.
    async fn acquire(&self, strategy: Strategy) -> Result<AcquiredBrowser> {
        match strategy {
            Strategy::Pool => match self.pool.get_browser().await {
                Ok(pooled) => Ok(AcquiredBrowser::Pooled(pooled)),
                Err(acquire_error) => {
                    log::warn!(
                        "Pooled acquisition failed ({acquire_error}); falling back to oneshot"
                    );
                    let handle = launcher::create_validated(Arc::clone(&self.factory)).await?;
                    Ok(AcquiredBrowser::Oneshot(Arc::from(handle)))
                }
            },
            Strategy::Oneshot => {
                let handle = launcher::create_validated(Arc::clone(&self.factory)).await?;
                Ok(AcquiredBrowser::Oneshot(Arc::from(handle)))
            }
        }
    }

    /// Renderer invocation off the scheduler, bounded by `deadline`.
    async fn render_bounded(
        &self,
        acquired: &AcquiredBrowser,
        url: &Url,
        params: &RenderConfig,
        output: &Path,
        media_type: MediaType,
        deadline: Duration,
    ) -> Result<OutputDescriptor> {
        let renderer = Arc::clone(&self.renderer);
        let browser = acquired.browser_arc();
        let url = url.clone();
        let params = params.clone();
        let output = output.to_path_buf();

        let task = tokio::task::spawn_blocking(move || {
            renderer.render(browser.as_ref(), &url, &params, &output, media_type, deadline)
        });

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PrinteerError::RendererFailed(format!(
                "renderer panicked: {join_error}"
            ))),
            Err(_) => Err(PrinteerError::Timeout { elapsed: deadline }),
        }
    }
}

/// Aggressively destroy a oneshot browser: graceful close bounded at
/// 10 s, then force-kill and verify. Failures are logged, never raised —
/// conversion results must not depend on teardown.
async fn destroy_oneshot(factory: Arc<dyn BrowserFactory>, handle: Arc<dyn BrowserHandle>) {
    let close = tokio::task::spawn_blocking({
        let factory = Arc::clone(&factory);
        let handle = Arc::clone(&handle);
        move || factory.close(handle.as_ref())
    });
    match tokio::time::timeout(ONESHOT_CLOSE_TIMEOUT, close).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => log::warn!("Oneshot browser close failed: {e}"),
        Ok(Err(_)) => log::error!("Oneshot close task panicked"),
        Err(_) => log::warn!("Oneshot browser close exceeded {ONESHOT_CLOSE_TIMEOUT:?}"),
    }

    for _ in 0..3 {
        let alive = {
            let factory = Arc::clone(&factory);
            let handle = Arc::clone(&handle);
            tokio::task::spawn_blocking(move || factory.process_alive(handle.as_ref()))
                .await
                .unwrap_or(true)
        };
        if !alive {
            return;
        }
        let kill = {
            let factory = Arc::clone(&factory);
            let handle = Arc::clone(&handle);
            tokio::task::spawn_blocking(move || factory.kill_process(handle.as_ref()))
        };
        if let Ok(Err(e)) = kill.await {
            log::error!("Oneshot force-kill failed: {e}");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    log::error!(
        "Could not verify termination of oneshot browser (pid {:?})",
        handle.process_id()
    );
}

/// Wildcard-aware host matching against a domain pattern.
fn domain_matches(host: &str, pattern: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        host == suffix || host.ends_with(&format!(".{suffix}"))
    } else {
        host.eq_ignore_ascii_case(pattern)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds a wired [`Printeer`] engine.
///
/// The renderer adapter is mandatory; the browser factory defaults to
/// [`ChromeBrowserFactory`] configured from the effective config.
pub struct PrinteerBuilder {
    base_dir: Option<PathBuf>,
    cli: Option<CliOverrides>,
    factory: Option<Arc<dyn BrowserFactory>>,
    renderer: Option<Arc<dyn Renderer>>,
    monitor_interval: Duration,
    start_monitor: bool,
    watch_config: bool,
}

impl PrinteerBuilder {
    fn new() -> Self {
        Self {
            base_dir: None,
            cli: None,
            factory: None,
            renderer: None,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            start_monitor: true,
            watch_config: false,
        }
    }

    /// Directory searched for project config files (defaults to the
    /// current directory).
    pub fn base_dir(mut self, dir: PathBuf) -> Self {
        self.base_dir = Some(dir);
        self
    }

    /// CLI overrides applied as the highest-precedence config layer.
    pub fn cli_overrides(mut self, cli: CliOverrides) -> Self {
        self.cli = Some(cli);
        self
    }

    /// Browser factory; defaults to Chrome via `headless_chrome`.
    pub fn factory(mut self, factory: Arc<dyn BrowserFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Renderer adapter (required).
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Resource sampling interval.
    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Disable the sampling loop (tests drive the monitor by injection).
    pub fn disable_monitoring(mut self) -> Self {
        self.start_monitor = false;
        self
    }

    /// Watch config files and hot-reload them.
    pub fn watch_config(mut self) -> Self {
        self.watch_config = true;
        self
    }

    /// Resolve configuration and wire every subsystem.
    ///
    /// # Errors
    ///
    /// Configuration schema/validation failures, a missing renderer, or a
    /// failing config watcher installation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context (the pool
    /// captures the runtime handle).
    pub fn build(self) -> Result<Printeer> {
        let renderer = self
            .renderer
            .ok_or_else(|| PrinteerError::Validation("no renderer adapter provided".to_string()))?;

        let base_dir = match self.base_dir {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(|e| PrinteerError::ConfigIo {
                    path: PathBuf::from("."),
                    message: e.to_string(),
                })?,
        };

        let resolver = ConfigResolver::new(base_dir);
        let config = resolver.load(self.cli)?;

        let monitor = ResourceMonitor::new(config.thresholds);
        let cleanup = CleanupManager::new();
        let enforcer = LimitEnforcer::with_host_memory(config.resources.clone());
        let optimizer = PoolOptimizer::from_config(&config);

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(ChromeBrowserFactory::from_config(&config.browser)));

        let pool = BrowserPool::new(&config, Arc::clone(&factory), Some(monitor.clone()));
        pool.initialize();

        let inner = Arc::new(EngineInner {
            resolver,
            monitor,
            cleanup,
            enforcer,
            optimizer,
            pool,
            factory,
            renderer,
            draining: std::sync::atomic::AtomicBool::new(false),
        });

        // Enforcement wiring: every tick flows sample + pressure through
        // the limit enforcer, and its actions fan out to the subsystems.
        // Weak, so the subscription never keeps a dropped engine alive.
        let weak: Weak<EngineInner> = Arc::downgrade(&inner);
        inner.monitor.on_pressure(move |pressure, sample| {
            let Some(engine) = weak.upgrade() else { return };
            for action in engine.enforcer.enforce(sample, pressure) {
                match action {
                    EnforcementAction::RequestMemoryReclaim => engine.cleanup.cleanup_memory(),
                    EnforcementAction::ShrinkPool => engine.pool.request_shrink(),
                    // The flag alone is the action; admission reads it.
                    EnforcementAction::Throttle => {}
                    EnforcementAction::CleanupTempFiles => {
                        engine.cleanup.cleanup_temp_files();
                    }
                }
            }
        });

        if self.start_monitor {
            inner.monitor.start(self.monitor_interval);
        }
        if self.watch_config {
            inner.resolver.watch()?;
        }

        log::info!(
            "Printeer engine ready ({:?} environment, {:?} mode)",
            config.environment,
            config.mode
        );
        Ok(Printeer { inner })
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The conversion engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use printeer::Printeer;
///
/// # async fn example(renderer: Arc<dyn printeer::renderer::Renderer>) -> printeer::Result<()> {
/// let engine = Printeer::builder().renderer(renderer).build()?;
/// let output = engine
///     .convert("http://localhost:4000/static/simple", "/tmp/out.pdf", None)
///     .await?;
/// println!("wrote {}", output.path.display());
/// engine.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Printeer {
    inner: Arc<EngineInner>,
}

impl Printeer {
    /// Start building an engine.
    pub fn builder() -> PrinteerBuilder {
        PrinteerBuilder::new()
    }

    /// Convert one URL into the file at `output`.
    ///
    /// `overrides` deep-merge onto the active render configuration for
    /// this call only.
    pub async fn convert(
        &self,
        url: &str,
        output: impl AsRef<Path>,
        overrides: Option<RenderOverlay>,
    ) -> Result<OutputDescriptor> {
        let invocation = match self.inner.active_config().mode {
            Mode::SingleShot => InvocationSignals::single_shot(),
            Mode::LongRunning => InvocationSignals::server(),
        };
        self.inner
            .convert_inner(url, output.as_ref(), overrides.as_ref(), invocation, true)
            .await
    }

    /// Run a batch of jobs through the scheduler, dispatching each one
    /// through the conversion pipeline.
    pub async fn run_batch(
        &self,
        jobs: Vec<BatchJob>,
        options: BatchOptions,
    ) -> Result<BatchReport> {
        let scheduler = self.batch_scheduler(options.clone());
        let report = self.run_batch_on(&scheduler, jobs, options).await?;
        Ok(report)
    }

    /// Run a batch on a scheduler obtained from
    /// [`batch_scheduler`](Self::batch_scheduler), which is how callers
    /// keep a [`BatchCancellation`](crate::batch::BatchCancellation)
    /// handle for the run.
    pub async fn run_batch_on(
        &self,
        scheduler: &BatchScheduler,
        jobs: Vec<BatchJob>,
        options: BatchOptions,
    ) -> Result<BatchReport> {
        let job_count = jobs.len();
        let inner = Arc::clone(&self.inner);
        let output_dir = options.output_dir.clone();

        let report = scheduler
            .run(jobs, move |job: BatchJob| {
                let inner = Arc::clone(&inner);
                let output_dir = output_dir.clone();
                async move {
                    let output = match &output_dir {
                        Some(dir) if !Path::new(&job.output).is_absolute() => {
                            dir.join(&job.output)
                        }
                        _ => PathBuf::from(&job.output),
                    };
                    inner
                        .convert_inner(
                            &job.url,
                            &output,
                            job.config.as_ref(),
                            InvocationSignals::batch(job_count),
                            // The scheduler already counted this request.
                            false,
                        )
                        .await
                }
            })
            .await?;

        if options.cleanup {
            self.inner.cleanup.cleanup_temp_files();
        }
        Ok(report)
    }

    /// A scheduler bound to this engine's monitor, optimizer and pool
    /// metrics.
    pub fn batch_scheduler(&self, options: BatchOptions) -> BatchScheduler {
        let pool_inner = Arc::clone(&self.inner);
        BatchScheduler::new(
            options,
            self.inner.monitor.clone(),
            self.inner.optimizer,
        )
        .with_pool_metrics(Arc::new(move || pool_inner.pool.status().metrics))
    }

    /// The active effective configuration.
    pub fn config(&self) -> Arc<EffectiveConfig> {
        self.inner.active_config()
    }

    /// Re-resolve configuration now; see
    /// [`ConfigResolver::reload`](crate::config::resolver::ConfigResolver::reload).
    pub fn reload_config(&self) -> Result<Arc<EffectiveConfig>> {
        self.inner.resolver.reload()
    }

    /// Subscribe to configuration reload outcomes.
    pub fn on_config_change<F>(&self, callback: F)
    where
        F: Fn(&ConfigEvent) + Send + Sync + 'static,
    {
        self.inner.resolver.on_change(callback);
    }

    /// Pool shape and lifetime counters.
    pub fn pool_status(&self) -> PoolStatus {
        self.inner.pool.status()
    }

    /// The resource monitor (for introspection and test injection).
    pub fn monitor(&self) -> &ResourceMonitor {
        &self.inner.monitor
    }

    /// The cleanup manager.
    pub fn cleanup(&self) -> &CleanupManager {
        &self.inner.cleanup
    }

    /// Current degradation flags.
    pub fn degradation(&self) -> DegradationSnapshot {
        self.inner.enforcer.degradation()
    }

    /// Clear the degradation flags.
    pub fn reset_degradation(&self) {
        self.inner.enforcer.reset_degradation();
    }

    /// Cross-subsystem snapshot for doctor-style diagnostics.
    pub fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            pool: self.inner.pool.status(),
            sample: self.inner.monitor.latest(),
            pressure: self.inner.monitor.pressure(),
            degradation: self.inner.enforcer.degradation(),
        }
    }

    /// Destroy every pooled browser via the global registry.
    pub async fn emergency_cleanup(&self) {
        registry::emergency_cleanup().await;
    }

    /// Install SIGINT/SIGTERM handlers that trigger emergency cleanup.
    pub fn install_signal_handlers(&self) {
        registry::install_signal_handlers();
    }

    /// Orderly shutdown: refuse new conversions, drain the pool, stop
    /// the monitor, scheduled cleanup and the config watcher. Idempotent.
    pub async fn shutdown(&self) {
        if self
            .inner
            .draining
            .swap(true, std::sync::atomic::Ordering::AcqRel)
        {
            log::debug!("Engine shutdown already in progress");
            return;
        }
        log::info!("Shutting down Printeer engine");
        self.inner.pool.shutdown().await;
        self.inner.monitor.stop();
        self.inner.cleanup.stop_scheduled();
        self.inner.resolver.unwatch();
        log::info!("Printeer engine shut down");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::MockBrowserFactory;
    use crate::renderer::mock::MockRenderer;

    fn engine_with(
        factory: MockBrowserFactory,
        renderer: MockRenderer,
    ) -> (
        Printeer,
        Arc<MockBrowserFactory>,
        Arc<MockRenderer>,
        tempfile::TempDir,
    ) {
        let factory = Arc::new(factory);
        let renderer = Arc::new(renderer);
        let dir = tempfile::tempdir().unwrap();
        // Pin the environment so host markers cannot change the profile.
        std::fs::write(
            dir.path().join(".printeerrc.json"),
            r#"{ "environment": "test" }"#,
        )
        .unwrap();
        // Building registers the pool in the global emergency slot;
        // serialize with the registry's own test.
        let engine = {
            let _serial = crate::pool::registry::TEST_SERIAL
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            Printeer::builder()
                .base_dir(dir.path().to_path_buf())
                .factory(Arc::clone(&factory) as Arc<dyn BrowserFactory>)
                .renderer(Arc::clone(&renderer) as Arc<dyn Renderer>)
                .disable_monitoring()
                .build()
                .unwrap()
        };
        (engine, factory, renderer, dir)
    }

    /// Verifies the builder rejects a missing renderer.
    #[tokio::test]
    async fn test_builder_requires_renderer() {
        let result = Printeer::builder().build();
        assert!(matches!(result, Err(PrinteerError::Validation(_))));
    }

    /// Verifies output validation: unsupported or missing extensions are
    /// `BadOutputPath` and nothing touches a browser.
    #[tokio::test]
    async fn test_bad_output_path() {
        let (engine, factory, _renderer, _dir) =
            engine_with(MockBrowserFactory::new(), MockRenderer::new());

        for bad in ["/tmp/out.docx", "/tmp/out", "/tmp/.pdf"] {
            let result = engine.convert("http://localhost/x", bad, None).await;
            assert!(
                matches!(result, Err(PrinteerError::BadOutputPath(_))),
                "{bad} should be rejected"
            );
        }
        assert_eq!(factory.creation_count(), 0);
        engine.shutdown().await;
    }

    /// Verifies URL validation covers parsing and the domain lists.
    #[tokio::test]
    async fn test_url_validation() {
        let (engine, factory, _renderer, _dir) =
            engine_with(MockBrowserFactory::new(), MockRenderer::new());

        let result = engine.convert("not a url", "/tmp/x.pdf", None).await;
        assert!(matches!(result, Err(PrinteerError::NavigationFailed(_))));
        assert_eq!(factory.creation_count(), 0);
        engine.shutdown().await;
    }

    /// Oneshot single conversion: output produced, no pooled browser
    /// remains, and the oneshot process is verified dead (end-to-end
    /// scenario 1 against mocks).
    #[tokio::test]
    async fn test_oneshot_conversion() {
        let (engine, factory, renderer, _dir) =
            engine_with(MockBrowserFactory::new(), MockRenderer::new());

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        // Test environment selects the oneshot strategy on its own.
        let descriptor = engine
            .convert("http://localhost:4000/static/simple", &output, None)
            .await
            .unwrap();

        assert_eq!(descriptor.media_type, MediaType::Pdf);
        assert!(output.exists());
        assert_eq!(renderer.call_count(), 1);

        // Oneshot: nothing registered with the pool, process gone.
        assert_eq!(engine.pool_status().total_browsers, 0);
        assert_eq!(engine.pool_status().metrics.created, 0);
        for state in factory.states() {
            assert!(!state.alive.load(std::sync::atomic::Ordering::SeqCst));
        }
        engine.shutdown().await;
    }

    /// Render overrides merge over the active config for one call: a
    /// 50 ms deadline override must cut off a 500 ms renderer.
    #[tokio::test]
    async fn test_overrides_apply() {
        let (engine, _factory, _renderer, dir) = engine_with(
            MockBrowserFactory::new(),
            MockRenderer::slow(Duration::from_millis(500)),
        );

        let overrides: RenderOverlay =
            serde_json::from_str(r#"{ "wait": { "timeout_ms": 50 } }"#).unwrap();

        let output = dir.path().join("slow.pdf");
        let result = engine
            .convert("http://localhost/x", &output, Some(overrides))
            .await;
        assert!(matches!(result, Err(PrinteerError::Timeout { .. })));

        engine.shutdown().await;
    }

    /// Batch runs dispatch through the conversion pipeline and report
    /// per-job results.
    #[tokio::test]
    async fn test_run_batch() {
        let (engine, _factory, renderer, _dir) =
            engine_with(MockBrowserFactory::new(), MockRenderer::new());

        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            BatchJob::new("a", "http://localhost/a", "a.pdf"),
            BatchJob::new("b", "http://localhost/b", "b.pdf").depends_on(["a"]),
        ];
        let options = BatchOptions {
            concurrency: 2,
            output_dir: Some(dir.path().to_path_buf()),
            ..BatchOptions::default()
        };
        let report = engine.run_batch(jobs, options).await.unwrap();

        assert_eq!(report.completed, 2);
        assert!(dir.path().join("a.pdf").exists());
        assert!(dir.path().join("b.pdf").exists());
        assert_eq!(renderer.call_count(), 2);
        // Batch-class invocations run pooled; insights reflect the churn.
        assert!(report.pool.is_some());
        assert!(report.pool.unwrap().created >= 1);
        engine.shutdown().await;
    }

    /// Diagnostics snapshot spans pool, monitor and degradation.
    #[tokio::test]
    async fn test_diagnostics() {
        let (engine, _factory, _renderer, _dir) =
            engine_with(MockBrowserFactory::new(), MockRenderer::new());

        let diagnostics = engine.diagnostics();
        assert_eq!(diagnostics.pool.total_browsers, 0);
        assert!(!diagnostics.pressure.overall);
        assert_eq!(diagnostics.degradation, DegradationSnapshot::default());
        engine.shutdown().await;
    }

    /// Wildcard domain matching used by the security lists.
    #[test]
    fn test_domain_matching() {
        assert!(domain_matches("example.com", "example.com"));
        assert!(domain_matches("EXAMPLE.com", "example.com"));
        assert!(domain_matches("a.example.com", "*.example.com"));
        assert!(domain_matches("example.com", "*.example.com"));
        assert!(!domain_matches("badexample.com", "*.example.com"));
        assert!(!domain_matches("example.org", "example.com"));
    }
}
