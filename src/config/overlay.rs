//! Partial configuration and typed deep merge.
//!
//! Every configuration source (file, environment, CLI) decodes into a
//! [`ConfigOverlay`]: a mirror of [`EffectiveConfig`](super::EffectiveConfig)
//! in which every field is optional. Overlays merge deterministically —
//! deep merge on records, whole-value replacement on scalars, arrays and
//! maps — and finally apply onto a fully-populated config.
//!
//! Unknown fields are rejected at decode time (`deny_unknown_fields`), so a
//! misspelled key in a config file is a schema error rather than silently
//! ignored.
//!
//! Durations appear here as `*_ms` integer fields, matching the
//! `PRINTEER_*_TIMEOUT` environment variables and the config file format.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::{
    BasicCredentials, Clip, CookieSpec, EffectiveConfig, Environment, HeadlessMode, ImageFormat,
    LogDestination, LogFormat, LogLevel, MediaEmulation, Mode, Orientation, PaperFormat,
    RenderConfig, ResourceClass, WaitUntil,
};

/// Replace `target` when the overlay supplies a value.
macro_rules! overlay_scalar {
    ($self:ident, $target:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$self.$field {
                $target.$field = value.clone();
            }
        )+
    };
}

/// A partial top-level configuration.
///
/// Produced by each source layer; merged in precedence order by the
/// resolver and then applied onto the environment defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    /// Overrides [`EffectiveConfig::mode`](super::EffectiveConfig::mode).
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Overrides the detected environment.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Browser record overrides.
    #[serde(default)]
    pub browser: Option<BrowserOverlay>,
    /// Resource limit overrides.
    #[serde(default)]
    pub resources: Option<ResourcesOverlay>,
    /// Threshold overrides.
    #[serde(default)]
    pub thresholds: Option<ThresholdsOverlay>,
    /// Logging overrides.
    #[serde(default)]
    pub logging: Option<LoggingOverlay>,
    /// Security overrides.
    #[serde(default)]
    pub security: Option<SecurityOverlay>,
    /// Render overrides.
    #[serde(default)]
    pub render: Option<RenderOverlay>,
}

impl ConfigOverlay {
    /// Merge `other` over `self` (`other` wins; records merge recursively).
    pub fn merge(&mut self, other: ConfigOverlay) {
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.environment.is_some() {
            self.environment = other.environment;
        }
        merge_option(&mut self.browser, other.browser, BrowserOverlay::merge);
        merge_option(&mut self.resources, other.resources, ResourcesOverlay::merge);
        merge_option(&mut self.thresholds, other.thresholds, ThresholdsOverlay::merge);
        merge_option(&mut self.logging, other.logging, LoggingOverlay::merge);
        merge_option(&mut self.security, other.security, SecurityOverlay::merge);
        merge_option(&mut self.render, other.render, RenderOverlay::merge);
    }

    /// Apply every supplied value onto `config`.
    pub fn apply_to(&self, config: &mut EffectiveConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(browser) = &self.browser {
            browser.apply_to(&mut config.browser);
        }
        if let Some(resources) = &self.resources {
            resources.apply_to(&mut config.resources);
        }
        if let Some(thresholds) = &self.thresholds {
            thresholds.apply_to(&mut config.thresholds);
        }
        if let Some(logging) = &self.logging {
            logging.apply_to(&mut config.logging);
        }
        if let Some(security) = &self.security {
            security.apply_to(&mut config.security);
        }
        if let Some(render) = &self.render {
            render.apply_to(&mut config.render);
        }
    }

    /// Whether the overlay supplies nothing at all.
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.environment.is_none()
            && self.browser.is_none()
            && self.resources.is_none()
            && self.thresholds.is_none()
            && self.logging.is_none()
            && self.security.is_none()
            && self.render.is_none()
    }

    /// Mutable access to the browser overlay, creating it on demand.
    pub(crate) fn browser_mut(&mut self) -> &mut BrowserOverlay {
        self.browser.get_or_insert_with(BrowserOverlay::default)
    }

    /// Mutable access to the resources overlay, creating it on demand.
    pub(crate) fn resources_mut(&mut self) -> &mut ResourcesOverlay {
        self.resources.get_or_insert_with(ResourcesOverlay::default)
    }

    /// Mutable access to the logging overlay, creating it on demand.
    pub(crate) fn logging_mut(&mut self) -> &mut LoggingOverlay {
        self.logging.get_or_insert_with(LoggingOverlay::default)
    }

    /// Mutable access to the security overlay, creating it on demand.
    pub(crate) fn security_mut(&mut self) -> &mut SecurityOverlay {
        self.security.get_or_insert_with(SecurityOverlay::default)
    }

    /// Mutable access to the thresholds overlay, creating it on demand.
    pub(crate) fn thresholds_mut(&mut self) -> &mut ThresholdsOverlay {
        self.thresholds.get_or_insert_with(ThresholdsOverlay::default)
    }

    /// Mutable access to the render overlay, creating it on demand.
    pub(crate) fn render_mut(&mut self) -> &mut RenderOverlay {
        self.render.get_or_insert_with(RenderOverlay::default)
    }
}

fn merge_option<T>(slot: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
    match (slot.as_mut(), other) {
        (Some(existing), Some(incoming)) => merge(existing, incoming),
        (None, Some(incoming)) => *slot = Some(incoming),
        _ => {}
    }
}

// ============================================================================
// Browser / pool
// ============================================================================

/// Partial [`BrowserConfig`](super::BrowserConfig).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserOverlay {
    /// Browser binary path.
    #[serde(default)]
    pub executable_path: Option<PathBuf>,
    /// Headless preference.
    #[serde(default)]
    pub headless: Option<HeadlessMode>,
    /// Launch timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Extra launch arguments (whole-value replacement).
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Pool record overrides.
    #[serde(default)]
    pub pool: Option<PoolOverlay>,
}

impl BrowserOverlay {
    fn merge(&mut self, other: BrowserOverlay) {
        if other.executable_path.is_some() {
            self.executable_path = other.executable_path;
        }
        if other.headless.is_some() {
            self.headless = other.headless;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.args.is_some() {
            self.args = other.args;
        }
        merge_option(&mut self.pool, other.pool, PoolOverlay::merge);
    }

    fn apply_to(&self, browser: &mut super::BrowserConfig) {
        if let Some(path) = &self.executable_path {
            browser.executable_path = Some(path.clone());
        }
        if let Some(headless) = self.headless {
            browser.headless = headless;
        }
        if let Some(ms) = self.timeout_ms {
            browser.timeout = Duration::from_millis(ms);
        }
        if let Some(args) = &self.args {
            browser.args = args.clone();
        }
        if let Some(pool) = &self.pool {
            pool.apply_to(&mut browser.pool);
        }
    }

    /// Mutable access to the pool overlay, creating it on demand.
    pub(crate) fn pool_mut(&mut self) -> &mut PoolOverlay {
        self.pool.get_or_insert_with(PoolOverlay::default)
    }
}

/// Partial [`PoolConfig`](super::PoolConfig).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolOverlay {
    /// Warm floor.
    #[serde(default)]
    pub min: Option<usize>,
    /// Hard ceiling.
    #[serde(default)]
    pub max: Option<usize>,
    /// Idle timeout in milliseconds.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    /// Maintenance interval in milliseconds.
    #[serde(default)]
    pub cleanup_interval_ms: Option<u64>,
}

impl PoolOverlay {
    fn merge(&mut self, other: PoolOverlay) {
        if other.min.is_some() {
            self.min = other.min;
        }
        if other.max.is_some() {
            self.max = other.max;
        }
        if other.idle_timeout_ms.is_some() {
            self.idle_timeout_ms = other.idle_timeout_ms;
        }
        if other.cleanup_interval_ms.is_some() {
            self.cleanup_interval_ms = other.cleanup_interval_ms;
        }
    }

    fn apply_to(&self, pool: &mut super::PoolConfig) {
        overlay_scalar!(self, pool, min, max);
        if let Some(ms) = self.idle_timeout_ms {
            pool.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.cleanup_interval_ms {
            pool.cleanup_interval = Duration::from_millis(ms);
        }
    }
}

// ============================================================================
// Resources / thresholds
// ============================================================================

/// Partial [`ResourceLimits`](super::ResourceLimits).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesOverlay {
    /// Memory ceiling in MB.
    #[serde(default)]
    pub max_memory_mb: Option<u64>,
    /// CPU ceiling in percent.
    #[serde(default)]
    pub max_cpu_percent: Option<f64>,
    /// Temp-area disk ceiling in MB.
    #[serde(default)]
    pub max_disk_mb: Option<u64>,
    /// Concurrent request ceiling.
    #[serde(default)]
    pub max_concurrent_requests: Option<usize>,
    /// Browser instance ceiling.
    #[serde(default)]
    pub max_browser_instances: Option<usize>,
}

impl ResourcesOverlay {
    fn merge(&mut self, other: ResourcesOverlay) {
        if other.max_memory_mb.is_some() {
            self.max_memory_mb = other.max_memory_mb;
        }
        if other.max_cpu_percent.is_some() {
            self.max_cpu_percent = other.max_cpu_percent;
        }
        if other.max_disk_mb.is_some() {
            self.max_disk_mb = other.max_disk_mb;
        }
        if other.max_concurrent_requests.is_some() {
            self.max_concurrent_requests = other.max_concurrent_requests;
        }
        if other.max_browser_instances.is_some() {
            self.max_browser_instances = other.max_browser_instances;
        }
    }

    fn apply_to(&self, resources: &mut super::ResourceLimits) {
        overlay_scalar!(
            self,
            resources,
            max_memory_mb,
            max_cpu_percent,
            max_disk_mb,
            max_concurrent_requests,
            max_browser_instances,
        );
    }
}

/// Partial [`AlertThresholds`](super::AlertThresholds).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsOverlay {
    /// Memory warning threshold.
    #[serde(default)]
    pub memory_warn: Option<f64>,
    /// Memory critical threshold.
    #[serde(default)]
    pub memory_critical: Option<f64>,
    /// CPU warning threshold.
    #[serde(default)]
    pub cpu_warn: Option<f64>,
    /// CPU critical threshold.
    #[serde(default)]
    pub cpu_critical: Option<f64>,
    /// Disk warning threshold.
    #[serde(default)]
    pub disk_warn: Option<f64>,
    /// Disk critical threshold.
    #[serde(default)]
    pub disk_critical: Option<f64>,
}

impl ThresholdsOverlay {
    fn merge(&mut self, other: ThresholdsOverlay) {
        if other.memory_warn.is_some() {
            self.memory_warn = other.memory_warn;
        }
        if other.memory_critical.is_some() {
            self.memory_critical = other.memory_critical;
        }
        if other.cpu_warn.is_some() {
            self.cpu_warn = other.cpu_warn;
        }
        if other.cpu_critical.is_some() {
            self.cpu_critical = other.cpu_critical;
        }
        if other.disk_warn.is_some() {
            self.disk_warn = other.disk_warn;
        }
        if other.disk_critical.is_some() {
            self.disk_critical = other.disk_critical;
        }
    }

    fn apply_to(&self, thresholds: &mut super::AlertThresholds) {
        overlay_scalar!(
            self,
            thresholds,
            memory_warn,
            memory_critical,
            cpu_warn,
            cpu_critical,
            disk_warn,
            disk_critical,
        );
    }
}

// ============================================================================
// Logging / security
// ============================================================================

/// Partial [`LoggingConfig`](super::LoggingConfig).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingOverlay {
    /// Minimum emitted level.
    #[serde(default)]
    pub level: Option<LogLevel>,
    /// Text or JSON.
    #[serde(default)]
    pub format: Option<LogFormat>,
    /// Output sink.
    #[serde(default)]
    pub destination: Option<LogDestination>,
}

impl LoggingOverlay {
    fn merge(&mut self, other: LoggingOverlay) {
        if other.level.is_some() {
            self.level = other.level;
        }
        if other.format.is_some() {
            self.format = other.format;
        }
        if other.destination.is_some() {
            self.destination = other.destination;
        }
    }

    fn apply_to(&self, logging: &mut super::LoggingConfig) {
        overlay_scalar!(self, logging, level, format, destination);
    }
}

/// Partial [`SecurityConfig`](super::SecurityConfig).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityOverlay {
    /// Allow-list patterns (whole-value replacement).
    #[serde(default)]
    pub allowed_domains: Option<Vec<String>>,
    /// Deny-list patterns (whole-value replacement).
    #[serde(default)]
    pub blocked_domains: Option<Vec<String>>,
    /// Output size ceiling in bytes.
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Sanitize untrusted input.
    #[serde(default)]
    pub sanitize_input: Option<bool>,
}

impl SecurityOverlay {
    fn merge(&mut self, other: SecurityOverlay) {
        if other.allowed_domains.is_some() {
            self.allowed_domains = other.allowed_domains;
        }
        if other.blocked_domains.is_some() {
            self.blocked_domains = other.blocked_domains;
        }
        if other.max_file_size.is_some() {
            self.max_file_size = other.max_file_size;
        }
        if other.sanitize_input.is_some() {
            self.sanitize_input = other.sanitize_input;
        }
    }

    fn apply_to(&self, security: &mut super::SecurityConfig) {
        overlay_scalar!(
            self,
            security,
            allowed_domains,
            blocked_domains,
            max_file_size,
            sanitize_input,
        );
    }
}

// ============================================================================
// Render
// ============================================================================

/// Partial [`RenderConfig`]; also the per-job override type used by
/// `convert` and batch jobs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderOverlay {
    /// Page geometry overrides.
    #[serde(default)]
    pub page: Option<PageOverlay>,
    /// PDF option overrides.
    #[serde(default)]
    pub pdf: Option<PdfOverlay>,
    /// Image option overrides.
    #[serde(default)]
    pub image: Option<ImageOverlay>,
    /// Viewport overrides.
    #[serde(default)]
    pub viewport: Option<ViewportOverlay>,
    /// Wait condition overrides.
    #[serde(default)]
    pub wait: Option<WaitOverlay>,
    /// Authentication overrides.
    #[serde(default)]
    pub auth: Option<AuthOverlay>,
    /// Emulation overrides.
    #[serde(default)]
    pub emulation: Option<EmulationOverlay>,
    /// Performance overrides.
    #[serde(default)]
    pub performance: Option<PerformanceOverlay>,
}

impl RenderOverlay {
    /// Merge `other` over `self`.
    pub fn merge(&mut self, other: RenderOverlay) {
        merge_option(&mut self.page, other.page, PageOverlay::merge);
        merge_option(&mut self.pdf, other.pdf, PdfOverlay::merge);
        merge_option(&mut self.image, other.image, ImageOverlay::merge);
        merge_option(&mut self.viewport, other.viewport, ViewportOverlay::merge);
        merge_option(&mut self.wait, other.wait, WaitOverlay::merge);
        merge_option(&mut self.auth, other.auth, AuthOverlay::merge);
        merge_option(&mut self.emulation, other.emulation, EmulationOverlay::merge);
        merge_option(
            &mut self.performance,
            other.performance,
            PerformanceOverlay::merge,
        );
    }

    /// Apply onto a render config.
    pub fn apply_to(&self, render: &mut RenderConfig) {
        if let Some(page) = &self.page {
            page.apply_to(&mut render.page);
        }
        if let Some(pdf) = &self.pdf {
            pdf.apply_to(&mut render.pdf);
        }
        if let Some(image) = &self.image {
            image.apply_to(&mut render.image);
        }
        if let Some(viewport) = &self.viewport {
            viewport.apply_to(&mut render.viewport);
        }
        if let Some(wait) = &self.wait {
            wait.apply_to(&mut render.wait);
        }
        if let Some(auth) = &self.auth {
            auth.apply_to(&mut render.auth);
        }
        if let Some(emulation) = &self.emulation {
            emulation.apply_to(&mut render.emulation);
        }
        if let Some(performance) = &self.performance {
            performance.apply_to(&mut render.performance);
        }
    }

    /// Mutable access to the page overlay, creating it on demand.
    pub(crate) fn page_mut(&mut self) -> &mut PageOverlay {
        self.page.get_or_insert_with(PageOverlay::default)
    }

    /// Mutable access to the viewport overlay, creating it on demand.
    pub(crate) fn viewport_mut(&mut self) -> &mut ViewportOverlay {
        self.viewport.get_or_insert_with(ViewportOverlay::default)
    }

    /// Mutable access to the wait overlay, creating it on demand.
    pub(crate) fn wait_mut(&mut self) -> &mut WaitOverlay {
        self.wait.get_or_insert_with(WaitOverlay::default)
    }

    /// Mutable access to the image overlay, creating it on demand.
    pub(crate) fn image_mut(&mut self) -> &mut ImageOverlay {
        self.image.get_or_insert_with(ImageOverlay::default)
    }
}

/// Partial [`PageSetup`](super::PageSetup).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageOverlay {
    /// Paper size.
    #[serde(default)]
    pub format: Option<PaperFormat>,
    /// Orientation.
    #[serde(default)]
    pub orientation: Option<Orientation>,
    /// Margin overrides.
    #[serde(default)]
    pub margins: Option<MarginsOverlay>,
    /// Include CSS backgrounds.
    #[serde(default)]
    pub print_background: Option<bool>,
    /// Render scale.
    #[serde(default)]
    pub scale: Option<f64>,
}

impl PageOverlay {
    fn merge(&mut self, other: PageOverlay) {
        if other.format.is_some() {
            self.format = other.format;
        }
        if other.orientation.is_some() {
            self.orientation = other.orientation;
        }
        merge_option(&mut self.margins, other.margins, MarginsOverlay::merge);
        if other.print_background.is_some() {
            self.print_background = other.print_background;
        }
        if other.scale.is_some() {
            self.scale = other.scale;
        }
    }

    fn apply_to(&self, page: &mut super::PageSetup) {
        overlay_scalar!(self, page, format, orientation, print_background, scale);
        if let Some(margins) = &self.margins {
            margins.apply_to(&mut page.margins);
        }
    }
}

/// Partial [`Margins`](super::Margins), millimetres per side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarginsOverlay {
    /// Top margin.
    #[serde(default)]
    pub top: Option<f64>,
    /// Right margin.
    #[serde(default)]
    pub right: Option<f64>,
    /// Bottom margin.
    #[serde(default)]
    pub bottom: Option<f64>,
    /// Left margin.
    #[serde(default)]
    pub left: Option<f64>,
}

impl MarginsOverlay {
    fn merge(&mut self, other: MarginsOverlay) {
        if other.top.is_some() {
            self.top = other.top;
        }
        if other.right.is_some() {
            self.right = other.right;
        }
        if other.bottom.is_some() {
            self.bottom = other.bottom;
        }
        if other.left.is_some() {
            self.left = other.left;
        }
    }

    fn apply_to(&self, margins: &mut super::Margins) {
        overlay_scalar!(self, margins, top, right, bottom, left);
    }
}

/// Partial [`PdfOptions`](super::PdfOptions).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdfOverlay {
    /// Show header/footer bands.
    #[serde(default)]
    pub display_header_footer: Option<bool>,
    /// Header template.
    #[serde(default)]
    pub header_template: Option<String>,
    /// Footer template.
    #[serde(default)]
    pub footer_template: Option<String>,
    /// Page subset expression.
    #[serde(default)]
    pub page_ranges: Option<String>,
    /// `@page` CSS wins over configured paper size.
    #[serde(default)]
    pub prefer_css_page_size: Option<bool>,
}

impl PdfOverlay {
    fn merge(&mut self, other: PdfOverlay) {
        if other.display_header_footer.is_some() {
            self.display_header_footer = other.display_header_footer;
        }
        if other.header_template.is_some() {
            self.header_template = other.header_template;
        }
        if other.footer_template.is_some() {
            self.footer_template = other.footer_template;
        }
        if other.page_ranges.is_some() {
            self.page_ranges = other.page_ranges;
        }
        if other.prefer_css_page_size.is_some() {
            self.prefer_css_page_size = other.prefer_css_page_size;
        }
    }

    fn apply_to(&self, pdf: &mut super::PdfOptions) {
        overlay_scalar!(self, pdf, display_header_footer, prefer_css_page_size);
        if let Some(value) = &self.header_template {
            pdf.header_template = Some(value.clone());
        }
        if let Some(value) = &self.footer_template {
            pdf.footer_template = Some(value.clone());
        }
        if let Some(value) = &self.page_ranges {
            pdf.page_ranges = Some(value.clone());
        }
    }
}

/// Partial [`ImageOptions`](super::ImageOptions).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageOverlay {
    /// Output encoding.
    #[serde(default)]
    pub format: Option<ImageFormat>,
    /// Quality 1–100.
    #[serde(default)]
    pub quality: Option<u8>,
    /// Full scroll-height capture.
    #[serde(default)]
    pub full_page: Option<bool>,
    /// Transparent background.
    #[serde(default)]
    pub omit_background: Option<bool>,
    /// Capture rectangle (whole-value replacement).
    #[serde(default)]
    pub clip: Option<Clip>,
}

impl ImageOverlay {
    fn merge(&mut self, other: ImageOverlay) {
        if other.format.is_some() {
            self.format = other.format;
        }
        if other.quality.is_some() {
            self.quality = other.quality;
        }
        if other.full_page.is_some() {
            self.full_page = other.full_page;
        }
        if other.omit_background.is_some() {
            self.omit_background = other.omit_background;
        }
        if other.clip.is_some() {
            self.clip = other.clip;
        }
    }

    fn apply_to(&self, image: &mut super::ImageOptions) {
        overlay_scalar!(self, image, format, quality, full_page, omit_background);
        if let Some(clip) = self.clip {
            image.clip = Some(clip);
        }
    }
}

/// Partial [`Viewport`](super::Viewport).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportOverlay {
    /// Width in CSS pixels.
    #[serde(default)]
    pub width: Option<u32>,
    /// Height in CSS pixels.
    #[serde(default)]
    pub height: Option<u32>,
    /// Device scale factor.
    #[serde(default)]
    pub device_scale_factor: Option<f64>,
    /// Mobile emulation.
    #[serde(default)]
    pub mobile: Option<bool>,
}

impl ViewportOverlay {
    fn merge(&mut self, other: ViewportOverlay) {
        if other.width.is_some() {
            self.width = other.width;
        }
        if other.height.is_some() {
            self.height = other.height;
        }
        if other.device_scale_factor.is_some() {
            self.device_scale_factor = other.device_scale_factor;
        }
        if other.mobile.is_some() {
            self.mobile = other.mobile;
        }
    }

    fn apply_to(&self, viewport: &mut super::Viewport) {
        overlay_scalar!(self, viewport, width, height, device_scale_factor, mobile);
    }
}

/// Partial [`WaitConfig`](super::WaitConfig).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitOverlay {
    /// Completion condition.
    #[serde(default)]
    pub until: Option<WaitUntil>,
    /// Outer deadline in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Selector to await.
    #[serde(default)]
    pub selector: Option<String>,
    /// Fixed extra delay in milliseconds.
    #[serde(default)]
    pub extra_delay_ms: Option<u64>,
}

impl WaitOverlay {
    fn merge(&mut self, other: WaitOverlay) {
        if other.until.is_some() {
            self.until = other.until;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.selector.is_some() {
            self.selector = other.selector;
        }
        if other.extra_delay_ms.is_some() {
            self.extra_delay_ms = other.extra_delay_ms;
        }
    }

    fn apply_to(&self, wait: &mut super::WaitConfig) {
        if let Some(until) = self.until {
            wait.until = until;
        }
        if let Some(ms) = self.timeout_ms {
            wait.timeout = Duration::from_millis(ms);
        }
        if let Some(selector) = &self.selector {
            wait.selector = Some(selector.clone());
        }
        if let Some(ms) = self.extra_delay_ms {
            wait.extra_delay = Some(Duration::from_millis(ms));
        }
    }
}

/// Partial [`AuthConfig`](super::AuthConfig).
///
/// Headers and cookies replace wholesale, matching the array replacement
/// rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthOverlay {
    /// Basic credentials.
    #[serde(default)]
    pub basic: Option<BasicCredentials>,
    /// Extra headers.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Cookies.
    #[serde(default)]
    pub cookies: Option<Vec<CookieSpec>>,
}

impl AuthOverlay {
    fn merge(&mut self, other: AuthOverlay) {
        if other.basic.is_some() {
            self.basic = other.basic;
        }
        if other.headers.is_some() {
            self.headers = other.headers;
        }
        if other.cookies.is_some() {
            self.cookies = other.cookies;
        }
    }

    fn apply_to(&self, auth: &mut super::AuthConfig) {
        if let Some(basic) = &self.basic {
            auth.basic = Some(basic.clone());
        }
        if let Some(headers) = &self.headers {
            auth.headers = headers.clone();
        }
        if let Some(cookies) = &self.cookies {
            auth.cookies = cookies.clone();
        }
    }
}

/// Partial [`EmulationConfig`](super::EmulationConfig).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmulationOverlay {
    /// CSS media emulation.
    #[serde(default)]
    pub media: Option<MediaEmulation>,
    /// User-agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Timezone override.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Locale override.
    #[serde(default)]
    pub locale: Option<String>,
}

impl EmulationOverlay {
    fn merge(&mut self, other: EmulationOverlay) {
        if other.media.is_some() {
            self.media = other.media;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        if other.timezone.is_some() {
            self.timezone = other.timezone;
        }
        if other.locale.is_some() {
            self.locale = other.locale;
        }
    }

    fn apply_to(&self, emulation: &mut super::EmulationConfig) {
        if let Some(media) = self.media {
            emulation.media = Some(media);
        }
        if let Some(value) = &self.user_agent {
            emulation.user_agent = Some(value.clone());
        }
        if let Some(value) = &self.timezone {
            emulation.timezone = Some(value.clone());
        }
        if let Some(value) = &self.locale {
            emulation.locale = Some(value.clone());
        }
    }
}

/// Partial [`PerformanceConfig`](super::PerformanceConfig).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerformanceOverlay {
    /// Execute page JavaScript.
    #[serde(default)]
    pub javascript_enabled: Option<bool>,
    /// Use the browser cache.
    #[serde(default)]
    pub cache_enabled: Option<bool>,
    /// Blocked resource classes (whole-value replacement).
    #[serde(default)]
    pub block_resources: Option<Vec<ResourceClass>>,
}

impl PerformanceOverlay {
    fn merge(&mut self, other: PerformanceOverlay) {
        if other.javascript_enabled.is_some() {
            self.javascript_enabled = other.javascript_enabled;
        }
        if other.cache_enabled.is_some() {
            self.cache_enabled = other.cache_enabled;
        }
        if other.block_resources.is_some() {
            self.block_resources = other.block_resources;
        }
    }

    fn apply_to(&self, performance: &mut super::PerformanceConfig) {
        overlay_scalar!(
            self,
            performance,
            javascript_enabled,
            cache_enabled,
            block_resources,
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
