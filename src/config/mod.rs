//! Layered configuration for the conversion engine.
//!
//! This module defines the immutable [`EffectiveConfig`] consumed by every
//! other subsystem, its per-environment defaults, and the validation rules
//! that gate publication. The surrounding submodules supply the layers that
//! produce it:
//!
//! | Submodule | Layer |
//! |-----------|-------|
//! | [`overlay`] | partial-config mirror + typed deep merge |
//! | [`file`] | config file discovery and JSON/YAML decoding |
//! | [`env`] | environment detection and `PRINTEER_*` variables |
//! | [`cli`] | flag ↔ dotted-path mapping table |
//! | [`resolver`] | layered load, atomic publication, watch/reload |
//!
//! Precedence, lowest to highest: built-in defaults for the detected
//! environment, user config file, project config file, process environment,
//! CLI arguments. Merging is deep on records and whole-value on scalars and
//! arrays.
//!
//! # Example
//!
//! ```rust
//! use printeer::config::{EffectiveConfig, Environment};
//!
//! let config = EffectiveConfig::defaults(Environment::Production);
//! assert!(config.browser.pool.min <= config.browser.pool.max);
//! assert_eq!(config.browser.pool.max, 5);
//!
//! let warnings = config.validate().expect("defaults must validate");
//! assert!(warnings.is_empty());
//! ```

pub mod cli;
pub mod env;
pub mod file;
pub mod overlay;
pub mod resolver;

pub use cli::CliOverrides;
pub use overlay::{ConfigOverlay, RenderOverlay};
pub use resolver::ConfigResolver;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PrinteerError, Result};

// ============================================================================
// Top-level enums
// ============================================================================

/// How the engine is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// One conversion per process invocation.
    SingleShot,
    /// A resident process serving many conversions.
    LongRunning,
}

/// Deployment environment, detected or explicitly configured.
///
/// Environment selects the built-in default profile; see
/// [`EffectiveConfig::defaults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: permissive pool, verbose text logs.
    Development,
    /// Deployed service: warm pool, JSON logs, sandbox-hardened launch args.
    Production,
    /// Test runs: headless, short timeouts, tight limits.
    Test,
}

impl Environment {
    /// Parse the common spellings used by `PRINTEER_ENV` / `NODE_ENV`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(Environment::Development),
            "prod" | "production" => Some(Environment::Production),
            "test" => Some(Environment::Test),
            _ => None,
        }
    }
}

/// Headless launch preference.
///
/// `Auto` resolves to headless wherever no display server is discoverable;
/// the resolution happens in the browser factory, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadlessMode {
    /// Always headless.
    True,
    /// Always headful.
    False,
    /// Headless unless a display server is present.
    Auto,
}

impl HeadlessMode {
    /// Parse `true|false|auto` (the `PRINTEER_BROWSER_HEADLESS` grammar).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(HeadlessMode::True),
            "false" => Some(HeadlessMode::False),
            "auto" => Some(HeadlessMode::Auto),
            _ => None,
        }
    }
}

// ============================================================================
// Effective configuration records
// ============================================================================

/// Immutable effective configuration.
///
/// Produced once per load by [`ConfigResolver`]; republished wholesale on
/// successful reload (readers always observe a fully-initialized config via
/// an atomic `Arc` swap, never a partially-mutated one).
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    /// Single-shot or long-running operation.
    pub mode: Mode,
    /// The environment the defaults were drawn from.
    pub environment: Environment,
    /// Browser launch and pool parameters.
    pub browser: BrowserConfig,
    /// Hard resource limits enforced by the limit enforcer.
    pub resources: ResourceLimits,
    /// Warning/critical pressure thresholds, fractions in (0, 1).
    pub thresholds: AlertThresholds,
    /// Logging parameters consumed by the embedding binary.
    pub logging: LoggingConfig,
    /// Domain allow/deny lists and input handling.
    pub security: SecurityConfig,
    /// Parameters for a single conversion.
    pub render: RenderConfig,
}

/// Browser launch and pooling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserConfig {
    /// Explicit browser binary; `None` lets the factory auto-detect.
    pub executable_path: Option<PathBuf>,
    /// Headless preference.
    pub headless: HeadlessMode,
    /// Launch timeout.
    pub timeout: Duration,
    /// Extra command-line arguments passed to the browser.
    pub args: Vec<String>,
    /// Pool sizing and lifecycle.
    pub pool: PoolConfig,
}

/// Pool sizing and lifecycle parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Instances kept warm; the cleanup loop tops up to this floor.
    pub min: usize,
    /// Hard ceiling on live instances.
    pub max: usize,
    /// Idle instances above `min` are destroyed past this age.
    pub idle_timeout: Duration,
    /// Interval of the pool's maintenance loop.
    pub cleanup_interval: Duration,
}

/// Hard resource limits.
///
/// Compared against live samples by the limit enforcer; breaching one
/// triggers enforcement actions, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLimits {
    /// Maximum engine memory footprint in MB.
    pub max_memory_mb: u64,
    /// Maximum CPU usage in percent (0–100).
    pub max_cpu_percent: f64,
    /// Maximum temp-area disk usage in MB.
    pub max_disk_mb: u64,
    /// Maximum concurrently admitted conversion requests.
    pub max_concurrent_requests: usize,
    /// Maximum live browser instances.
    pub max_browser_instances: usize,
}

/// Pressure thresholds as fractions of capacity, strictly inside (0, 1).
///
/// Invariant: every `*_warn` is strictly below its `*_critical` partner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Memory warning threshold.
    pub memory_warn: f64,
    /// Memory critical threshold.
    pub memory_critical: f64,
    /// CPU warning threshold.
    pub cpu_warn: f64,
    /// CPU critical threshold.
    pub cpu_critical: f64,
    /// Disk warning threshold.
    pub disk_warn: f64,
    /// Disk critical threshold.
    pub disk_critical: f64,
}

/// Log verbosity, mirroring the `log` crate levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Operational messages.
    Info,
    /// Development detail.
    Debug,
    /// Everything.
    Trace,
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    /// Standard error (default).
    Stderr,
    /// Standard output.
    Stdout,
    /// A log file.
    File(PathBuf),
}

/// Logging parameters.
///
/// The engine itself logs through the `log` facade; this record tells the
/// embedding binary how to install its logger.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Minimum level emitted.
    pub level: LogLevel,
    /// Text or JSON lines.
    pub format: LogFormat,
    /// Output sink.
    pub destination: LogDestination,
}

/// Domain filtering and input handling.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityConfig {
    /// Patterns a conversion URL's host must match when non-empty.
    pub allowed_domains: Vec<String>,
    /// Patterns a conversion URL's host must never match.
    pub blocked_domains: Vec<String>,
    /// Maximum output file size in bytes.
    pub max_file_size: u64,
    /// Whether untrusted inputs are sanitized before substitution.
    pub sanitize_input: bool,
}

// ============================================================================
// Render configuration
// ============================================================================

/// Paper size for PDF output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperFormat {
    /// ISO A3.
    A3,
    /// ISO A4 (default).
    A4,
    /// ISO A5.
    A5,
    /// US Letter.
    Letter,
    /// US Legal.
    Legal,
    /// US Tabloid.
    Tabloid,
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Upright pages.
    Portrait,
    /// Rotated pages.
    Landscape,
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    /// Top margin.
    pub top: f64,
    /// Right margin.
    pub right: f64,
    /// Bottom margin.
    pub bottom: f64,
    /// Left margin.
    pub left: f64,
}

impl Margins {
    /// Equal margins on all sides.
    pub fn uniform(mm: f64) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }
}

/// Page geometry shared by PDF and image output.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    /// Paper size.
    pub format: PaperFormat,
    /// Portrait or landscape.
    pub orientation: Orientation,
    /// Margins in millimetres.
    pub margins: Margins,
    /// Include CSS backgrounds.
    pub print_background: bool,
    /// Render scale factor.
    pub scale: f64,
}

/// PDF-specific output options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfOptions {
    /// Show header/footer bands.
    pub display_header_footer: bool,
    /// Header HTML template, rendered by the adapter.
    pub header_template: Option<String>,
    /// Footer HTML template, rendered by the adapter.
    pub footer_template: Option<String>,
    /// Page subset expression, e.g. `"1-3,5"`.
    pub page_ranges: Option<String>,
    /// Let `@page` CSS override the configured paper size.
    pub prefer_css_page_size: bool,
}

/// Raster image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG (default).
    Png,
    /// JPEG with configurable quality.
    Jpeg,
    /// WebP with configurable quality.
    Webp,
}

/// Capture rectangle for clipped screenshots, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Image-specific output options.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    /// Output encoding.
    pub format: ImageFormat,
    /// Quality 1–100 for lossy encodings.
    pub quality: u8,
    /// Capture the full scroll height instead of the viewport.
    pub full_page: bool,
    /// Produce transparent backgrounds where the page has none.
    pub omit_background: bool,
    /// Optional capture rectangle.
    pub clip: Option<Clip>,
}

/// Browser viewport emulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Width in CSS pixels.
    pub width: u32,
    /// Height in CSS pixels.
    pub height: u32,
    /// Device scale factor.
    pub device_scale_factor: f64,
    /// Emulate a mobile device.
    pub mobile: bool,
}

/// Navigation completion condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitUntil {
    /// The `load` event fired.
    Load,
    /// The `DOMContentLoaded` event fired.
    DomContentLoaded,
    /// The network went idle.
    NetworkIdle,
}

/// When a page counts as ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Completion condition.
    pub until: WaitUntil,
    /// Outer deadline for the whole conversion.
    pub timeout: Duration,
    /// Additionally wait for this CSS selector to appear.
    pub selector: Option<String>,
    /// Fixed extra delay after the condition is met.
    pub extra_delay: Option<Duration>,
}

/// HTTP basic credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicCredentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// A cookie installed before navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieSpec {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Cookie domain; defaults to the target host.
    pub domain: Option<String>,
}

/// Authentication material applied to the page before navigation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthConfig {
    /// HTTP basic auth.
    pub basic: Option<BasicCredentials>,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Cookies to install.
    pub cookies: Vec<CookieSpec>,
}

/// CSS media type emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaEmulation {
    /// `screen` media.
    Screen,
    /// `print` media.
    Print,
}

/// Device/locale emulation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmulationConfig {
    /// Emulated CSS media type.
    pub media: Option<MediaEmulation>,
    /// User-agent override.
    pub user_agent: Option<String>,
    /// IANA timezone override.
    pub timezone: Option<String>,
    /// BCP-47 locale override.
    pub locale: Option<String>,
}

/// Resource classes the renderer may block for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Raster/vector images.
    Image,
    /// Web fonts.
    Font,
    /// Stylesheets.
    Stylesheet,
    /// Scripts.
    Script,
    /// Audio/video.
    Media,
}

/// Performance-related rendering toggles.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceConfig {
    /// Execute page JavaScript.
    pub javascript_enabled: bool,
    /// Use the browser cache.
    pub cache_enabled: bool,
    /// Resource classes to block during navigation.
    pub block_resources: Vec<ResourceClass>,
}

/// Everything needed to render one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Page geometry.
    pub page: PageSetup,
    /// PDF output options.
    pub pdf: PdfOptions,
    /// Image output options.
    pub image: ImageOptions,
    /// Viewport emulation.
    pub viewport: Viewport,
    /// Readiness condition and deadline.
    pub wait: WaitConfig,
    /// Authentication material.
    pub auth: AuthConfig,
    /// Device/locale emulation.
    pub emulation: EmulationConfig,
    /// Performance toggles.
    pub performance: PerformanceConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page: PageSetup {
                format: PaperFormat::A4,
                orientation: Orientation::Portrait,
                margins: Margins::uniform(10.0),
                print_background: true,
                scale: 1.0,
            },
            pdf: PdfOptions::default(),
            image: ImageOptions {
                format: ImageFormat::Png,
                quality: 90,
                full_page: false,
                omit_background: false,
                clip: None,
            },
            viewport: Viewport {
                width: 1280,
                height: 800,
                device_scale_factor: 1.0,
                mobile: false,
            },
            wait: WaitConfig {
                until: WaitUntil::Load,
                timeout: Duration::from_secs(30),
                selector: None,
                extra_delay: None,
            },
            auth: AuthConfig::default(),
            emulation: EmulationConfig::default(),
            performance: PerformanceConfig {
                javascript_enabled: true,
                cache_enabled: true,
                block_resources: Vec::new(),
            },
        }
    }
}

// ============================================================================
// Defaults and validation
// ============================================================================

/// A non-fatal finding from validation.
///
/// Warnings flag values that are legal but usually mistakes, e.g. a memory
/// ceiling too small to launch a browser.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// Dotted path of the suspicious field.
    pub field: String,
    /// Why the value looks wrong.
    pub message: String,
}

impl EffectiveConfig {
    /// Built-in defaults for `environment`.
    ///
    /// | | Development | Production | Test |
    /// |---|---|---|---|
    /// | headless | auto | true | true |
    /// | pool | 0–2 | 1–5 | 0–1 |
    /// | memory | 512 MB | 1024 MB | 256 MB |
    /// | logs | debug, text | info, JSON | warn, text |
    /// | launch timeout | 30 s | 30 s | 10 s |
    pub fn defaults(environment: Environment) -> Self {
        let base_render = RenderConfig::default();
        match environment {
            Environment::Development => Self {
                mode: Mode::SingleShot,
                environment,
                browser: BrowserConfig {
                    executable_path: None,
                    headless: HeadlessMode::Auto,
                    timeout: Duration::from_secs(30),
                    args: Vec::new(),
                    pool: PoolConfig {
                        min: 0,
                        max: 2,
                        idle_timeout: Duration::from_secs(300),
                        cleanup_interval: Duration::from_secs(60),
                    },
                },
                resources: ResourceLimits {
                    max_memory_mb: 512,
                    max_cpu_percent: 80.0,
                    max_disk_mb: 1024,
                    max_concurrent_requests: 4,
                    max_browser_instances: 2,
                },
                thresholds: AlertThresholds::default(),
                logging: LoggingConfig {
                    level: LogLevel::Debug,
                    format: LogFormat::Text,
                    destination: LogDestination::Stderr,
                },
                security: SecurityConfig::default(),
                render: base_render,
            },
            Environment::Production => Self {
                mode: Mode::LongRunning,
                environment,
                browser: BrowserConfig {
                    executable_path: None,
                    headless: HeadlessMode::True,
                    timeout: Duration::from_secs(30),
                    args: vec![
                        "--no-sandbox".to_string(),
                        "--disable-dev-shm-usage".to_string(),
                        "--disable-gpu".to_string(),
                    ],
                    pool: PoolConfig {
                        min: 1,
                        max: 5,
                        idle_timeout: Duration::from_secs(300),
                        cleanup_interval: Duration::from_secs(60),
                    },
                },
                resources: ResourceLimits {
                    max_memory_mb: 1024,
                    max_cpu_percent: 80.0,
                    max_disk_mb: 2048,
                    max_concurrent_requests: 8,
                    max_browser_instances: 5,
                },
                thresholds: AlertThresholds::default(),
                logging: LoggingConfig {
                    level: LogLevel::Info,
                    format: LogFormat::Json,
                    destination: LogDestination::Stderr,
                },
                security: SecurityConfig::default(),
                render: base_render,
            },
            Environment::Test => {
                let mut render = base_render;
                render.wait.timeout = Duration::from_secs(10);
                Self {
                    mode: Mode::SingleShot,
                    environment,
                    browser: BrowserConfig {
                        executable_path: None,
                        headless: HeadlessMode::True,
                        timeout: Duration::from_secs(10),
                        args: vec!["--no-sandbox".to_string()],
                        pool: PoolConfig {
                            min: 0,
                            max: 1,
                            idle_timeout: Duration::from_secs(30),
                            cleanup_interval: Duration::from_secs(10),
                        },
                    },
                    resources: ResourceLimits {
                        max_memory_mb: 256,
                        max_cpu_percent: 90.0,
                        max_disk_mb: 512,
                        max_concurrent_requests: 2,
                        max_browser_instances: 1,
                    },
                    thresholds: AlertThresholds::default(),
                    logging: LoggingConfig {
                        level: LogLevel::Warn,
                        format: LogFormat::Text,
                        destination: LogDestination::Stderr,
                    },
                    security: SecurityConfig::default(),
                    render,
                }
            }
        }
    }

    /// Validate semantic invariants, returning non-fatal warnings.
    ///
    /// # Errors
    ///
    /// [`PrinteerError::Validation`] naming the first violated invariant:
    /// non-positive durations or limits, inverted pool bounds, thresholds
    /// outside `(0, 1)` or `warn >= critical`, malformed domain patterns,
    /// out-of-range render values.
    pub fn validate(&self) -> Result<Vec<ValidationWarning>> {
        if self.browser.pool.min > self.browser.pool.max {
            return Err(PrinteerError::Validation(format!(
                "browser.pool.min ({}) exceeds browser.pool.max ({})",
                self.browser.pool.min, self.browser.pool.max
            )));
        }
        if self.browser.pool.max == 0 {
            return Err("browser.pool.max must be at least 1".into());
        }
        for (name, duration) in [
            ("browser.timeout", self.browser.timeout),
            ("browser.pool.idle_timeout", self.browser.pool.idle_timeout),
            (
                "browser.pool.cleanup_interval",
                self.browser.pool.cleanup_interval,
            ),
            ("render.wait.timeout", self.wait_timeout()),
        ] {
            if duration.is_zero() {
                return Err(PrinteerError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        for (name, value) in [
            ("resources.max_memory_mb", self.resources.max_memory_mb),
            ("resources.max_disk_mb", self.resources.max_disk_mb),
        ] {
            if value == 0 {
                return Err(PrinteerError::Validation(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        if self.resources.max_concurrent_requests == 0 {
            return Err("resources.max_concurrent_requests must be at least 1".into());
        }
        if self.resources.max_browser_instances == 0 {
            return Err("resources.max_browser_instances must be at least 1".into());
        }
        if !(0.0..=100.0).contains(&self.resources.max_cpu_percent)
            || self.resources.max_cpu_percent == 0.0
        {
            return Err("resources.max_cpu_percent must be in (0, 100]".into());
        }

        self.thresholds.validate()?;

        for pattern in self
            .security
            .allowed_domains
            .iter()
            .chain(self.security.blocked_domains.iter())
        {
            validate_domain_pattern(pattern)?;
        }

        if self.render.image.quality == 0 || self.render.image.quality > 100 {
            return Err("render.image.quality must be in 1..=100".into());
        }
        if self.render.page.scale <= 0.0 {
            return Err("render.page.scale must be positive".into());
        }
        if self.render.viewport.width == 0 || self.render.viewport.height == 0 {
            return Err("render.viewport dimensions must be non-zero".into());
        }

        let mut warnings = Vec::new();
        if self.resources.max_memory_mb < 256 {
            warnings.push(ValidationWarning {
                field: "resources.max_memory_mb".to_string(),
                message: format!(
                    "{} MB is below the usual footprint of a single browser",
                    self.resources.max_memory_mb
                ),
            });
        }
        if self.resources.max_concurrent_requests > 20 {
            warnings.push(ValidationWarning {
                field: "resources.max_concurrent_requests".to_string(),
                message: format!(
                    "{} concurrent requests is unusually high for one host",
                    self.resources.max_concurrent_requests
                ),
            });
        }
        if self.browser.pool.max > self.resources.max_browser_instances {
            warnings.push(ValidationWarning {
                field: "browser.pool.max".to_string(),
                message: "pool ceiling exceeds resources.max_browser_instances; the limit enforcer will keep shrinking the pool".to_string(),
            });
        }
        Ok(warnings)
    }

    /// The outer render deadline.
    #[inline]
    pub fn wait_timeout(&self) -> Duration {
        self.render.wait.timeout
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            memory_warn: 0.7,
            memory_critical: 0.9,
            cpu_warn: 0.7,
            cpu_critical: 0.9,
            disk_warn: 0.8,
            disk_critical: 0.95,
        }
    }
}

impl AlertThresholds {
    fn validate(&self) -> Result<()> {
        let pairs = [
            ("memory", self.memory_warn, self.memory_critical),
            ("cpu", self.cpu_warn, self.cpu_critical),
            ("disk", self.disk_warn, self.disk_critical),
        ];
        for (name, warn, critical) in pairs {
            for (kind, value) in [("warn", warn), ("critical", critical)] {
                if !(value > 0.0 && value < 1.0) {
                    return Err(PrinteerError::Validation(format!(
                        "thresholds.{name}_{kind} must be strictly inside (0, 1), got {value}"
                    )));
                }
            }
            if warn >= critical {
                return Err(PrinteerError::Validation(format!(
                    "thresholds.{name}_warn ({warn}) must be below thresholds.{name}_critical ({critical})"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            max_file_size: 100 * 1024 * 1024,
            sanitize_input: true,
        }
    }
}

/// Validate a domain pattern: optional leading `*.`, then dot-separated
/// labels of `[A-Za-z0-9-]` without leading/trailing hyphens, no whitespace.
pub fn validate_domain_pattern(pattern: &str) -> Result<()> {
    let bare = pattern.strip_prefix("*.").unwrap_or(pattern);
    if bare.is_empty() {
        return Err(PrinteerError::Validation(format!(
            "domain pattern {pattern:?} is empty"
        )));
    }
    if pattern.chars().any(char::is_whitespace) {
        return Err(PrinteerError::Validation(format!(
            "domain pattern {pattern:?} contains whitespace"
        )));
    }
    for label in bare.split('.') {
        let valid = !label.is_empty()
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-');
        if !valid {
            return Err(PrinteerError::Validation(format!(
                "domain pattern {pattern:?} has malformed label {label:?}"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies that every environment's defaults satisfy the invariants
    /// they are validated against.
    #[test]
    fn test_defaults_validate_cleanly() {
        for environment in [
            Environment::Development,
            Environment::Production,
            Environment::Test,
        ] {
            let config = EffectiveConfig::defaults(environment);
            let warnings = config.validate().expect("defaults must be valid");
            assert!(
                warnings.is_empty(),
                "{environment:?} defaults produced warnings: {warnings:?}"
            );
            assert!(config.browser.pool.min <= config.browser.pool.max);
        }
    }

    /// Verifies the per-environment profile differences called out in the
    /// defaults table.
    #[test]
    fn test_environment_profiles() {
        let dev = EffectiveConfig::defaults(Environment::Development);
        assert_eq!(dev.browser.headless, HeadlessMode::Auto);
        assert_eq!(dev.browser.pool.max, 2);
        assert_eq!(dev.logging.level, LogLevel::Debug);
        assert_eq!(dev.logging.format, LogFormat::Text);

        let prod = EffectiveConfig::defaults(Environment::Production);
        assert_eq!(prod.browser.headless, HeadlessMode::True);
        assert_eq!(prod.browser.pool.min, 1);
        assert_eq!(prod.browser.pool.max, 5);
        assert_eq!(prod.resources.max_memory_mb, 1024);
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(prod.browser.args.iter().any(|a| a == "--no-sandbox"));

        let test = EffectiveConfig::defaults(Environment::Test);
        assert_eq!(test.browser.headless, HeadlessMode::True);
        assert!(test.browser.timeout < prod.browser.timeout);
        assert!(test.resources.max_memory_mb < prod.resources.max_memory_mb);
    }

    /// Verifies that inverted pool bounds are rejected.
    #[test]
    fn test_inverted_pool_bounds_rejected() {
        let mut config = EffectiveConfig::defaults(Environment::Development);
        config.browser.pool.min = 3;
        config.browser.pool.max = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pool.min"));
    }

    /// Verifies threshold range and ordering validation.
    #[test]
    fn test_threshold_validation() {
        let mut config = EffectiveConfig::defaults(Environment::Development);
        config.thresholds.memory_warn = 0.0;
        assert!(config.validate().is_err());

        let mut config = EffectiveConfig::defaults(Environment::Development);
        config.thresholds.cpu_warn = 0.95;
        config.thresholds.cpu_critical = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cpu_warn"));

        let mut config = EffectiveConfig::defaults(Environment::Development);
        config.thresholds.disk_critical = 1.0;
        assert!(config.validate().is_err());
    }

    /// Verifies the domain pattern grammar.
    #[test]
    fn test_domain_pattern_grammar() {
        for good in ["example.com", "*.example.com", "intranet", "a-b.c-d.io"] {
            assert!(validate_domain_pattern(good).is_ok(), "{good} should pass");
        }
        for bad in ["", "*.", "exa mple.com", ".example.com", "-bad.com", "bad-.com", "ex..com"] {
            assert!(validate_domain_pattern(bad).is_err(), "{bad:?} should fail");
        }
    }

    /// Verifies suspicious-value warnings are non-fatal.
    #[test]
    fn test_suspicious_values_warn() {
        let mut config = EffectiveConfig::defaults(Environment::Development);
        config.resources.max_memory_mb = 128;
        config.resources.max_concurrent_requests = 32;
        let warnings = config.validate().expect("warnings must not be fatal");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.field.contains("max_memory_mb")));
        assert!(warnings
            .iter()
            .any(|w| w.field.contains("max_concurrent_requests")));
    }

    /// Verifies enum spellings used by environment variables.
    #[test]
    fn test_env_value_parsing() {
        assert_eq!(Environment::parse("dev"), Some(Environment::Development));
        assert_eq!(Environment::parse("PRODUCTION"), Some(Environment::Production));
        assert_eq!(Environment::parse("test"), Some(Environment::Test));
        assert_eq!(Environment::parse("staging"), None);

        assert_eq!(HeadlessMode::parse("auto"), Some(HeadlessMode::Auto));
        assert_eq!(HeadlessMode::parse("TRUE"), Some(HeadlessMode::True));
        assert_eq!(HeadlessMode::parse("0"), None);
    }

    /// Verifies render defaults are sane.
    #[test]
    fn test_render_defaults() {
        let render = RenderConfig::default();
        assert_eq!(render.page.format, PaperFormat::A4);
        assert_eq!(render.image.format, ImageFormat::Png);
        assert_eq!(render.wait.timeout, Duration::from_secs(30));
        assert!(render.performance.javascript_enabled);
    }
}
