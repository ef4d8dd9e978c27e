//! Environment detection and `PRINTEER_*` variable overrides.
//!
//! Two concerns live here:
//!
//! 1. **Environment auto-detection** ([`detect_environment`]): explicit
//!    `PRINTEER_ENV`/`NODE_ENV` wins, then CI/test-runner markers select
//!    [`Environment::Test`], then container/orchestrator markers select
//!    [`Environment::Production`], otherwise
//!    [`Environment::Development`].
//! 2. **Overrides** ([`overlay_from_env`]): every recognized `PRINTEER_*`
//!    variable mapped into a [`ConfigOverlay`]. Malformed values are
//!    skipped with a warning — an environment variable never aborts a
//!    load.
//!
//! A handful of recognized variables configure collaborators outside the
//! engine core (daemon cooling/uptime, bundled-browser discovery, the CLI's
//! silent flag); those are parsed into [`AuxiliaryEnv`] for the embedding
//! binary instead of the effective config.
//!
//! When the `env-config` feature is enabled, [`load_env_file`] reads an
//! optional `printeer.env` file into the process environment first.

use std::path::Path;

use super::overlay::ConfigOverlay;
use super::{Environment, HeadlessMode, LogDestination, LogFormat, LogLevel, Mode};

/// Optional environment file name (loaded by [`load_env_file`]).
#[cfg(feature = "env-config")]
pub const ENV_FILE_NAME: &str = "printeer.env";

/// Load environment variables from `printeer.env` if present.
///
/// Call early in startup so later lookups observe the file's values.
/// Missing file is not an error for callers that treat the file as
/// optional; the underlying `dotenvy` error is returned for inspection.
#[cfg(feature = "env-config")]
pub fn load_env_file() -> std::result::Result<std::path::PathBuf, dotenvy::Error> {
    dotenvy::from_filename(ENV_FILE_NAME)
}

/// Detect the active environment from the process environment.
pub fn detect_environment() -> Environment {
    detect_environment_with(&|name| std::env::var(name).ok(), || {
        Path::new("/.dockerenv").exists()
    })
}

/// Detection logic with injectable probes, for tests.
fn detect_environment_with(
    var: &dyn Fn(&str) -> Option<String>,
    dockerenv: impl Fn() -> bool,
) -> Environment {
    // Explicit declaration wins outright.
    for name in ["PRINTEER_ENV", "NODE_ENV"] {
        if let Some(value) = var(name) {
            if let Some(environment) = Environment::parse(&value) {
                return environment;
            }
            log::warn!("Ignoring unrecognized {name}={value:?}");
        }
    }

    // CI and test runners mean we are inside a test harness.
    const TEST_MARKERS: &[&str] = &[
        "CI",
        "CONTINUOUS_INTEGRATION",
        "GITHUB_ACTIONS",
        "GITLAB_CI",
        "BUILDKITE",
        "JENKINS_URL",
        "JEST_WORKER_ID",
        "VITEST",
    ];
    if TEST_MARKERS.iter().any(|name| var(name).is_some()) {
        return Environment::Test;
    }

    // Containers, orchestrators and cloud platforms imply production.
    const PRODUCTION_MARKERS: &[&str] = &[
        "KUBERNETES_SERVICE_HOST",
        "PM2_HOME",
        "DYNO",
        "AWS_EXECUTION_ENV",
        "ECS_CONTAINER_METADATA_URI",
        "WEBSITE_INSTANCE_ID",
        "K_SERVICE",
    ];
    if dockerenv() || PRODUCTION_MARKERS.iter().any(|name| var(name).is_some()) {
        return Environment::Production;
    }

    Environment::Development
}

/// Recognized variables that configure collaborators outside the core.
///
/// These are parsed so the whole `PRINTEER_*` surface is understood in one
/// place, but the engine itself does not act on them: cooling/uptime belong
/// to the daemon wrapper, `bundled_only` to browser discovery, `silent` and
/// `force_cleanup` to the CLI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxiliaryEnv {
    /// `PRINTEER_COOLING_PERIOD_MS`.
    pub cooling_period_ms: Option<u64>,
    /// `PRINTEER_MAX_UPTIME` (milliseconds).
    pub max_uptime_ms: Option<u64>,
    /// `PRINTEER_SILENT` truthy.
    pub silent: bool,
    /// `PRINTEER_FORCE_CLEANUP` truthy.
    pub force_cleanup: bool,
    /// `PRINTEER_BUNDLED_ONLY` truthy.
    pub bundled_only: bool,
}

/// Read the auxiliary (non-core) variables.
pub fn auxiliary_from_env() -> AuxiliaryEnv {
    auxiliary_with(&|name| std::env::var(name).ok())
}

fn auxiliary_with(var: &dyn Fn(&str) -> Option<String>) -> AuxiliaryEnv {
    AuxiliaryEnv {
        cooling_period_ms: parse_var(var, "PRINTEER_COOLING_PERIOD_MS"),
        max_uptime_ms: parse_var(var, "PRINTEER_MAX_UPTIME"),
        silent: truthy(var("PRINTEER_SILENT")),
        force_cleanup: truthy(var("PRINTEER_FORCE_CLEANUP")),
        bundled_only: truthy(var("PRINTEER_BUNDLED_ONLY")),
    }
}

/// Build the environment-variable overlay.
///
/// Reads every core `PRINTEER_*` variable; unparseable values are logged
/// and skipped so one bad variable never poisons the layer.
pub fn overlay_from_env() -> ConfigOverlay {
    overlay_with(&|name| std::env::var(name).ok())
}

fn overlay_with(var: &dyn Fn(&str) -> Option<String>) -> ConfigOverlay {
    let mut overlay = ConfigOverlay::default();

    if let Some(value) = var("PRINTEER_MODE") {
        match value.trim().to_ascii_lowercase().as_str() {
            "single-shot" | "oneshot" => overlay.mode = Some(Mode::SingleShot),
            "long-running" | "server" => overlay.mode = Some(Mode::LongRunning),
            other => log::warn!("Ignoring PRINTEER_MODE={other:?}"),
        }
    }
    if let Some(value) = var("PRINTEER_ENV") {
        overlay.environment = Environment::parse(&value);
    }

    if let Some(value) = var("PRINTEER_BROWSER_EXECUTABLE_PATH") {
        overlay.browser_mut().executable_path = Some(value.into());
    }
    if let Some(value) = var("PRINTEER_BROWSER_HEADLESS") {
        match HeadlessMode::parse(&value) {
            Some(mode) => overlay.browser_mut().headless = Some(mode),
            None => log::warn!("Ignoring PRINTEER_BROWSER_HEADLESS={value:?}"),
        }
    }
    if let Some(ms) = parse_var(var, "PRINTEER_BROWSER_TIMEOUT") {
        overlay.browser_mut().timeout_ms = Some(ms);
    }
    if let Some(value) = var("PRINTEER_BROWSER_ARGS") {
        let args: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        overlay.browser_mut().args = Some(args);
    }

    if let Some(min) = parse_var(var, "PRINTEER_BROWSER_POOL_MIN") {
        overlay.browser_mut().pool_mut().min = Some(min);
    }
    if let Some(max) = parse_var(var, "PRINTEER_BROWSER_POOL_MAX") {
        overlay.browser_mut().pool_mut().max = Some(max);
    }
    if let Some(ms) = parse_var(var, "PRINTEER_BROWSER_POOL_IDLE_TIMEOUT") {
        overlay.browser_mut().pool_mut().idle_timeout_ms = Some(ms);
    }
    if let Some(ms) = parse_var(var, "PRINTEER_HEALTH_CHECK_INTERVAL") {
        overlay.browser_mut().pool_mut().cleanup_interval_ms = Some(ms);
    }

    if let Some(value) = parse_var(var, "PRINTEER_MAX_MEMORY_MB") {
        overlay.resources_mut().max_memory_mb = Some(value);
    }
    if let Some(value) = parse_var(var, "PRINTEER_MAX_CPU_PERCENT") {
        overlay.resources_mut().max_cpu_percent = Some(value);
    }
    if let Some(value) = parse_var(var, "PRINTEER_MAX_DISK_MB") {
        overlay.resources_mut().max_disk_mb = Some(value);
    }
    if let Some(value) = parse_var(var, "PRINTEER_MAX_CONCURRENT_REQUESTS") {
        overlay.resources_mut().max_concurrent_requests = Some(value);
    }

    if let Some(value) = var("PRINTEER_LOG_LEVEL") {
        match serde_json::from_value::<LogLevel>(serde_json::Value::String(
            value.trim().to_ascii_lowercase(),
        )) {
            Ok(level) => overlay.logging_mut().level = Some(level),
            Err(_) => log::warn!("Ignoring PRINTEER_LOG_LEVEL={value:?}"),
        }
    }
    if let Some(value) = var("PRINTEER_LOG_FORMAT") {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => overlay.logging_mut().format = Some(LogFormat::Text),
            "json" => overlay.logging_mut().format = Some(LogFormat::Json),
            other => log::warn!("Ignoring PRINTEER_LOG_FORMAT={other:?}"),
        }
    }
    if let Some(value) = var("PRINTEER_LOG_DESTINATION") {
        let destination = match value.trim().to_ascii_lowercase().as_str() {
            "stderr" => LogDestination::Stderr,
            "stdout" => LogDestination::Stdout,
            _ => LogDestination::File(value.into()),
        };
        overlay.logging_mut().destination = Some(destination);
    }

    if let Some(value) = var("PRINTEER_ALLOWED_DOMAINS") {
        overlay.security_mut().allowed_domains = Some(split_domains(&value));
    }
    if let Some(value) = var("PRINTEER_BLOCKED_DOMAINS") {
        overlay.security_mut().blocked_domains = Some(split_domains(&value));
    }
    if let Some(value) = parse_var(var, "PRINTEER_MAX_FILE_SIZE") {
        overlay.security_mut().max_file_size = Some(value);
    }
    if let Some(value) = var("PRINTEER_SANITIZE_INPUT") {
        overlay.security_mut().sanitize_input = Some(truthy(Some(value)));
    }

    overlay
}

fn split_domains(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: std::str::FromStr>(var: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = var(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparseable {name}={raw:?}");
            None
        }
    }
}

fn truthy(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("1") | Some("true") | Some("TRUE") | Some("yes")
    )
}

// ============================================================================
// Unit Tests
// ============================================================================
