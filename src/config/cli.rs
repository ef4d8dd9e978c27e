//! CLI argument mapping.
//!
//! A single table ([`MAPPINGS`]) associates each supported flag with the
//! dotted config path it writes and a parser/serializer pair. Parsing
//! produces a [`ConfigOverlay`] (the highest-precedence layer); serializing
//! walks an [`EffectiveConfig`] back into flag/value pairs.
//!
//! Round-trip law: for any valid config `C`, applying
//! `CliOverrides::parse(CliOverrides::serialize(&C))` onto the defaults of
//! `C`'s environment reproduces `C` on every mapped path.
//!
//! Flags accept both `--flag value` and `--flag=value`. Boolean flags take
//! an explicit `true`/`false` value so that serialization stays
//! unambiguous. Unknown `--` flags are schema errors; bare positional
//! tokens are left for the embedding CLI to interpret.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::overlay::ConfigOverlay;
use super::{EffectiveConfig, Environment, HeadlessMode, LogDestination, Mode};
use crate::error::{PrinteerError, Result};

/// One row of the flag table.
pub struct FlagMapping {
    /// The CLI flag, including leading dashes.
    pub flag: &'static str,
    /// Dotted path into the effective config, for documentation and
    /// diagnostics.
    pub path: &'static str,
    /// Write the textual value into an overlay.
    parse: fn(&str, &mut ConfigOverlay) -> Result<()>,
    /// Read the current value back out of a config; `None` for unset
    /// optional fields.
    serialize: fn(&EffectiveConfig) -> Option<String>,
}

fn enum_value<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        other => panic!("enum did not serialize to a string: {other:?}"),
    }
}

fn parse_enum<T: DeserializeOwned>(flag: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(
        value.trim().to_ascii_lowercase(),
    ))
    .map_err(|_| PrinteerError::Validation(format!("invalid value {value:?} for {flag}")))
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PrinteerError::Validation(format!("invalid value {value:?} for {flag}")))
}

fn parse_bool(flag: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PrinteerError::Validation(format!(
            "invalid boolean {value:?} for {flag}"
        ))),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The flag ↔ path table.
///
/// Paths not listed here (header/footer templates, auth material, blocked
/// resource classes) are file/API-only: they do not round-trip through a
/// command line comfortably.
pub const MAPPINGS: &[FlagMapping] = &[
    FlagMapping {
        flag: "--mode",
        path: "mode",
        parse: |v, o| {
            o.mode = Some(parse_enum::<Mode>("--mode", v)?);
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.mode)),
    },
    FlagMapping {
        flag: "--environment",
        path: "environment",
        parse: |v, o| {
            o.environment = Some(
                Environment::parse(v)
                    .ok_or_else(|| PrinteerError::Validation(format!("invalid environment {v:?}")))?,
            );
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.environment)),
    },
    FlagMapping {
        flag: "--browser-executable-path",
        path: "browser.executable_path",
        parse: |v, o| {
            o.browser_mut().executable_path = Some(v.into());
            Ok(())
        },
        serialize: |c| {
            c.browser
                .executable_path
                .as_ref()
                .map(|p| p.display().to_string())
        },
    },
    FlagMapping {
        flag: "--browser-headless",
        path: "browser.headless",
        parse: |v, o| {
            o.browser_mut().headless = Some(
                HeadlessMode::parse(v)
                    .ok_or_else(|| PrinteerError::Validation(format!("invalid headless mode {v:?}")))?,
            );
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.browser.headless)),
    },
    FlagMapping {
        flag: "--browser-timeout",
        path: "browser.timeout_ms",
        parse: |v, o| {
            o.browser_mut().timeout_ms = Some(parse_num("--browser-timeout", v)?);
            Ok(())
        },
        serialize: |c| Some(c.browser.timeout.as_millis().to_string()),
    },
    FlagMapping {
        flag: "--browser-args",
        path: "browser.args",
        parse: |v, o| {
            o.browser_mut().args = Some(split_list(v));
            Ok(())
        },
        serialize: |c| Some(c.browser.args.join(",")),
    },
    FlagMapping {
        flag: "--pool-min",
        path: "browser.pool.min",
        parse: |v, o| {
            o.browser_mut().pool_mut().min = Some(parse_num("--pool-min", v)?);
            Ok(())
        },
        serialize: |c| Some(c.browser.pool.min.to_string()),
    },
    FlagMapping {
        flag: "--pool-max",
        path: "browser.pool.max",
        parse: |v, o| {
            o.browser_mut().pool_mut().max = Some(parse_num("--pool-max", v)?);
            Ok(())
        },
        serialize: |c| Some(c.browser.pool.max.to_string()),
    },
    FlagMapping {
        flag: "--pool-idle-timeout",
        path: "browser.pool.idle_timeout_ms",
        parse: |v, o| {
            o.browser_mut().pool_mut().idle_timeout_ms =
                Some(parse_num("--pool-idle-timeout", v)?);
            Ok(())
        },
        serialize: |c| Some(c.browser.pool.idle_timeout.as_millis().to_string()),
    },
    FlagMapping {
        flag: "--pool-cleanup-interval",
        path: "browser.pool.cleanup_interval_ms",
        parse: |v, o| {
            o.browser_mut().pool_mut().cleanup_interval_ms =
                Some(parse_num("--pool-cleanup-interval", v)?);
            Ok(())
        },
        serialize: |c| Some(c.browser.pool.cleanup_interval.as_millis().to_string()),
    },
    FlagMapping {
        flag: "--max-memory-mb",
        path: "resources.max_memory_mb",
        parse: |v, o| {
            o.resources_mut().max_memory_mb = Some(parse_num("--max-memory-mb", v)?);
            Ok(())
        },
        serialize: |c| Some(c.resources.max_memory_mb.to_string()),
    },
    FlagMapping {
        flag: "--max-cpu-percent",
        path: "resources.max_cpu_percent",
        parse: |v, o| {
            o.resources_mut().max_cpu_percent = Some(parse_num("--max-cpu-percent", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.resources.max_cpu_percent)),
    },
    FlagMapping {
        flag: "--max-disk-mb",
        path: "resources.max_disk_mb",
        parse: |v, o| {
            o.resources_mut().max_disk_mb = Some(parse_num("--max-disk-mb", v)?);
            Ok(())
        },
        serialize: |c| Some(c.resources.max_disk_mb.to_string()),
    },
    FlagMapping {
        flag: "--max-concurrent-requests",
        path: "resources.max_concurrent_requests",
        parse: |v, o| {
            o.resources_mut().max_concurrent_requests =
                Some(parse_num("--max-concurrent-requests", v)?);
            Ok(())
        },
        serialize: |c| Some(c.resources.max_concurrent_requests.to_string()),
    },
    FlagMapping {
        flag: "--max-browser-instances",
        path: "resources.max_browser_instances",
        parse: |v, o| {
            o.resources_mut().max_browser_instances =
                Some(parse_num("--max-browser-instances", v)?);
            Ok(())
        },
        serialize: |c| Some(c.resources.max_browser_instances.to_string()),
    },
    FlagMapping {
        flag: "--memory-warn",
        path: "thresholds.memory_warn",
        parse: |v, o| {
            o.thresholds_mut().memory_warn = Some(parse_num("--memory-warn", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.thresholds.memory_warn)),
    },
    FlagMapping {
        flag: "--memory-critical",
        path: "thresholds.memory_critical",
        parse: |v, o| {
            o.thresholds_mut().memory_critical = Some(parse_num("--memory-critical", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.thresholds.memory_critical)),
    },
    FlagMapping {
        flag: "--cpu-warn",
        path: "thresholds.cpu_warn",
        parse: |v, o| {
            o.thresholds_mut().cpu_warn = Some(parse_num("--cpu-warn", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.thresholds.cpu_warn)),
    },
    FlagMapping {
        flag: "--cpu-critical",
        path: "thresholds.cpu_critical",
        parse: |v, o| {
            o.thresholds_mut().cpu_critical = Some(parse_num("--cpu-critical", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.thresholds.cpu_critical)),
    },
    FlagMapping {
        flag: "--disk-warn",
        path: "thresholds.disk_warn",
        parse: |v, o| {
            o.thresholds_mut().disk_warn = Some(parse_num("--disk-warn", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.thresholds.disk_warn)),
    },
    FlagMapping {
        flag: "--disk-critical",
        path: "thresholds.disk_critical",
        parse: |v, o| {
            o.thresholds_mut().disk_critical = Some(parse_num("--disk-critical", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.thresholds.disk_critical)),
    },
    FlagMapping {
        flag: "--log-level",
        path: "logging.level",
        parse: |v, o| {
            o.logging_mut().level = Some(parse_enum("--log-level", v)?);
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.logging.level)),
    },
    FlagMapping {
        flag: "--log-format",
        path: "logging.format",
        parse: |v, o| {
            o.logging_mut().format = Some(parse_enum("--log-format", v)?);
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.logging.format)),
    },
    FlagMapping {
        flag: "--log-destination",
        path: "logging.destination",
        parse: |v, o| {
            let destination = match v.trim() {
                "stderr" => LogDestination::Stderr,
                "stdout" => LogDestination::Stdout,
                path => LogDestination::File(path.into()),
            };
            o.logging_mut().destination = Some(destination);
            Ok(())
        },
        serialize: |c| {
            Some(match &c.logging.destination {
                LogDestination::Stderr => "stderr".to_string(),
                LogDestination::Stdout => "stdout".to_string(),
                LogDestination::File(path) => path.display().to_string(),
            })
        },
    },
    FlagMapping {
        flag: "--allowed-domains",
        path: "security.allowed_domains",
        parse: |v, o| {
            o.security_mut().allowed_domains = Some(split_list(v));
            Ok(())
        },
        serialize: |c| Some(c.security.allowed_domains.join(",")),
    },
    FlagMapping {
        flag: "--blocked-domains",
        path: "security.blocked_domains",
        parse: |v, o| {
            o.security_mut().blocked_domains = Some(split_list(v));
            Ok(())
        },
        serialize: |c| Some(c.security.blocked_domains.join(",")),
    },
    FlagMapping {
        flag: "--max-file-size",
        path: "security.max_file_size",
        parse: |v, o| {
            o.security_mut().max_file_size = Some(parse_num("--max-file-size", v)?);
            Ok(())
        },
        serialize: |c| Some(c.security.max_file_size.to_string()),
    },
    FlagMapping {
        flag: "--sanitize-input",
        path: "security.sanitize_input",
        parse: |v, o| {
            o.security_mut().sanitize_input = Some(parse_bool("--sanitize-input", v)?);
            Ok(())
        },
        serialize: |c| Some(c.security.sanitize_input.to_string()),
    },
    FlagMapping {
        flag: "--page-format",
        path: "render.page.format",
        parse: |v, o| {
            o.render_mut().page_mut().format = Some(parse_enum("--page-format", v)?);
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.render.page.format)),
    },
    FlagMapping {
        flag: "--page-orientation",
        path: "render.page.orientation",
        parse: |v, o| {
            o.render_mut().page_mut().orientation = Some(parse_enum("--page-orientation", v)?);
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.render.page.orientation)),
    },
    FlagMapping {
        flag: "--print-background",
        path: "render.page.print_background",
        parse: |v, o| {
            o.render_mut().page_mut().print_background =
                Some(parse_bool("--print-background", v)?);
            Ok(())
        },
        serialize: |c| Some(c.render.page.print_background.to_string()),
    },
    FlagMapping {
        flag: "--page-scale",
        path: "render.page.scale",
        parse: |v, o| {
            o.render_mut().page_mut().scale = Some(parse_num("--page-scale", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.render.page.scale)),
    },
    FlagMapping {
        flag: "--image-format",
        path: "render.image.format",
        parse: |v, o| {
            o.render_mut().image_mut().format = Some(parse_enum("--image-format", v)?);
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.render.image.format)),
    },
    FlagMapping {
        flag: "--image-quality",
        path: "render.image.quality",
        parse: |v, o| {
            o.render_mut().image_mut().quality = Some(parse_num("--image-quality", v)?);
            Ok(())
        },
        serialize: |c| Some(c.render.image.quality.to_string()),
    },
    FlagMapping {
        flag: "--image-full-page",
        path: "render.image.full_page",
        parse: |v, o| {
            o.render_mut().image_mut().full_page = Some(parse_bool("--image-full-page", v)?);
            Ok(())
        },
        serialize: |c| Some(c.render.image.full_page.to_string()),
    },
    FlagMapping {
        flag: "--viewport-width",
        path: "render.viewport.width",
        parse: |v, o| {
            o.render_mut().viewport_mut().width = Some(parse_num("--viewport-width", v)?);
            Ok(())
        },
        serialize: |c| Some(c.render.viewport.width.to_string()),
    },
    FlagMapping {
        flag: "--viewport-height",
        path: "render.viewport.height",
        parse: |v, o| {
            o.render_mut().viewport_mut().height = Some(parse_num("--viewport-height", v)?);
            Ok(())
        },
        serialize: |c| Some(c.render.viewport.height.to_string()),
    },
    FlagMapping {
        flag: "--device-scale-factor",
        path: "render.viewport.device_scale_factor",
        parse: |v, o| {
            o.render_mut().viewport_mut().device_scale_factor =
                Some(parse_num("--device-scale-factor", v)?);
            Ok(())
        },
        serialize: |c| Some(format_float(c.render.viewport.device_scale_factor)),
    },
    FlagMapping {
        flag: "--viewport-mobile",
        path: "render.viewport.mobile",
        parse: |v, o| {
            o.render_mut().viewport_mut().mobile = Some(parse_bool("--viewport-mobile", v)?);
            Ok(())
        },
        serialize: |c| Some(c.render.viewport.mobile.to_string()),
    },
    FlagMapping {
        flag: "--wait-until",
        path: "render.wait.until",
        parse: |v, o| {
            o.render_mut().wait_mut().until = Some(parse_enum("--wait-until", v)?);
            Ok(())
        },
        serialize: |c| Some(enum_value(&c.render.wait.until)),
    },
    FlagMapping {
        flag: "--wait-timeout",
        path: "render.wait.timeout_ms",
        parse: |v, o| {
            o.render_mut().wait_mut().timeout_ms = Some(parse_num("--wait-timeout", v)?);
            Ok(())
        },
        serialize: |c| Some(c.render.wait.timeout.as_millis().to_string()),
    },
    FlagMapping {
        flag: "--wait-selector",
        path: "render.wait.selector",
        parse: |v, o| {
            o.render_mut().wait_mut().selector = Some(v.to_string());
            Ok(())
        },
        serialize: |c| c.render.wait.selector.clone(),
    },
];

/// Floats serialized without scientific notation so they re-parse exactly.
fn format_float(value: f64) -> String {
    // `{}` on an f64 round-trips (shortest representation), unlike `{:e}`.
    format!("{value}")
}

/// Parsed CLI overrides: the highest-precedence configuration layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    overlay: ConfigOverlay,
}

impl CliOverrides {
    /// Parse an argument list through the mapping table.
    ///
    /// Accepts `--flag value` and `--flag=value`. Unknown `--` flags are
    /// schema errors; bare tokens are ignored (positional arguments belong
    /// to the embedding CLI).
    ///
    /// # Errors
    ///
    /// - [`PrinteerError::Schema`] for an unrecognized flag or a flag with
    ///   a missing value.
    /// - [`PrinteerError::Validation`] for an unparseable value.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overlay = ConfigOverlay::default();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            let arg = arg.as_ref();
            if !arg.starts_with("--") {
                continue;
            }

            let (flag, inline_value) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg.to_string(), None),
            };

            let mapping = MAPPINGS
                .iter()
                .find(|m| m.flag == flag)
                .ok_or_else(|| PrinteerError::Schema(format!("unknown flag {flag}")))?;

            let value = match inline_value {
                Some(value) => value,
                None => iter
                    .next()
                    .map(|v| v.as_ref().to_string())
                    .ok_or_else(|| {
                        PrinteerError::Schema(format!("flag {flag} is missing its value"))
                    })?,
            };

            (mapping.parse)(&value, &mut overlay)?;
        }

        Ok(Self { overlay })
    }

    /// Serialize a config back into flag/value pairs covering every mapped
    /// path with a present value.
    pub fn serialize(config: &EffectiveConfig) -> Vec<String> {
        let mut args = Vec::new();
        for mapping in MAPPINGS {
            if let Some(value) = (mapping.serialize)(config) {
                args.push(mapping.flag.to_string());
                args.push(value);
            }
        }
        args
    }

    /// The overlay this argument list produced.
    pub fn overlay(&self) -> &ConfigOverlay {
        &self.overlay
    }

    /// Consume into the overlay.
    pub fn into_overlay(self) -> ConfigOverlay {
        self.overlay
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
