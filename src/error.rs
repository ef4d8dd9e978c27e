//! Error types for the conversion engine.
//!
//! This module provides [`PrinteerError`], a unified error type covering all
//! engine subsystems (configuration, browser pool, batch scheduler and the
//! conversion orchestrator), and a convenient [`Result`] type alias.
//!
//! # Taxonomy
//!
//! | Group | Variants |
//! |-------|----------|
//! | Configuration | [`Schema`](PrinteerError::Schema), [`Validation`](PrinteerError::Validation), [`ConfigIo`](PrinteerError::ConfigIo), [`ReloadRejected`](PrinteerError::ReloadRejected) |
//! | Pool | [`CreationFailed`](PrinteerError::CreationFailed), [`PoolTimeout`](PrinteerError::PoolTimeout), [`UnhealthyOnAcquire`](PrinteerError::UnhealthyOnAcquire), [`ShuttingDown`](PrinteerError::ShuttingDown), [`DestructionIncomplete`](PrinteerError::DestructionIncomplete) |
//! | Scheduler | [`CycleDetected`](PrinteerError::CycleDetected), [`DuplicateId`](PrinteerError::DuplicateId), [`JobFailure`](PrinteerError::JobFailure), [`BatchAborted`](PrinteerError::BatchAborted), [`Cancelled`](PrinteerError::Cancelled) |
//! | Conversion | [`BadOutputPath`](PrinteerError::BadOutputPath), [`NavigationFailed`](PrinteerError::NavigationFailed), [`HttpStatus`](PrinteerError::HttpStatus), [`Timeout`](PrinteerError::Timeout), [`RendererFailed`](PrinteerError::RendererFailed), [`CleanupFailed`](PrinteerError::CleanupFailed) |
//!
//! Monitoring degradation is intentionally *not* an error: the resource
//! monitor degrades to its last good sample and flags it, rather than
//! propagating OS sampling failures to callers.
//!
//! # Example
//!
//! ```rust
//! use printeer::{PrinteerError, Result};
//!
//! fn acquire() -> Result<()> {
//!     Err(PrinteerError::ShuttingDown)
//! }
//!
//! match acquire() {
//!     Ok(()) => println!("acquired"),
//!     Err(PrinteerError::ShuttingDown) => println!("engine is draining"),
//!     Err(e) => eprintln!("error: {}", e),
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur during engine operations.
///
/// Each variant carries enough context to produce a single-line human
/// message; some also expose structured details (the launch configurations a
/// failed creation tried, the members of a dependency cycle). Where a
/// configuration change is the usual fix, [`remediation`](Self::remediation)
/// returns a hint.
#[derive(Debug, thiserror::Error)]
pub enum PrinteerError {
    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------
    /// A configuration source could not be decoded into the known shape.
    ///
    /// Unknown fields are rejected rather than silently carried, so a typo
    /// in a config file surfaces here instead of being ignored.
    #[error("Configuration schema error: {0}")]
    Schema(String),

    /// A decoded configuration violated a semantic invariant.
    ///
    /// Examples: `pool.min > pool.max`, a threshold outside `(0, 1)`, a
    /// warning threshold at or above its critical counterpart, a malformed
    /// domain pattern.
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// A configuration source could not be read.
    ///
    /// Non-fatal during layered resolution (the source is skipped with a
    /// warning); fatal only when an explicitly requested file is unreadable.
    #[error("Failed to read configuration source {path:?}: {message}")]
    ConfigIo {
        /// The file that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        message: String,
    },

    /// A reload produced an invalid configuration.
    ///
    /// The previously active configuration stays in force; this error is
    /// delivered to change subscribers instead of being raised.
    #[error("Configuration reload rejected, previous config kept: {0}")]
    ReloadRejected(String),

    // ------------------------------------------------------------------
    // Pool
    // ------------------------------------------------------------------
    /// Every launch configuration in the factory's ladder failed.
    ///
    /// `tried` lists the profiles in the order they were attempted;
    /// `last_error` is the factory's final failure.
    #[error("Failed to create browser after trying {tried:?}: {last_error}")]
    CreationFailed {
        /// Launch profiles attempted, in order.
        tried: Vec<String>,
        /// The last factory error observed.
        last_error: String,
    },

    /// No instance became available within the acquisition timeout.
    ///
    /// The pool's accounting is unchanged by a timed-out wait.
    #[error("Timed out after {waited:?} waiting for a pooled browser")]
    PoolTimeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// An instance failed its acquire-time health probe.
    ///
    /// The pool retries once internally before surfacing this.
    #[error("Acquired browser failed its health probe")]
    UnhealthyOnAcquire,

    /// Operation attempted while the pool or engine is draining.
    #[error("Pool is shutting down")]
    ShuttingDown,

    /// Aggressive destruction could not verify process termination.
    ///
    /// The instance stays in the accounting until termination is verified,
    /// so this surfaces rather than leaking a browser process silently.
    #[error("Could not verify termination of browser instance {instance_id}")]
    DestructionIncomplete {
        /// Pool-assigned id of the instance.
        instance_id: u64,
    },

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------
    /// The dependency graph of an expanded batch contains a cycle.
    ///
    /// Detected before any job is dispatched; `cycle` names the involved
    /// job ids.
    #[error("Dependency cycle detected among jobs: {cycle:?}")]
    CycleDetected {
        /// Job ids participating in (or reachable only through) the cycle.
        cycle: Vec<String>,
    },

    /// Two expanded jobs share the same id.
    #[error("Duplicate job id after expansion: {0}")]
    DuplicateId(String),

    /// A job exhausted its retry budget.
    #[error("Job {job_id} failed: {message}")]
    JobFailure {
        /// Expanded id of the failed job.
        job_id: String,
        /// Message from the last attempt.
        message: String,
    },

    /// The batch stopped early because `continue_on_error` is disabled.
    #[error("Batch aborted after job {job_id} failed")]
    BatchAborted {
        /// The job whose failure aborted the batch.
        job_id: String,
    },

    /// The operation was cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,

    // ------------------------------------------------------------------
    // Conversion
    // ------------------------------------------------------------------
    /// The output path is unusable (unsupported extension, empty name,
    /// missing parent directory).
    #[error("Bad output path: {0}")]
    BadOutputPath(String),

    /// The browser could not navigate to the requested URL.
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// The target responded with a non-success HTTP status.
    #[error("Target returned HTTP status {0}")]
    HttpStatus(u16),

    /// The render deadline elapsed.
    #[error("Conversion timed out after {elapsed:?}")]
    Timeout {
        /// Time spent before the deadline fired.
        elapsed: Duration,
    },

    /// The renderer adapter reported a failure.
    #[error("Renderer failed: {0}")]
    RendererFailed(String),

    /// Post-render cleanup failed.
    ///
    /// Never propagated to conversion callers; logged by the orchestrator.
    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),
}

impl PrinteerError {
    /// A remediation hint for errors whose usual fix is a config change.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use printeer::PrinteerError;
    ///
    /// let err = PrinteerError::PoolTimeout { waited: Duration::from_secs(30) };
    /// assert!(err.remediation().unwrap().contains("browser.pool.max"));
    /// ```
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            PrinteerError::PoolTimeout { .. } => {
                Some("increase `browser.pool.max` or lower batch concurrency")
            }
            PrinteerError::CreationFailed { .. } => {
                Some("check `browser.executable_path` and that a Chrome/Chromium binary is installed")
            }
            PrinteerError::Timeout { .. } => Some("increase `render.wait.timeout`"),
            PrinteerError::BatchAborted { .. } => {
                Some("set `continue_on_error` to keep going past individual job failures")
            }
            _ => None,
        }
    }

    /// Whether the error group is configuration-related.
    ///
    /// Used by the resolver to decide between fatal (initial load) and
    /// non-fatal (reload) handling.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PrinteerError::Schema(_)
                | PrinteerError::Validation(_)
                | PrinteerError::ConfigIo { .. }
                | PrinteerError::ReloadRejected(_)
        )
    }
}

/// Convenience conversion from [`String`] to [`PrinteerError::Validation`].
impl From<String> for PrinteerError {
    fn from(msg: String) -> Self {
        PrinteerError::Validation(msg)
    }
}

/// Convenience conversion from `&str` to [`PrinteerError::Validation`].
impl From<&str> for PrinteerError {
    fn from(msg: &str) -> Self {
        PrinteerError::Validation(msg.to_string())
    }
}

/// Result type alias using [`PrinteerError`].
pub type Result<T> = std::result::Result<T, PrinteerError>;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies error type conversions from String and &str.
    #[test]
    fn test_error_conversion() {
        let error: PrinteerError = "bad threshold".into();
        match error {
            PrinteerError::Validation(msg) => assert_eq!(msg, "bad threshold"),
            _ => panic!("Expected Validation error variant"),
        }

        let error: PrinteerError = "min above max".to_string().into();
        assert!(matches!(error, PrinteerError::Validation(_)));
    }

    /// Verifies Display formatting for the most commonly surfaced errors.
    #[test]
    fn test_error_display() {
        let error = PrinteerError::CreationFailed {
            tried: vec!["optimal".into(), "minimal".into()],
            last_error: "binary not found".into(),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("optimal"));
        assert!(rendered.contains("binary not found"));

        let error = PrinteerError::ShuttingDown;
        assert_eq!(error.to_string(), "Pool is shutting down");

        let error = PrinteerError::HttpStatus(503);
        assert_eq!(error.to_string(), "Target returned HTTP status 503");

        let error = PrinteerError::DuplicateId("report-a".into());
        assert!(error.to_string().contains("report-a"));
    }

    /// Verifies remediation hints exist where documented.
    #[test]
    fn test_remediation_hints() {
        let err = PrinteerError::PoolTimeout {
            waited: Duration::from_secs(30),
        };
        assert!(err.remediation().is_some());

        let err = PrinteerError::Timeout {
            elapsed: Duration::from_secs(60),
        };
        assert_eq!(err.remediation(), Some("increase `render.wait.timeout`"));

        assert!(PrinteerError::Cancelled.remediation().is_none());
    }

    /// Verifies configuration-group classification.
    #[test]
    fn test_configuration_grouping() {
        assert!(PrinteerError::Schema("x".into()).is_configuration());
        assert!(PrinteerError::ReloadRejected("x".into()).is_configuration());
        assert!(!PrinteerError::ShuttingDown.is_configuration());
        assert!(!PrinteerError::Cancelled.is_configuration());
    }

    /// Verifies that PrinteerError implements std::error::Error and is
    /// Send + Sync for cross-thread propagation.
    #[test]
    fn test_error_markers() {
        fn assert_std_error<T: std::error::Error>() {}
        fn assert_send_sync<T: Send + Sync>() {}
        assert_std_error::<PrinteerError>();
        assert_send_sync::<PrinteerError>();
    }
}
