//! Curated imports for typical embedders.
//!
//! Pulls in the engine entry points, the job/report types batch callers
//! need, and the consumed-interface traits, so most integrations start
//! with a single line:
//!
//! ```rust
//! use printeer::prelude::*;
//! ```
//!
//! Subsystem internals (the monitor, optimizer, limit enforcer, config
//! overlays) stay behind their modules; reach for them directly when you
//! are wiring diagnostics or custom policy rather than converting pages.

pub use crate::batch::{
    BatchCancellation, BatchJob, BatchJobResult, BatchOptions, BatchOutcome, BatchReport,
    JobStatus,
};
pub use crate::config::{CliOverrides, EffectiveConfig, Environment, RenderOverlay};
pub use crate::engine::{Printeer, PrinteerBuilder};
pub use crate::error::{PrinteerError, Result};
pub use crate::factory::{BrowserFactory, BrowserHandle, ChromeBrowserFactory};
pub use crate::renderer::{MediaType, OutputDescriptor, Renderer};
pub use crate::stats::PoolStatus;
pub use crate::strategy::Strategy;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    /// Verifies the prelude exposes the names the examples use.
    #[test]
    fn test_prelude_names_resolve() {
        use super::*;

        let _options = BatchOptions::default();
        let _job = BatchJob::new("id", "http://example.com", "out.pdf");
        let _status: Option<JobStatus> = None;
        let _media = MediaType::from_extension("pdf");
        fn takes_factory<T: BrowserFactory>(_: &T) {}
        let _ = takes_factory::<crate::factory::mock::MockBrowserFactory>;
    }
}
