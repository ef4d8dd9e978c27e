//! # printeer
//!
//! Conversion engine that turns web pages into PDF or raster images by
//! driving headless browsers, built for embedding: a CLI, a service or a
//! test harness supplies the renderer adapter and gets back a small,
//! strongly-typed surface.
//!
//! ## What the engine owns
//!
//! - **Layered configuration**: built-in per-environment defaults, user
//!   and project config files (JSON/YAML), `PRINTEER_*` environment
//!   variables and CLI flags merge into one immutable effective config,
//!   validated before publication and hot-reloadable with debounce.
//! - **Health-monitored browser pool**: LIFO reuse, bounded creation
//!   through a fallback launch ladder, probe-gated release, idle culling,
//!   and aggressive destruction with process-gone verification — no
//!   browser process ever leaks, even across SIGINT/SIGTERM.
//! - **Resource monitoring**: periodic memory/CPU/disk sampling with a
//!   bounded history ring, live browser/request counters, and pressure
//!   events that drive degradation and pool shrinking.
//! - **Batch scheduling**: parametric job expansion, dependency graphs
//!   with up-front cycle detection, priority-ordered dispatch under a
//!   resource-aware concurrency window, retries with backoff,
//!   cancellation, and a full per-job report.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Printeer (engine)                    │
//! │                                                             │
//! │  ConfigResolver ──▶ EffectiveConfig (atomic Arc swap)       │
//! │        │                                                    │
//! │        ▼                                                    │
//! │  convert(url, out) ──▶ strategy ──▶ oneshot ── launch ladder│
//! │        │                   │                                │
//! │        │                   └──────▶ BrowserPool ◀─┐         │
//! │        ▼                                │         │ shrink  │
//! │  Renderer adapter (consumed trait)      │         │         │
//! │                                         ▼         │         │
//! │  BatchScheduler ──▶ effective concurrency    LimitEnforcer  │
//! │        ▲                      ▲                   ▲         │
//! │        └── ResourceMonitor ───┴── pressure events ┘         │
//! │                    │                                        │
//! │                    └──▶ CleanupManager (temp residue)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use printeer::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> printeer::Result<()> {
//!     let engine = Printeer::builder()
//!         .renderer(Arc::new(MyRendererAdapter::new()))
//!         .watch_config()
//!         .build()?;
//!     engine.install_signal_handlers();
//!
//!     // Single conversion
//!     let output = engine
//!         .convert("https://example.com", "/tmp/example.pdf", None)
//!         .await?;
//!     println!("wrote {} ({})", output.path.display(), output.media_type.mime());
//!
//!     // Batch
//!     let jobs = vec![
//!         BatchJob::new("cover", "https://example.com", "cover.pdf"),
//!         BatchJob::new("body", "https://example.com/body", "body.pdf")
//!             .depends_on(["cover"]),
//!     ];
//!     let report = engine.run_batch(jobs, BatchOptions::default()).await?;
//!     println!("{}/{} completed", report.completed, report.total);
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Consumed interfaces
//!
//! The engine deliberately does not render pages or discover browser
//! binaries. It consumes two traits:
//!
//! | Trait | Responsibility | Shipped implementation |
//! |-------|----------------|------------------------|
//! | [`BrowserFactory`] | launch, probe, close, kill browsers | [`ChromeBrowserFactory`] over `headless_chrome` |
//! | [`Renderer`] | drive a borrowed browser into one output file | none (adapter-specific); mock under `test-utils` |
//!
//! ## Feature flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` (default) | load an optional `printeer.env` file via `dotenvy` |
//! | `test-utils` | mock factory/renderer and monitor sample injection |
//!
//! ## Error handling
//!
//! All fallible operations return [`Result<T, PrinteerError>`](Result).
//! Surfaced errors carry a kind, a one-line message, structured details
//! where useful (tried launch profiles, cycle members) and a remediation
//! hint via [`PrinteerError::remediation`].

#![doc(html_root_url = "https://docs.rs/printeer/0.4.1")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod batch;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod limits;
pub mod monitor;
pub mod optimizer;
pub mod pool;
pub mod prelude;
pub mod renderer;
pub mod stats;
pub mod strategy;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

// Engine surface
pub use engine::{EngineDiagnostics, Printeer, PrinteerBuilder};
pub use error::{PrinteerError, Result};

// Configuration
pub use config::{CliOverrides, ConfigResolver, EffectiveConfig, RenderOverlay};

// Pool and its collaborators
pub use factory::{BrowserFactory, BrowserHandle, ChromeBrowserFactory, LaunchOptions, LaunchProfile};
pub use pool::{BrowserPool, PooledBrowser};
pub use stats::{PoolMetricsSnapshot, PoolStatus};

// Monitoring and policy
pub use limits::{DegradationSnapshot, LimitEnforcer};
pub use monitor::{Pressure, ResourceMonitor, ResourceSample};
pub use optimizer::PoolOptimizer;

// Batch
pub use batch::{
    BatchCancellation, BatchJob, BatchJobResult, BatchOptions, BatchOutcome, BatchReport,
    BatchScheduler, JobStatus,
};

// Conversion
pub use renderer::{MediaType, OutputDescriptor, Renderer};
pub use strategy::{select_strategy, Strategy};
