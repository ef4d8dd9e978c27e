//! Renderer adapter contract.
//!
//! The engine does not render pages itself: the orchestrator hands a
//! borrowed [`BrowserHandle`], the resolved [`RenderConfig`] and a
//! deadline to a [`Renderer`] implementation, which produces the output
//! file and an [`OutputDescriptor`]. The renderer is guaranteed to be
//! called only between acquire and release/destroy of the handle.
//!
//! Output media are derived from the requested file extension before the
//! renderer runs, so an unsupported extension fails fast as
//! `BadOutputPath` without touching a browser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::factory::BrowserHandle;

/// Output media supported by conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Portable Document Format.
    Pdf,
    /// PNG raster image.
    Png,
    /// JPEG raster image.
    Jpeg,
    /// WebP raster image.
    Webp,
}

impl MediaType {
    /// Map a file extension (without the dot, any case) to a media type.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(MediaType::Pdf),
            "png" => Some(MediaType::Png),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "webp" => Some(MediaType::Webp),
            _ => None,
        }
    }

    /// The IANA media type string.
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
        }
    }
}

/// Timing detail attached to a successful conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderMetrics {
    /// Wall-clock time of the whole render call.
    pub total: Duration,
}

/// What a conversion produced.
#[derive(Debug, Clone)]
pub struct OutputDescriptor {
    /// Where the output landed.
    pub path: PathBuf,
    /// What was produced.
    pub media_type: MediaType,
    /// Output size, when known.
    pub bytes: Option<u64>,
    /// Timing detail, when collected.
    pub metrics: Option<RenderMetrics>,
}

/// Drives a borrowed browser to produce one output file.
///
/// Implementations must honor `deadline` as an upper bound on their own
/// work; the orchestrator additionally enforces it from outside, so a
/// renderer that overruns is cut off either way.
pub trait Renderer: Send + Sync {
    /// Render `url` into `output` with the given parameters.
    fn render(
        &self,
        browser: &dyn BrowserHandle,
        url: &Url,
        params: &RenderConfig,
        output: &Path,
        media_type: MediaType,
        deadline: Duration,
    ) -> Result<OutputDescriptor>;
}

// ============================================================================
// Mock renderer (test-utils)
// ============================================================================

/// In-memory renderer for tests: writes a stub file with the right magic
/// bytes and can be told to fail the first N calls (exercising retry) or
/// to sleep (exercising deadlines and cancellation).
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::error::PrinteerError;

    /// Configurable stub renderer.
    pub struct MockRenderer {
        fail_first: AtomicUsize,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRenderer {
        /// Renderer that always succeeds immediately.
        pub fn new() -> Self {
            Self {
                fail_first: AtomicUsize::new(0),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Renderer whose first `n` calls fail with `renderer_failed`.
        pub fn failing_first(n: usize) -> Self {
            Self {
                fail_first: AtomicUsize::new(n),
                ..Self::new()
            }
        }

        /// Renderer that sleeps `delay` per call before succeeding.
        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        /// URLs rendered so far, in call order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of render calls so far.
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Default for MockRenderer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Renderer for MockRenderer {
        fn render(
            &self,
            _browser: &dyn BrowserHandle,
            url: &Url,
            _params: &RenderConfig,
            output: &Path,
            media_type: MediaType,
            _deadline: Duration,
        ) -> Result<OutputDescriptor> {
            self.calls.lock().unwrap().push(url.to_string());

            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }

            let remaining = self
                .fail_first
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
            if remaining.is_ok() {
                return Err(PrinteerError::RendererFailed(
                    "mock renderer scripted failure".to_string(),
                ));
            }

            let content: &[u8] = match media_type {
                MediaType::Pdf => b"%PDF-1.7\n%mock\n",
                MediaType::Png => b"\x89PNG\r\n\x1a\nmock",
                MediaType::Jpeg => b"\xff\xd8\xff\xe0mock",
                MediaType::Webp => b"RIFFmockWEBP",
            };
            std::fs::write(output, content)
                .map_err(|e| PrinteerError::RendererFailed(e.to_string()))?;

            Ok(OutputDescriptor {
                path: output.to_path_buf(),
                media_type,
                bytes: Some(content.len() as u64),
                metrics: Some(RenderMetrics {
                    total: Duration::from_millis(1),
                }),
            })
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
