//! Temp-file and browser-residue reclamation.
//!
//! Headless browsers leave profile directories and scratch files behind
//! when they crash or are force-killed. [`CleanupManager`] sweeps the
//! system temp directory for anything matching the known residue patterns,
//! either on demand (the limit enforcer triggers a sweep on disk pressure)
//! or on a schedule.
//!
//! Every per-entry failure is caught and logged; a sweep never raises.
//! Scheduling twice without stopping is a no-op.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// File and directory name patterns considered browser residue.
///
/// A `*` matches any run of characters; patterns here only use a single
/// leading or trailing wildcard.
pub const TEMP_PATTERNS: &[&str] = &[
    "printeer-*",
    "puppeteer_dev_*",
    "chrome_*",
    "chromium_*",
    "*.tmp",
    "*.temp",
];

fn matches_pattern(name: &str, pattern: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        name.starts_with(prefix)
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        name.ends_with(suffix)
    } else {
        name == pattern
    }
}

fn is_candidate(name: &str) -> bool {
    TEMP_PATTERNS.iter().any(|p| matches_pattern(name, p))
}

struct CleanupInner {
    temp_dir: PathBuf,
    scheduled: AtomicBool,
    signal: Arc<(Mutex<bool>, Condvar)>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Reclaims browser residue from the temp area.
///
/// Cloning shares the underlying state so the pool, the limit enforcer and
/// the engine can all hold a handle.
///
/// # Example
///
/// ```rust,no_run
/// use printeer::cleanup::CleanupManager;
///
/// let cleanup = CleanupManager::new();
/// let removed = cleanup.cleanup_temp_files();
/// log::debug!("removed {removed} residue entries");
/// ```
#[derive(Clone)]
pub struct CleanupManager {
    inner: Arc<CleanupInner>,
}

impl Default for CleanupManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupManager {
    /// Manager over the system temp directory.
    pub fn new() -> Self {
        Self::with_temp_dir(std::env::temp_dir())
    }

    /// Manager over an explicit directory (used by tests).
    pub fn with_temp_dir(temp_dir: PathBuf) -> Self {
        Self {
            inner: Arc::new(CleanupInner {
                temp_dir,
                scheduled: AtomicBool::new(false),
                signal: Arc::new((Mutex::new(false), Condvar::new())),
                thread: Mutex::new(None),
            }),
        }
    }

    /// Enumerate residue candidates currently present.
    fn candidates(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.inner.temp_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "Cannot read temp dir {}: {e}",
                    self.inner.temp_dir.display()
                );
                return Vec::new();
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(is_candidate)
                    .unwrap_or(false)
            })
            .map(|entry| entry.path())
            .collect()
    }

    fn remove_entry(path: &Path) -> bool {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match result {
            Ok(()) => {
                log::debug!("Removed temp residue {}", path.display());
                true
            }
            Err(e) => {
                log::warn!("Failed to remove {}: {e}", path.display());
                false
            }
        }
    }

    /// Remove every residue candidate. Returns the number removed.
    pub fn cleanup_temp_files(&self) -> usize {
        let removed = self
            .candidates()
            .iter()
            .filter(|path| Self::remove_entry(path))
            .count();
        if removed > 0 {
            log::info!("Temp sweep removed {removed} entries");
        }
        removed
    }

    /// Remove residue *directories* (crashed browser profiles). Returns
    /// the number removed.
    pub fn cleanup_browser_resources(&self) -> usize {
        self.candidates()
            .iter()
            .filter(|path| path.is_dir())
            .filter(|path| Self::remove_entry(path))
            .count()
    }

    /// Request memory reclamation.
    ///
    /// Rust has no collector to invoke, so this is advisory: it exists so
    /// enforcement actions have a uniform shape, and logs that the request
    /// was a no-op on this runtime.
    pub fn cleanup_memory(&self) {
        log::debug!("Memory reclamation requested; no collector on this runtime");
    }

    /// Remove candidates whose modification time is older than `age`.
    pub fn cleanup_older_than(&self, age: Duration) -> usize {
        self.candidates()
            .iter()
            .filter(|path| {
                path.metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| modified.elapsed().ok())
                    .map(|elapsed| elapsed > age)
                    .unwrap_or(false)
            })
            .filter(|path| Self::remove_entry(path))
            .count()
    }

    /// Remove candidate files larger than `max_mb` megabytes.
    pub fn cleanup_larger_than(&self, max_mb: u64) -> usize {
        let threshold = max_mb.saturating_mul(1024 * 1024);
        self.candidates()
            .iter()
            .filter(|path| {
                path.metadata()
                    .map(|m| m.is_file() && m.len() > threshold)
                    .unwrap_or(false)
            })
            .filter(|path| Self::remove_entry(path))
            .count()
    }

    /// Run [`cleanup_temp_files`](Self::cleanup_temp_files) every
    /// `interval` on a background thread. Scheduling while already
    /// scheduled is a no-op.
    pub fn schedule(&self, interval: Duration) {
        if self.inner.scheduled.swap(true, Ordering::AcqRel) {
            log::debug!("Cleanup already scheduled");
            return;
        }

        let this = self.clone();
        let signal = Arc::clone(&self.inner.signal);
        let handle = std::thread::spawn(move || {
            log::info!("Scheduled cleanup started (interval {interval:?})");
            loop {
                let (lock, cvar) = &*signal;
                let (stop, wait) = {
                    let stopped = lock.lock().unwrap();
                    let result = cvar.wait_timeout(stopped, interval).unwrap();
                    (*result.0, result.1)
                };
                if stop {
                    break;
                }
                if !wait.timed_out() {
                    continue;
                }
                this.cleanup_temp_files();
            }
            log::info!("Scheduled cleanup stopped");
        });

        *self.inner.thread.lock().unwrap() = Some(handle);
    }

    /// Stop the scheduled sweep and join it. Idempotent.
    pub fn stop_scheduled(&self) {
        if !self.inner.scheduled.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let (lock, cvar) = &*self.inner.signal;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
        if let Some(handle) = self.inner.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        *self.inner.signal.0.lock().unwrap() = false;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, CleanupManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = CleanupManager::with_temp_dir(dir.path().to_path_buf());
        (dir, manager)
    }

    /// Verifies the pattern matcher semantics for each pattern class.
    #[test]
    fn test_pattern_matching() {
        assert!(is_candidate("printeer-render-42"));
        assert!(is_candidate("puppeteer_dev_profile-x"));
        assert!(is_candidate("chrome_shutdown_ms.txt"));
        assert!(is_candidate("chromium_1234"));
        assert!(is_candidate("scratch.tmp"));
        assert!(is_candidate("upload.temp"));

        assert!(!is_candidate("firefox_profile"));
        assert!(!is_candidate("printer-x"));
        assert!(!is_candidate("notes.txt"));
        assert!(!is_candidate("tmp"));
    }

    /// Verifies a sweep removes matching files and directories
    /// (recursively) while leaving everything else alone.
    #[test]
    fn test_sweep_removes_residue_only() {
        let (dir, manager) = manager();
        std::fs::write(dir.path().join("printeer-a.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"x").unwrap();
        let profile = dir.path().join("chrome_profile_7");
        std::fs::create_dir(&profile).unwrap();
        std::fs::write(profile.join("Cookies"), b"x").unwrap();

        let removed = manager.cleanup_temp_files();
        assert_eq!(removed, 2);
        assert!(dir.path().join("keep.txt").exists());
        assert!(!profile.exists());
    }

    /// Verifies browser-resource cleanup only touches directories.
    #[test]
    fn test_browser_resources_directories_only() {
        let (dir, manager) = manager();
        std::fs::write(dir.path().join("chromium_scratch"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("chromium_profile")).unwrap();

        let removed = manager.cleanup_browser_resources();
        assert_eq!(removed, 1);
        assert!(dir.path().join("chromium_scratch").exists());
        assert!(!dir.path().join("chromium_profile").exists());
    }

    /// Verifies the age-targeted variant leaves fresh entries in place.
    #[test]
    fn test_cleanup_older_than() {
        let (dir, manager) = manager();
        std::fs::write(dir.path().join("printeer-fresh"), b"x").unwrap();

        // Everything here was just created, so a large age removes nothing.
        assert_eq!(manager.cleanup_older_than(Duration::from_secs(3600)), 0);
        assert!(dir.path().join("printeer-fresh").exists());

        // Zero age removes it.
        assert_eq!(manager.cleanup_older_than(Duration::ZERO), 1);
    }

    /// Verifies the size-targeted variant only removes oversized files.
    #[test]
    fn test_cleanup_larger_than() {
        let (dir, manager) = manager();
        std::fs::write(dir.path().join("printeer-small"), vec![0u8; 16]).unwrap();
        std::fs::write(dir.path().join("printeer-big"), vec![0u8; 2 * 1024 * 1024]).unwrap();

        let removed = manager.cleanup_larger_than(1);
        assert_eq!(removed, 1);
        assert!(dir.path().join("printeer-small").exists());
        assert!(!dir.path().join("printeer-big").exists());
    }

    /// Verifies a sweep over a missing directory does not panic or raise.
    #[test]
    fn test_missing_dir_never_raises() {
        let manager = CleanupManager::with_temp_dir(PathBuf::from("/no/such/dir"));
        assert_eq!(manager.cleanup_temp_files(), 0);
        assert_eq!(manager.cleanup_older_than(Duration::ZERO), 0);
    }

    /// Verifies double scheduling is a no-op and stop is idempotent.
    #[test]
    fn test_schedule_idempotent() {
        let (_dir, manager) = manager();
        manager.schedule(Duration::from_millis(50));
        manager.schedule(Duration::from_millis(50));
        manager.stop_scheduled();
        manager.stop_scheduled();
    }
}
