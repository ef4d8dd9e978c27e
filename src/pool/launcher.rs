//! Launch-ladder execution.
//!
//! Creating a browser walks the factory's configurations from most capable
//! to most conservative: the optimal options first, then each fallback.
//! Every launched browser must pass the factory's page-load probe before
//! it counts; a launch that fails the probe is torn down and the ladder
//! advances. The first validated instance wins. Exhausting the ladder
//! surfaces [`PrinteerError::CreationFailed`] naming every tried profile
//! and the last error.
//!
//! Used by the pool for pooled instances and by the orchestrator for
//! oneshot conversions, so both strategies share identical launch
//! robustness.

use std::sync::Arc;

use crate::error::{PrinteerError, Result};
use crate::factory::{BrowserFactory, BrowserHandle};

/// Walk the ladder synchronously. Call from a blocking context.
pub(crate) fn create_validated_blocking(
    factory: &dyn BrowserFactory,
) -> Result<Box<dyn BrowserHandle>> {
    let mut tried = Vec::new();
    let mut last_error = String::from("factory offered no launch options");

    let mut ladder = vec![factory.optimal_launch_options()];
    ladder.extend(factory.fallback_launch_options());

    for options in ladder {
        let profile = options.profile;
        tried.push(profile.name().to_string());

        match factory.create(&options) {
            Ok(handle) => {
                if factory.validate(handle.as_ref()) {
                    if tried.len() > 1 {
                        log::info!(
                            "Browser launched with {} profile after {} failed attempts",
                            profile,
                            tried.len() - 1
                        );
                    }
                    return Ok(handle);
                }
                // Launched but not usable. Tear it down before moving on so
                // failed rungs never leak processes.
                log::warn!("Browser from {} profile failed the validation probe", profile);
                last_error = format!("{profile} launch failed the validation probe");
                let _ = factory.close(handle.as_ref());
                if factory.process_alive(handle.as_ref()) {
                    let _ = factory.kill_process(handle.as_ref());
                }
            }
            Err(e) => {
                log::warn!("Browser launch with {} profile failed: {e}", profile);
                last_error = e.to_string();
            }
        }
    }

    Err(PrinteerError::CreationFailed { tried, last_error })
}

/// Walk the ladder off the async scheduler.
pub(crate) async fn create_validated(
    factory: Arc<dyn BrowserFactory>,
) -> Result<Box<dyn BrowserHandle>> {
    tokio::task::spawn_blocking(move || create_validated_blocking(factory.as_ref()))
        .await
        .map_err(|e| PrinteerError::CreationFailed {
            tried: Vec::new(),
            last_error: format!("launch task panicked: {e}"),
        })?
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::MockBrowserFactory;

    /// Verifies the first rung wins when it works.
    #[test]
    fn test_optimal_wins() {
        let factory = MockBrowserFactory::new();
        let handle = create_validated_blocking(&factory).unwrap();
        assert!(factory.validate(handle.as_ref()));
        assert_eq!(factory.creation_count(), 1);
    }

    /// Verifies the ladder advances past failing profiles and the first
    /// surviving rung wins.
    #[test]
    fn test_ladder_advances() {
        let factory =
            MockBrowserFactory::failing_profiles(["optimal", "standard", "minimal"], "boom");
        let handle = create_validated_blocking(&factory).unwrap();
        assert!(factory.validate(handle.as_ref()));
        // optimal, standard, minimal failed; container-optimized succeeded.
        assert_eq!(factory.creation_count(), 4);
    }

    /// Verifies exhaustion lists every tried profile in order and carries
    /// the last error.
    #[test]
    fn test_exhaustion_details() {
        let factory = MockBrowserFactory::always_fails("no binary");
        match create_validated_blocking(&factory) {
            Err(PrinteerError::CreationFailed { tried, last_error }) => {
                assert_eq!(
                    tried,
                    vec![
                        "optimal",
                        "standard",
                        "minimal",
                        "container-optimized",
                        "headless-server"
                    ]
                );
                assert!(last_error.contains("no binary"));
            }
            other => panic!("expected CreationFailed, got {other:?}"),
        }
    }

    /// Verifies a launch that fails the probe is torn down before the
    /// ladder advances, so failed rungs never leak processes.
    #[test]
    fn test_probe_failure_tears_down() {
        use std::sync::atomic::Ordering;

        let factory = MockBrowserFactory::unhealthy_profiles(["optimal"]);
        let handle = create_validated_blocking(&factory).unwrap();
        assert!(factory.validate(handle.as_ref()));

        // The optimal-rung browser was created, probed, and torn down.
        let states = factory.states();
        assert_eq!(states.len(), 2);
        assert!(!states[0].alive.load(Ordering::SeqCst));
        assert!(states[1].alive.load(Ordering::SeqCst));
    }
}
