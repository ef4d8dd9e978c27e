//! Emergency-cleanup registry.
//!
//! A single synchronized slot holds a weak reference to the most recently
//! initialized pool. [`emergency_cleanup`] drains that pool with full
//! aggressive destruction; [`install_signal_handlers`] wires `SIGINT` /
//! `SIGTERM` to it so an interrupted process never strands browser child
//! processes.
//!
//! The slot is weak on purpose: registration must not keep a dropped
//! engine's pool alive, and a dead weak reference simply makes emergency
//! cleanup a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::PoolInner;

static EMERGENCY_SLOT: Mutex<Option<Weak<PoolInner>>> = Mutex::new(None);
static HANDLERS_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Serializes test code that touches the process-global slot, so parallel
/// tests cannot steal each other's registration mid-assertion.
#[cfg(test)]
pub(crate) static TEST_SERIAL: Mutex<()> = Mutex::new(());

/// Register `pool` as the emergency-cleanup target, replacing any
/// previous registration.
pub(crate) fn register(pool: &Arc<PoolInner>) {
    *EMERGENCY_SLOT.lock().unwrap() = Some(Arc::downgrade(pool));
    log::debug!("Pool registered for emergency cleanup");
}

/// Destroy every browser instance of the registered pool, aggressively
/// and in parallel. Safe to call at any time; a missing or already
/// dropped registration is a no-op.
pub async fn emergency_cleanup() {
    let pool = EMERGENCY_SLOT
        .lock()
        .unwrap()
        .as_ref()
        .and_then(Weak::upgrade);
    match pool {
        Some(pool) => {
            log::warn!("Emergency cleanup: destroying all browser instances");
            pool.destroy_all("emergency cleanup").await;
            log::warn!("Emergency cleanup complete");
        }
        None => log::debug!("Emergency cleanup requested but no pool is registered"),
    }
}

/// Install `SIGINT`/`SIGTERM` handlers that run [`emergency_cleanup`]
/// before exiting with the conventional signal exit code.
///
/// Idempotent; only the first call installs anything. Must be called
/// inside a tokio runtime.
pub fn install_signal_handlers() {
    if HANDLERS_INSTALLED.swap(true, Ordering::AcqRel) {
        return;
    }

    tokio::spawn(async {
        let exit_code = wait_for_termination_signal().await;
        log::warn!("Termination signal received; running emergency cleanup");
        emergency_cleanup().await;
        std::process::exit(exit_code);
    });
}

#[cfg(unix)]
async fn wait_for_termination_signal() -> i32 {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("Cannot install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return 130;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => 130,
        _ = sigterm.recv() => 143,
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() -> i32 {
    let _ = tokio::signal::ctrl_c().await;
    130
}

// ============================================================================
// Unit Tests
// ============================================================================
