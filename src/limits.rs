//! Resource limit enforcement and degradation policy.
//!
//! [`LimitEnforcer`] compares live [`ResourceSample`]s against the
//! configured [`ResourceLimits`] and turns breaches into
//! [`EnforcementAction`]s for the engine to dispatch (memory reclamation,
//! pool shrinking, admission throttling, temp cleanup). Alongside the
//! actions it maintains [`DegradationFlags`]: reversible policy bits that
//! flip on when limits fire and flip off only on an explicit
//! [`reset_degradation`](LimitEnforcer::reset_degradation).
//!
//! The enforcer itself has no handles to the pool or the cleanup manager —
//! it computes, the engine wiring dispatches. That keeps the policy
//! testable without standing up browsers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ResourceLimits;
use crate::monitor::{Pressure, ResourceSample};

/// What the engine should do about a limit breach, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementAction {
    /// Ask the cleanup manager for memory reclamation.
    RequestMemoryReclaim,
    /// Signal the pool to shed instances.
    ShrinkPool,
    /// Throttle admission of new work.
    Throttle,
    /// Sweep browser residue from the temp area.
    CleanupTempFiles,
}

/// Reversible degradation state.
///
/// Flags are monotonic within an enablement window: once set they stay set
/// until [`LimitEnforcer::reset_degradation`] clears them.
#[derive(Debug, Default)]
pub struct DegradationFlags {
    throttling: AtomicBool,
    quality_reduced: AtomicBool,
    non_essential_disabled: AtomicBool,
}

/// Point-in-time view of the degradation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DegradationSnapshot {
    /// Admission of new work is being slowed.
    pub throttling: bool,
    /// Render quality has been reduced to save memory.
    pub quality_reduced: bool,
    /// Non-essential features are switched off.
    pub non_essential_disabled: bool,
}

impl DegradationFlags {
    fn snapshot(&self) -> DegradationSnapshot {
        DegradationSnapshot {
            throttling: self.throttling.load(Ordering::Acquire),
            quality_reduced: self.quality_reduced.load(Ordering::Acquire),
            non_essential_disabled: self.non_essential_disabled.load(Ordering::Acquire),
        }
    }

    fn reset(&self) {
        self.throttling.store(false, Ordering::Release);
        self.quality_reduced.store(false, Ordering::Release);
        self.non_essential_disabled.store(false, Ordering::Release);
    }
}

/// Which limits a sample breached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitViolations {
    /// Engine memory ceiling exceeded.
    pub memory: bool,
    /// CPU ceiling exceeded.
    pub cpu: bool,
    /// Concurrent-request ceiling exceeded.
    pub concurrency: bool,
    /// Browser-instance ceiling exceeded.
    pub browsers: bool,
}

impl LimitViolations {
    /// Any limit breached.
    pub fn any(&self) -> bool {
        self.memory || self.cpu || self.concurrency || self.browsers
    }
}

/// Detects limit breaches and drives degradation.
pub struct LimitEnforcer {
    limits: ResourceLimits,
    /// Host memory in MB, used to turn `max_memory_mb` into a fraction
    /// comparable with sampled usage.
    total_memory_mb: u64,
    flags: Arc<DegradationFlags>,
    degradation_enabled: AtomicBool,
}

impl LimitEnforcer {
    /// Enforcer with an explicit host memory size (tests inject this).
    pub fn new(limits: ResourceLimits, total_memory_mb: u64) -> Self {
        Self {
            limits,
            total_memory_mb: total_memory_mb.max(1),
            flags: Arc::new(DegradationFlags::default()),
            degradation_enabled: AtomicBool::new(true),
        }
    }

    /// Enforcer that probes the host memory size itself.
    pub fn with_host_memory(limits: ResourceLimits) -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        let total_mb = system.total_memory() / (1024 * 1024);
        Self::new(limits, total_mb)
    }

    /// Pure breach detection for a sample.
    pub fn violations(&self, sample: &ResourceSample) -> LimitViolations {
        let memory_limit_fraction =
            (self.limits.max_memory_mb as f64 / self.total_memory_mb as f64).min(1.0);
        LimitViolations {
            memory: sample.memory_usage > memory_limit_fraction,
            cpu: sample.cpu_usage > self.limits.max_cpu_percent / 100.0,
            concurrency: sample.active_requests > self.limits.max_concurrent_requests,
            browsers: sample.browser_instances > self.limits.max_browser_instances,
        }
    }

    /// Evaluate a sample, flip degradation flags, and return the actions
    /// to dispatch, in order.
    ///
    /// With degradation disabled only the memory-reclamation request
    /// survives; throttling, shrinking and cleanup are suppressed.
    pub fn enforce(&self, sample: &ResourceSample, pressure: &Pressure) -> Vec<EnforcementAction> {
        let violations = self.violations(sample);
        let enabled = self.degradation_enabled.load(Ordering::Acquire);
        let mut actions = Vec::new();

        if violations.memory {
            actions.push(EnforcementAction::RequestMemoryReclaim);
            if enabled {
                actions.push(EnforcementAction::ShrinkPool);
                self.flags.quality_reduced.store(true, Ordering::Release);
                log::warn!(
                    "Memory limit exceeded (usage {:.2}); reducing quality and shrinking pool",
                    sample.memory_usage
                );
            }
        }

        if !enabled {
            return actions;
        }

        if violations.cpu || violations.concurrency {
            actions.push(EnforcementAction::Throttle);
            self.flags.throttling.store(true, Ordering::Release);
            log::warn!(
                "CPU/concurrency limit exceeded (cpu {:.2}, requests {}); throttling admission",
                sample.cpu_usage,
                sample.active_requests
            );
        }

        if violations.browsers && !actions.contains(&EnforcementAction::ShrinkPool) {
            actions.push(EnforcementAction::ShrinkPool);
            log::warn!(
                "Browser-instance limit exceeded ({} live); shrinking pool",
                sample.browser_instances
            );
        }

        if pressure.disk {
            actions.push(EnforcementAction::CleanupTempFiles);
        }

        // Two or more simultaneous breaches: shut off non-essential work.
        let breach_count = [
            violations.memory,
            violations.cpu || violations.concurrency,
            violations.browsers,
            pressure.disk,
        ]
        .iter()
        .filter(|&&b| b)
        .count();
        if breach_count >= 2 {
            self.flags
                .non_essential_disabled
                .store(true, Ordering::Release);
        }

        actions
    }

    /// Current degradation state.
    pub fn degradation(&self) -> DegradationSnapshot {
        self.flags.snapshot()
    }

    /// Clear all degradation flags.
    pub fn reset_degradation(&self) {
        self.flags.reset();
        log::info!("Degradation flags reset");
    }

    /// Enable or disable degradation actions.
    pub fn set_degradation_enabled(&self, enabled: bool) {
        self.degradation_enabled.store(enabled, Ordering::Release);
    }

    /// Whether degradation actions are currently enabled.
    pub fn degradation_enabled(&self) -> bool {
        self.degradation_enabled.load(Ordering::Acquire)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
