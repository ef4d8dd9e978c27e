//! Pool sizing policy.
//!
//! [`PoolOptimizer`] maps a [`ResourceSample`] to a target pool size and
//! expand/shrink recommendations. Every function here is total,
//! deterministic and side-effect-free — the pool and the batch scheduler
//! apply the recommendations; this module only computes them.
//!
//! # Policy
//!
//! - Base demand is `ceil(active_requests / demand_divisor)` (one browser
//!   comfortably serves a couple of queued requests).
//! - Above [`high_memory`](OptimizerSettings::high_memory) the target is
//!   capped at `max(min, floor(current × 0.7))` so a loaded host sheds
//!   browsers instead of growing.
//! - Shrink when memory is at or over the high-water mark, or when three
//!   or more browsers sit at under half a request each — but never below
//!   `pool.min`.
//! - Expand when browsers are oversubscribed (two or more requests per
//!   instance), memory has headroom, and the ceiling is not yet reached.
//! - Results are always clamped to `[pool.min, pool.max]`.

use crate::config::EffectiveConfig;
use crate::monitor::ResourceSample;

/// Tunables for the sizing policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSettings {
    /// Requests one browser is expected to absorb.
    pub demand_divisor: usize,
    /// Memory fraction above which the pool must stop growing.
    pub high_memory: f64,
    /// Requests-per-browser ratio that justifies expansion.
    pub expand_ratio: f64,
    /// Requests-per-browser ratio below which idle capacity is shed.
    pub shrink_ratio: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            demand_divisor: 2,
            high_memory: 0.8,
            expand_ratio: 2.0,
            shrink_ratio: 0.5,
        }
    }
}

/// Pure pool-size policy over `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptimizer {
    min: usize,
    max: usize,
    settings: OptimizerSettings,
}

impl PoolOptimizer {
    /// Build from explicit bounds and settings.
    pub fn new(min: usize, max: usize, settings: OptimizerSettings) -> Self {
        Self { min, max, settings }
    }

    /// Build from the effective configuration's pool bounds.
    pub fn from_config(config: &EffectiveConfig) -> Self {
        Self::new(
            config.browser.pool.min,
            config.browser.pool.max,
            OptimizerSettings::default(),
        )
    }

    /// Lower pool bound.
    #[inline]
    pub fn min(&self) -> usize {
        self.min
    }

    /// Upper pool bound.
    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }

    /// The pool size this sample calls for, clamped to `[min, max]`.
    pub fn optimal_pool_size(&self, sample: &ResourceSample) -> usize {
        let divisor = self.settings.demand_divisor.max(1);
        let demand = sample.active_requests.div_ceil(divisor);

        let mut target = demand;
        if sample.memory_usage > self.settings.high_memory {
            let cap = ((sample.browser_instances as f64) * 0.7).floor() as usize;
            target = target.min(cap.max(self.min));
        }

        target.clamp(self.min, self.max)
    }

    /// Whether the pool should grow by one.
    pub fn should_expand(&self, sample: &ResourceSample) -> bool {
        if sample.browser_instances >= self.max {
            return false;
        }
        if sample.memory_usage >= self.settings.high_memory {
            return false;
        }
        match sample.browser_instances {
            0 => sample.active_requests > 0,
            n => sample.active_requests as f64 / n as f64 >= self.settings.expand_ratio,
        }
    }

    /// Whether the pool should shed an instance.
    pub fn should_shrink(&self, sample: &ResourceSample) -> bool {
        if sample.browser_instances <= self.min {
            return false;
        }
        if sample.memory_usage >= self.settings.high_memory {
            return true;
        }
        sample.browser_instances >= 3
            && (sample.active_requests as f64 / sample.browser_instances as f64)
                < self.settings.shrink_ratio
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ResourceSample;

    fn optimizer(min: usize, max: usize) -> PoolOptimizer {
        PoolOptimizer::new(min, max, OptimizerSettings::default())
    }

    fn sample(memory: f64, browsers: usize, requests: usize) -> ResourceSample {
        ResourceSample {
            memory_usage: memory,
            browser_instances: browsers,
            active_requests: requests,
            ..ResourceSample::empty()
        }
    }

    /// Verifies base demand is `ceil(requests / 2)` under normal memory.
    #[test]
    fn test_demand_sizing() {
        let opt = optimizer(1, 10);
        assert_eq!(opt.optimal_pool_size(&sample(0.3, 2, 0)), 1); // clamped up to min
        assert_eq!(opt.optimal_pool_size(&sample(0.3, 2, 3)), 2);
        assert_eq!(opt.optimal_pool_size(&sample(0.3, 2, 4)), 2);
        assert_eq!(opt.optimal_pool_size(&sample(0.3, 2, 7)), 4);
    }

    /// Verifies the result is always inside `[min, max]`, whatever the
    /// sample says.
    #[test]
    fn test_clamping() {
        let opt = optimizer(2, 4);
        assert_eq!(opt.optimal_pool_size(&sample(0.0, 0, 0)), 2);
        assert_eq!(opt.optimal_pool_size(&sample(0.0, 0, 100)), 4);
        assert_eq!(opt.optimal_pool_size(&sample(0.99, 0, 100)), 2);
    }

    /// Verifies the memory penalty caps the target at 70% of the current
    /// fleet (never below min).
    #[test]
    fn test_memory_penalty() {
        let opt = optimizer(1, 10);
        // 10 requests would want 5 browsers, but memory is high and the
        // current fleet of 4 caps the target at floor(4 * 0.7) = 2.
        assert_eq!(opt.optimal_pool_size(&sample(0.9, 4, 10)), 2);
        // Penalty never undercuts min.
        assert_eq!(opt.optimal_pool_size(&sample(0.9, 1, 10)), 1);
    }

    /// Verifies expansion requires oversubscription, memory headroom and
    /// room under the ceiling.
    #[test]
    fn test_should_expand() {
        let opt = optimizer(1, 5);
        assert!(opt.should_expand(&sample(0.4, 2, 4)));
        assert!(opt.should_expand(&sample(0.4, 0, 1)));
        // Ratio below 2: no.
        assert!(!opt.should_expand(&sample(0.4, 2, 3)));
        // Memory high: no.
        assert!(!opt.should_expand(&sample(0.85, 2, 8)));
        // At the ceiling: no.
        assert!(!opt.should_expand(&sample(0.4, 5, 20)));
    }

    /// Verifies shrink triggers on memory or idleness, but never below
    /// min.
    #[test]
    fn test_should_shrink() {
        let opt = optimizer(1, 10);
        assert!(opt.should_shrink(&sample(0.85, 2, 4)));
        assert!(opt.should_shrink(&sample(0.3, 4, 1)));
        // Busy fleet: no.
        assert!(!opt.should_shrink(&sample(0.3, 4, 8)));
        // Small fleet idles without shrinking.
        assert!(!opt.should_shrink(&sample(0.3, 2, 0)));
        // Already at min.
        let opt = optimizer(2, 10);
        assert!(!opt.should_shrink(&sample(0.95, 2, 0)));
    }

    /// Verifies determinism: the same sample always yields the same
    /// answer.
    #[test]
    fn test_deterministic() {
        let opt = optimizer(1, 8);
        let s = sample(0.6, 3, 5);
        let first = (
            opt.optimal_pool_size(&s),
            opt.should_expand(&s),
            opt.should_shrink(&s),
        );
        for _ in 0..10 {
            assert_eq!(
                first,
                (
                    opt.optimal_pool_size(&s),
                    opt.should_expand(&s),
                    opt.should_shrink(&s)
                )
            );
        }
    }
}
