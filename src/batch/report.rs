//! Batch run reporting.
//!
//! A [`BatchReport`] is produced exactly once per run: aggregate totals,
//! wall-clock duration, the per-job results (one per expanded job), plus
//! resource and pool insights sourced from the monitor's history ring and
//! the pool's metrics counters.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::monitor::ResourceSample;
use crate::stats::PoolMetricsSnapshot;

use super::job::{BatchJobResult, JobStatus};

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every job reached a terminal state naturally.
    Completed,
    /// `continue_on_error` was off and a job failed unrecoverably.
    Aborted,
    /// Cancelled at a request boundary; the queue drained as skipped.
    Cancelled,
    /// Dry run: validation and expansion only.
    DryRun,
}

/// Peaks and averages over the samples observed during the run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceInsights {
    /// Highest memory usage fraction seen.
    pub peak_memory: f64,
    /// Mean memory usage fraction.
    pub avg_memory: f64,
    /// Highest CPU usage fraction seen.
    pub peak_cpu: f64,
    /// Mean CPU usage fraction.
    pub avg_cpu: f64,
}

impl ResourceInsights {
    /// Aggregate a slice of samples; `None` when there are none.
    pub fn from_samples(samples: &[ResourceSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let count = samples.len() as f64;
        Some(Self {
            peak_memory: samples.iter().map(|s| s.memory_usage).fold(0.0, f64::max),
            avg_memory: samples.iter().map(|s| s.memory_usage).sum::<f64>() / count,
            peak_cpu: samples.iter().map(|s| s.cpu_usage).fold(0.0, f64::max),
            avg_cpu: samples.iter().map(|s| s.cpu_usage).sum::<f64>() / count,
        })
    }
}

/// Browser churn during the run, from the pool's counter deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolInsights {
    /// Instances created during the run.
    pub created: u64,
    /// Acquires served by reuse during the run.
    pub reused: u64,
}

impl PoolInsights {
    /// Delta between two metric snapshots.
    pub fn from_delta(before: PoolMetricsSnapshot, after: PoolMetricsSnapshot) -> Self {
        Self {
            created: after.created.saturating_sub(before.created),
            reused: after.reused.saturating_sub(before.reused),
        }
    }
}

/// The run's final account.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// How the run ended.
    pub outcome: BatchOutcome,
    /// Expanded job count.
    pub total: usize,
    /// Jobs that completed.
    pub completed: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Jobs that were skipped.
    pub skipped: usize,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// When dispatch began.
    pub started_at: DateTime<Utc>,
    /// When the report was generated.
    pub finished_at: DateTime<Utc>,
    /// One record per expanded job.
    pub results: Vec<BatchJobResult>,
    /// Resource peaks/averages, when the monitor had samples.
    pub resources: Option<ResourceInsights>,
    /// Browser churn, when a pool served the run.
    pub pool: Option<PoolInsights>,
}

impl BatchReport {
    /// Assemble a report from results, computing the totals.
    pub(crate) fn assemble(
        outcome: BatchOutcome,
        results: Vec<BatchJobResult>,
        started_at: DateTime<Utc>,
        duration: Duration,
        resources: Option<ResourceInsights>,
        pool: Option<PoolInsights>,
    ) -> Self {
        let completed = results
            .iter()
            .filter(|r| r.status == JobStatus::Completed)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == JobStatus::Failed)
            .count();
        let skipped = results
            .iter()
            .filter(|r| r.status == JobStatus::Skipped)
            .count();
        Self {
            outcome,
            total: results.len(),
            completed,
            failed,
            skipped,
            duration,
            started_at,
            finished_at: Utc::now(),
            results,
            resources,
            pool,
        }
    }

    /// The result record for `job_id`, if present.
    pub fn result(&self, job_id: &str) -> Option<&BatchJobResult> {
        self.results.iter().find(|r| r.job_id == job_id)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies totals are computed from the result records.
    #[test]
    fn test_assemble_totals() {
        let results = vec![
            BatchJobResult {
                job_id: "a".into(),
                status: JobStatus::Completed,
                started_at: Some(Utc::now()),
                ended_at: Some(Utc::now()),
                duration: Some(Duration::from_millis(5)),
                output_path: Some("a.pdf".into()),
                error: None,
                retry_count: 0,
            },
            BatchJobResult::skipped("b", "dependency failed"),
            BatchJobResult {
                job_id: "c".into(),
                status: JobStatus::Failed,
                started_at: Some(Utc::now()),
                ended_at: Some(Utc::now()),
                duration: Some(Duration::from_millis(9)),
                output_path: None,
                error: Some("boom".into()),
                retry_count: 2,
            },
        ];
        let report = BatchReport::assemble(
            BatchOutcome::Completed,
            results,
            Utc::now(),
            Duration::from_secs(1),
            None,
            None,
        );

        assert_eq!(report.total, 3);
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.result("c").unwrap().retry_count, 2);
        assert!(report.result("ghost").is_none());
    }

    /// Verifies resource insight aggregation.
    #[test]
    fn test_resource_insights() {
        assert!(ResourceInsights::from_samples(&[]).is_none());

        let mut a = ResourceSample::empty();
        a.memory_usage = 0.2;
        a.cpu_usage = 0.1;
        let mut b = ResourceSample::empty();
        b.memory_usage = 0.6;
        b.cpu_usage = 0.5;

        let insights = ResourceInsights::from_samples(&[a, b]).unwrap();
        assert!((insights.peak_memory - 0.6).abs() < 1e-9);
        assert!((insights.avg_memory - 0.4).abs() < 1e-9);
        assert!((insights.peak_cpu - 0.5).abs() < 1e-9);
    }

    /// Verifies pool insights are counter deltas.
    #[test]
    fn test_pool_insights_delta() {
        let before = PoolMetricsSnapshot {
            created: 2,
            reused: 10,
            destroyed: 1,
            errors: 0,
        };
        let after = PoolMetricsSnapshot {
            created: 3,
            reused: 17,
            destroyed: 2,
            errors: 0,
        };
        let insights = PoolInsights::from_delta(before, after);
        assert_eq!(insights.created, 1);
        assert_eq!(insights.reused, 7);
    }
}
