//! Resource-aware batch scheduling.
//!
//! [`BatchScheduler`] drives a set of [`BatchJob`]s through expansion,
//! dependency resolution and dispatch:
//!
//! - **Expansion** materializes parametric jobs (Cartesian product of
//!   list variables) and validates id uniqueness.
//! - **Dependency scheduling** builds the graph up front; cycles and
//!   unknown references fail validation before anything dispatches. A job
//!   becomes ready when all its dependencies completed; a failed
//!   dependency skips its whole dependent subtree (or aborts the batch
//!   when `continue_on_error` is off).
//! - **Dispatch** admits ready jobs — ordered by priority, then
//!   insertion — while in-flight work stays under the *effective
//!   concurrency*: the configured ceiling bounded by the pool optimizer's
//!   read of the latest resource sample, recomputed on every admit and
//!   completion, and cut multiplicatively (×0.7, floor 1) whenever the
//!   monitor reports memory or CPU pressure.
//! - **Retries** re-queue failed jobs behind ready work of the same
//!   priority with exponential backoff (250 ms · 2^attempt, capped).
//! - **Cancellation** applies at request boundaries: in-flight jobs
//!   finish (their own deadlines still apply) and the queue drains into
//!   skipped results.
//!
//! The scheduler is decoupled from the conversion orchestrator: dispatch
//! goes through a caller-supplied async closure, which the engine points
//! at its `convert` path.

pub mod job;
pub mod report;

pub(crate) mod graph;

pub use job::{expand_jobs, BatchJob, BatchJobResult, BatchOptions, JobStatus, VariableValue};
pub use report::{BatchOutcome, BatchReport, PoolInsights, ResourceInsights};

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::error::Result;
use crate::monitor::ResourceMonitor;
use crate::optimizer::PoolOptimizer;
use crate::renderer::OutputDescriptor;
use crate::stats::PoolMetricsSnapshot;

use graph::DependencyGraph;

/// Base retry backoff; attempt `n` waits `250 ms · 2^n`, capped below.
const RETRY_BASE: Duration = Duration::from_millis(250);

/// Ceiling on the retry backoff.
const RETRY_CAP: Duration = Duration::from_secs(5);

fn retry_backoff(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(8));
    RETRY_BASE.saturating_mul(factor).min(RETRY_CAP)
}

/// Heap entry: priority descending, then admission order ascending.
struct ReadyEntry {
    priority: i32,
    seq: u64,
    id: String,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for ReadyEntry {}
impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then the lower sequence.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Per-job bookkeeping between attempts.
struct AttemptState {
    job: BatchJob,
    attempt: u32,
    first_started: chrono::DateTime<Utc>,
    first_instant: Instant,
}

/// Cancel handle for a running batch.
///
/// Cancellation is honored at request boundaries: nothing new is
/// admitted, in-flight jobs run to their own deadlines, the rest of the
/// queue lands in the report as skipped.
#[derive(Clone)]
pub struct BatchCancellation {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl BatchCancellation {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            log::info!("Batch cancellation requested");
        }
        self.notify.notify_waiters();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Schedules one batch at a time against the shared monitor/optimizer.
pub struct BatchScheduler {
    options: BatchOptions,
    monitor: ResourceMonitor,
    optimizer: PoolOptimizer,
    metrics_source: Option<Arc<dyn Fn() -> PoolMetricsSnapshot + Send + Sync>>,
    effective: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    cancel_notify: Arc<Notify>,
}

impl BatchScheduler {
    /// Scheduler over the given options, monitor and optimizer.
    pub fn new(options: BatchOptions, monitor: ResourceMonitor, optimizer: PoolOptimizer) -> Self {
        let effective = Arc::new(AtomicUsize::new(options.concurrency.max(1)));
        Self {
            options,
            monitor,
            optimizer,
            metrics_source: None,
            effective,
            cancelled: Arc::new(AtomicBool::new(false)),
            cancel_notify: Arc::new(Notify::new()),
        }
    }

    /// Source for pool-churn insights in the report (the engine wires the
    /// pool's metrics snapshot in here).
    pub fn with_pool_metrics(
        mut self,
        source: Arc<dyn Fn() -> PoolMetricsSnapshot + Send + Sync>,
    ) -> Self {
        self.metrics_source = Some(source);
        self
    }

    /// Handle for cancelling this scheduler's run.
    pub fn cancellation(&self) -> BatchCancellation {
        BatchCancellation {
            cancelled: Arc::clone(&self.cancelled),
            notify: Arc::clone(&self.cancel_notify),
        }
    }

    /// The concurrency the dispatch loop is currently admitting under.
    pub fn effective_concurrency(&self) -> usize {
        self.effective.load(Ordering::Acquire)
    }

    fn recompute_effective(&self) {
        let sample = self.monitor.latest();
        let optimal = self.optimizer.optimal_pool_size(&sample).max(1);
        let effective = self.options.concurrency.max(1).min(optimal);
        self.effective.store(effective, Ordering::Release);
    }

    /// Run the batch, dispatching each admitted job through `dispatch`.
    ///
    /// Validation failures (duplicate ids, cycles, unknown dependencies)
    /// return `Err` before any job is dispatched and before any result is
    /// recorded. Runtime failures land in the report.
    pub async fn run<F, Fut>(&self, jobs: Vec<BatchJob>, dispatch: F) -> Result<BatchReport>
    where
        F: Fn(BatchJob) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<OutputDescriptor>> + Send + 'static,
    {
        let expanded = expand_jobs(&jobs)?;
        let mut graph = DependencyGraph::build(&expanded)?;
        log::info!(
            "Batch validated: {} jobs ({} before expansion), concurrency ceiling {}",
            expanded.len(),
            jobs.len(),
            self.options.concurrency
        );

        let started_at = Utc::now();
        let start = Instant::now();

        if self.options.dry_run {
            log::info!("Dry run: skipping dispatch for {} jobs", expanded.len());
            let results = expanded
                .iter()
                .map(|job| BatchJobResult::skipped(job.id.as_str(), "dry run"))
                .collect();
            return Ok(BatchReport::assemble(
                BatchOutcome::DryRun,
                results,
                started_at,
                start.elapsed(),
                None,
                None,
            ));
        }

        let metrics_before = self.metrics_source.as_ref().map(|source| source());

        // Pressure feedback: memory/CPU pressure cuts the effective
        // concurrency multiplicatively; calm ticks recompute it from the
        // optimizer.
        let subscription = {
            let effective = Arc::clone(&self.effective);
            let optimizer = self.optimizer;
            let ceiling = self.options.concurrency.max(1);
            self.monitor.on_pressure(move |pressure, sample| {
                if pressure.memory || pressure.cpu {
                    let current = effective.load(Ordering::Acquire);
                    let reduced = ((current * 7) / 10).max(1);
                    if reduced < current {
                        log::warn!(
                            "Resource pressure: effective concurrency {current} -> {reduced}"
                        );
                        effective.store(reduced, Ordering::Release);
                    }
                } else {
                    let optimal = optimizer.optimal_pool_size(sample).max(1);
                    effective.store(ceiling.min(optimal), Ordering::Release);
                }
            })
        };
        self.recompute_effective();

        let mut jobs_by_id: HashMap<String, BatchJob> = expanded
            .iter()
            .map(|job| (job.id.clone(), job.clone()))
            .collect();
        let all_ids: Vec<String> = expanded.iter().map(|job| job.id.clone()).collect();

        let mut seq = 0u64;
        let mut ready: BinaryHeap<ReadyEntry> = BinaryHeap::new();
        for id in graph.initially_ready() {
            let priority = jobs_by_id[&id].priority;
            ready.push(ReadyEntry { priority, seq, id });
            seq += 1;
        }

        let mut inflight: JoinSet<(String, Result<OutputDescriptor>)> = JoinSet::new();
        let mut attempt_states: HashMap<String, AttemptState> = HashMap::new();
        let mut retry_queue: Vec<(Instant, String)> = Vec::new();
        let mut results: HashMap<String, BatchJobResult> = HashMap::new();
        let mut aborted = false;

        loop {
            let halted = aborted || self.cancelled.load(Ordering::Acquire);

            // Admission: fill the window from the ready heap.
            while !halted && inflight.len() < self.effective.load(Ordering::Acquire) {
                let Some(entry) = ready.pop() else { break };
                let job = jobs_by_id[&entry.id].clone();
                let attempt = attempt_states
                    .get(&entry.id)
                    .map(|s| s.attempt)
                    .unwrap_or(0);
                attempt_states.entry(entry.id.clone()).or_insert_with(|| {
                    AttemptState {
                        job: job.clone(),
                        attempt: 0,
                        first_started: Utc::now(),
                        first_instant: Instant::now(),
                    }
                });

                log::debug!(
                    "Admitting job {} (attempt {}, in-flight {})",
                    job.id,
                    attempt + 1,
                    inflight.len() + 1
                );
                self.monitor.inc_requests();

                let dispatch = dispatch.clone();
                let timeout = job.timeout();
                let id = job.id.clone();
                inflight.spawn(async move {
                    let outcome = match timeout {
                        Some(limit) => match tokio::time::timeout(limit, dispatch(job)).await {
                            Ok(result) => result,
                            Err(_) => Err(crate::error::PrinteerError::Timeout { elapsed: limit }),
                        },
                        None => dispatch(job).await,
                    };
                    (id, outcome)
                });
                self.recompute_effective();
            }

            let idle = inflight.is_empty();
            if idle && (halted || (ready.is_empty() && retry_queue.is_empty())) {
                break;
            }

            // Next retry due time, if any.
            let next_due = retry_queue.iter().map(|(due, _)| *due).min();

            tokio::select! {
                joined = inflight.join_next(), if !idle => {
                    let Some(joined) = joined else { continue };
                    self.monitor.dec_requests();

                    let (id, outcome) = match joined {
                        Ok(value) => value,
                        Err(join_error) => {
                            // A panicked dispatch counts as a failed batch
                            // run slot; without the id we cannot retry it.
                            log::error!("Dispatch task panicked: {join_error}");
                            continue;
                        }
                    };

                    let state = attempt_states.get_mut(&id).expect("state for in-flight job");
                    match outcome {
                        Ok(descriptor) => {
                            log::info!("Job {id} completed ({})", descriptor.path.display());
                            results.insert(id.clone(), BatchJobResult {
                                job_id: id.clone(),
                                status: JobStatus::Completed,
                                started_at: Some(state.first_started),
                                ended_at: Some(Utc::now()),
                                duration: Some(state.first_instant.elapsed()),
                                output_path: Some(descriptor.path.clone()),
                                error: None,
                                retry_count: state.attempt,
                            });
                            for ready_id in graph.complete(&id) {
                                let priority = jobs_by_id[&ready_id].priority;
                                ready.push(ReadyEntry { priority, seq, id: ready_id });
                                seq += 1;
                            }
                        }
                        Err(error) => {
                            let budget = state
                                .job
                                .retry_budget
                                .unwrap_or(self.options.retry_attempts);
                            let cancelled = self.cancelled.load(Ordering::Acquire);
                            if state.attempt < budget && !aborted && !cancelled {
                                state.attempt += 1;
                                let delay = retry_backoff(state.attempt - 1);
                                log::warn!(
                                    "Job {id} failed (attempt {}/{}): {error}; retrying in {delay:?}",
                                    state.attempt,
                                    budget + 1
                                );
                                retry_queue.push((Instant::now() + delay, id.clone()));
                            } else {
                                log::error!(
                                    "Job {id} failed after {} retries: {error}",
                                    state.attempt
                                );
                                results.insert(id.clone(), BatchJobResult {
                                    job_id: id.clone(),
                                    status: JobStatus::Failed,
                                    started_at: Some(state.first_started),
                                    ended_at: Some(Utc::now()),
                                    duration: Some(state.first_instant.elapsed()),
                                    output_path: None,
                                    error: Some(error.to_string()),
                                    retry_count: state.attempt,
                                });
                                if self.options.continue_on_error {
                                    for skipped_id in graph.fail(&id) {
                                        results.insert(
                                            skipped_id.clone(),
                                            BatchJobResult::skipped(
                                                skipped_id.as_str(),
                                                format!("dependency {id} failed"),
                                            ),
                                        );
                                        jobs_by_id.remove(&skipped_id);
                                    }
                                } else {
                                    log::error!("Aborting batch: job {id} failed and continue_on_error is off");
                                    aborted = true;
                                }
                            }
                        }
                    }
                    self.recompute_effective();
                }
                _ = async {
                    match next_due {
                        Some(due) => tokio::time::sleep_until(due).await,
                        // Nothing due; this arm stays pending forever.
                        None => std::future::pending::<()>().await,
                    }
                }, if next_due.is_some() => {
                    let now = Instant::now();
                    let mut still_waiting = Vec::new();
                    for (due, id) in retry_queue.drain(..) {
                        if due <= now {
                            // Retries queue behind ready work of the same
                            // priority via the fresh sequence number.
                            let priority = jobs_by_id[&id].priority;
                            ready.push(ReadyEntry { priority, seq, id });
                            seq += 1;
                        } else {
                            still_waiting.push((due, id));
                        }
                    }
                    retry_queue = still_waiting;
                }
                _ = self.cancel_notify.notified() => {
                    // Flag observed at the top of the loop.
                }
            }
        }

        self.monitor.off_pressure(subscription);

        // Drain everything that never reached a terminal state.
        let cancelled = self.cancelled.load(Ordering::Acquire);
        let drain_reason = if cancelled {
            "batch cancelled"
        } else if aborted {
            "batch aborted"
        } else {
            "never became ready"
        };
        let mut final_results = Vec::with_capacity(all_ids.len());
        for id in &all_ids {
            match results.remove(id) {
                Some(result) => final_results.push(result),
                None => final_results.push(BatchJobResult::skipped(id.as_str(), drain_reason)),
            }
        }

        let outcome = if aborted {
            BatchOutcome::Aborted
        } else if cancelled {
            BatchOutcome::Cancelled
        } else {
            BatchOutcome::Completed
        };

        let resources = ResourceInsights::from_samples(&self.monitor.history());
        let pool = match (metrics_before, self.metrics_source.as_ref()) {
            (Some(before), Some(source)) => Some(PoolInsights::from_delta(before, source())),
            _ => None,
        };

        let report = BatchReport::assemble(
            outcome,
            final_results,
            started_at,
            start.elapsed(),
            resources,
            pool,
        );
        log::info!(
            "Batch finished ({:?}): {}/{} completed, {} failed, {} skipped in {:?}",
            report.outcome,
            report.completed,
            report.total,
            report.failed,
            report.skipped,
            report.duration
        );
        Ok(report)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertThresholds;
    use crate::monitor::ResourceSample;
    use crate::optimizer::OptimizerSettings;
    use crate::renderer::MediaType;
    use std::sync::Mutex;

    fn scheduler(options: BatchOptions) -> BatchScheduler {
        let monitor = ResourceMonitor::new(AlertThresholds::default());
        let optimizer = PoolOptimizer::new(1, 16, OptimizerSettings::default());
        BatchScheduler::new(options, monitor, optimizer)
    }

    fn ok_descriptor(id: &str) -> OutputDescriptor {
        OutputDescriptor {
            path: format!("{id}.pdf").into(),
            media_type: MediaType::Pdf,
            bytes: Some(1),
            metrics: None,
        }
    }

    /// Dispatch that records completion order and succeeds.
    fn recording_dispatch(
        log: Arc<Mutex<Vec<String>>>,
    ) -> impl Fn(BatchJob) -> std::pin::Pin<Box<dyn Future<Output = Result<OutputDescriptor>> + Send>>
           + Clone
           + Send
           + Sync
           + 'static {
        move |job: BatchJob| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                log.lock().unwrap().push(job.id.clone());
                Ok(ok_descriptor(&job.id))
            })
        }
    }

    /// Scenario: A before B and C; B and C independent. Order must
    /// respect the graph; every job is recorded exactly once.
    #[tokio::test]
    async fn test_dependency_ordering() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let scheduler = scheduler(BatchOptions {
            concurrency: 4,
            ..BatchOptions::default()
        });

        let jobs = vec![
            BatchJob::new("a", "http://h/a", "a.pdf"),
            BatchJob::new("b", "http://h/b", "b.pdf").depends_on(["a"]),
            BatchJob::new("c", "http://h/c", "c.pdf").depends_on(["a"]),
        ];
        let report = scheduler
            .run(jobs, recording_dispatch(Arc::clone(&order)))
            .await
            .unwrap();

        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(report.completed, 3);
        assert_eq!(report.total, 3);

        let order = order.lock().unwrap();
        assert_eq!(order[0], "a", "a must run first");
        assert_eq!(order.len(), 3);
    }

    /// A cycle fails before dispatch with no results recorded.
    #[tokio::test]
    async fn test_cycle_fails_pre_dispatch() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let scheduler = scheduler(BatchOptions::default());

        let jobs = vec![
            BatchJob::new("a", "http://h/a", "a.pdf").depends_on(["b"]),
            BatchJob::new("b", "http://h/b", "b.pdf").depends_on(["a"]),
        ];
        let result = scheduler
            .run(jobs, recording_dispatch(Arc::clone(&order)))
            .await;

        assert!(matches!(
            result,
            Err(crate::error::PrinteerError::CycleDetected { .. })
        ));
        assert!(order.lock().unwrap().is_empty(), "nothing may execute");
    }

    /// concurrency=1 executes strictly one at a time.
    #[tokio::test]
    async fn test_serial_when_concurrency_one() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let scheduler = scheduler(BatchOptions {
            concurrency: 1,
            ..BatchOptions::default()
        });

        let jobs: Vec<BatchJob> = (0..5)
            .map(|i| BatchJob::new(format!("j{i}"), format!("http://h/{i}"), format!("{i}.pdf")))
            .collect();

        let dispatch = {
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            move |job: BatchJob| {
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(ok_descriptor(&job.id))
                }
            }
        };

        let report = scheduler.run(jobs, dispatch).await.unwrap();
        assert_eq!(report.completed, 5);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    /// Retry then success: one scripted failure yields completed with
    /// retry_count 1.
    #[tokio::test]
    async fn test_retry_then_success() {
        let failures = Arc::new(AtomicUsize::new(1));
        let scheduler = scheduler(BatchOptions {
            retry_attempts: 2,
            ..BatchOptions::default()
        });

        let dispatch = {
            let failures = Arc::clone(&failures);
            move |job: BatchJob| {
                let failures = Arc::clone(&failures);
                async move {
                    if failures
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        Err(crate::error::PrinteerError::RendererFailed("flaky".into()))
                    } else {
                        Ok(ok_descriptor(&job.id))
                    }
                }
            }
        };

        let jobs = vec![BatchJob::new("flaky", "http://h/x", "x.pdf")];
        let report = scheduler.run(jobs, dispatch).await.unwrap();

        let result = report.result("flaky").unwrap();
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.retry_count, 1);
    }

    /// Exhausted retries fail the job and skip its dependents.
    #[tokio::test]
    async fn test_failure_skips_dependents() {
        let scheduler = scheduler(BatchOptions {
            retry_attempts: 1,
            continue_on_error: true,
            ..BatchOptions::default()
        });

        let dispatch = move |job: BatchJob| async move {
            if job.id == "root" {
                Err(crate::error::PrinteerError::RendererFailed("down".into()))
            } else {
                Ok(ok_descriptor(&job.id))
            }
        };

        let jobs = vec![
            BatchJob::new("root", "http://h/r", "r.pdf"),
            BatchJob::new("child", "http://h/c", "c.pdf").depends_on(["root"]),
            BatchJob::new("free", "http://h/f", "f.pdf"),
        ];
        let report = scheduler.run(jobs, dispatch).await.unwrap();

        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(report.result("root").unwrap().status, JobStatus::Failed);
        assert_eq!(report.result("root").unwrap().retry_count, 1);
        assert_eq!(report.result("child").unwrap().status, JobStatus::Skipped);
        assert_eq!(report.result("free").unwrap().status, JobStatus::Completed);
        assert_eq!(report.total, 3);
    }

    /// With continue_on_error off, the first unrecoverable failure aborts
    /// and the remainder is skipped.
    #[tokio::test]
    async fn test_abort_on_error() {
        let scheduler = scheduler(BatchOptions {
            concurrency: 1,
            retry_attempts: 0,
            continue_on_error: false,
            ..BatchOptions::default()
        });

        let dispatch = move |job: BatchJob| async move {
            if job.id == "a" {
                Err(crate::error::PrinteerError::RendererFailed("dead".into()))
            } else {
                Ok(ok_descriptor(&job.id))
            }
        };

        // Priorities order a first.
        let jobs = vec![
            BatchJob::new("a", "http://h/a", "a.pdf").with_priority(10),
            BatchJob::new("b", "http://h/b", "b.pdf"),
            BatchJob::new("c", "http://h/c", "c.pdf"),
        ];
        let report = scheduler.run(jobs, dispatch).await.unwrap();

        assert_eq!(report.outcome, BatchOutcome::Aborted);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 2);
    }

    /// Dry run: expansion and validation only, all skipped, no dispatch.
    #[tokio::test]
    async fn test_dry_run() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let scheduler = scheduler(BatchOptions {
            dry_run: true,
            ..BatchOptions::default()
        });

        let mut job = BatchJob::new("p", "http://h/{v}", "{v}.pdf");
        job.variables.insert(
            "v".to_string(),
            VariableValue::List(vec!["1".to_string(), "2".to_string()]),
        );
        let report = scheduler
            .run(vec![job], recording_dispatch(Arc::clone(&order)))
            .await
            .unwrap();

        assert_eq!(report.outcome, BatchOutcome::DryRun);
        assert_eq!(report.total, 2);
        assert_eq!(report.skipped, 2);
        assert!(order.lock().unwrap().is_empty());
    }

    /// Cancellation lets in-flight work finish and skips the rest.
    #[tokio::test]
    async fn test_cancellation() {
        let scheduler = scheduler(BatchOptions {
            concurrency: 1,
            ..BatchOptions::default()
        });
        let cancellation = scheduler.cancellation();

        let jobs: Vec<BatchJob> = (0..6)
            .map(|i| BatchJob::new(format!("j{i}"), format!("http://h/{i}"), format!("{i}.pdf")))
            .collect();

        let dispatch = {
            let cancellation = cancellation.clone();
            move |job: BatchJob| {
                let cancellation = cancellation.clone();
                async move {
                    // The second admitted job pulls the plug mid-run.
                    if job.id == "j1" {
                        cancellation.cancel();
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(ok_descriptor(&job.id))
                }
            }
        };

        let report = scheduler.run(jobs, dispatch).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::Cancelled);
        // In-flight jobs finished; the tail was skipped.
        assert!(report.completed >= 1);
        assert!(report.skipped >= 1);
        assert_eq!(report.total, 6);
        assert_eq!(report.completed + report.skipped, 6);
    }

    /// Memory pressure cuts the effective concurrency multiplicatively
    /// within one tick (end-to-end scenario 5 at unit scale).
    #[tokio::test]
    async fn test_pressure_shrinks_concurrency() {
        let monitor = ResourceMonitor::new(AlertThresholds::default());
        let optimizer = PoolOptimizer::new(1, 16, OptimizerSettings::default());
        let scheduler = BatchScheduler::new(
            BatchOptions {
                concurrency: 8,
                ..BatchOptions::default()
            },
            monitor.clone(),
            optimizer,
        );

        let jobs: Vec<BatchJob> = (0..10)
            .map(|i| BatchJob::new(format!("j{i}"), format!("http://h/{i}"), format!("{i}.pdf")))
            .collect();

        let monitor_for_dispatch = monitor.clone();
        let injected = Arc::new(AtomicBool::new(false));
        let dispatch = {
            let injected = Arc::clone(&injected);
            move |job: BatchJob| {
                let monitor = monitor_for_dispatch.clone();
                let injected = Arc::clone(&injected);
                async move {
                    if !injected.swap(true, Ordering::SeqCst) {
                        let mut sample = ResourceSample::empty();
                        sample.memory_usage = 0.9;
                        monitor.inject_sample(sample);
                    }
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    Ok(ok_descriptor(&job.id))
                }
            }
        };

        let handle = {
            let effective = Arc::clone(&scheduler.effective);
            tokio::spawn(async move {
                // Poll the shared gauge while the batch runs; the minimum
                // observed must honor the multiplicative cut.
                let mut min_seen = usize::MAX;
                for _ in 0..40 {
                    min_seen = min_seen.min(effective.load(Ordering::Acquire));
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                min_seen
            })
        };

        let report = scheduler.run(jobs, dispatch).await.unwrap();
        assert_eq!(report.completed, 10);

        let min_seen = handle.await.unwrap();
        // ceil(8 * 0.7) = 6.
        assert!(
            min_seen <= 6,
            "effective concurrency should drop to at most 6, saw {min_seen}"
        );
    }

    /// Priority orders ready jobs; insertion order breaks ties.
    #[tokio::test]
    async fn test_priority_ordering() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let scheduler = scheduler(BatchOptions {
            concurrency: 1,
            ..BatchOptions::default()
        });

        let jobs = vec![
            BatchJob::new("low", "http://h/l", "l.pdf").with_priority(0),
            BatchJob::new("high", "http://h/h", "h.pdf").with_priority(5),
            BatchJob::new("mid-a", "http://h/m1", "m1.pdf").with_priority(3),
            BatchJob::new("mid-b", "http://h/m2", "m2.pdf").with_priority(3),
        ];
        let report = scheduler
            .run(jobs, recording_dispatch(Arc::clone(&order)))
            .await
            .unwrap();
        assert_eq!(report.completed, 4);

        let order = order.lock().unwrap();
        assert_eq!(
            *order,
            vec![
                "high".to_string(),
                "mid-a".to_string(),
                "mid-b".to_string(),
                "low".to_string()
            ]
        );
    }
}
