//! Batch job model and parametric expansion.
//!
//! A [`BatchJob`] arrives already parsed (batch-file formats live outside
//! the engine). Jobs may be *parametric*: `variables` values that are
//! lists expand into one concrete job per element of their Cartesian
//! product, with `{name}` placeholders substituted into the URL, output
//! path, preset and dependencies. Expanded ids are
//! `baseId-<value>…`, and the full expanded set must be id-unique.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::RenderOverlay;
use crate::error::{PrinteerError, Result};

/// A variable value: one scalar, or a list that multiplies the job.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    /// Substituted directly.
    Scalar(String),
    /// One expanded job per element.
    List(Vec<String>),
}

/// One conversion request inside a batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchJob {
    /// Job id; unique after expansion.
    pub id: String,
    /// URL to convert. May contain `{name}` placeholders.
    pub url: String,
    /// Output path. May contain `{name}` placeholders.
    pub output: String,
    /// Render overrides merged over the active configuration.
    #[serde(default)]
    pub config: Option<RenderOverlay>,
    /// Named render preset, resolved by the embedding CLI.
    #[serde(default)]
    pub preset: Option<String>,
    /// Template variables.
    #[serde(default)]
    pub variables: BTreeMap<String, VariableValue>,
    /// Higher runs earlier among ready jobs. Default 0.
    #[serde(default)]
    pub priority: i32,
    /// Ids this job waits for.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Per-job retry budget; falls back to the batch default.
    #[serde(default)]
    pub retry_budget: Option<u32>,
    /// Per-job timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl BatchJob {
    /// Minimal job for direct construction.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            output: output.into(),
            config: None,
            preset: None,
            variables: BTreeMap::new(),
            priority: 0,
            dependencies: Vec::new(),
            retry_budget: None,
            timeout_ms: None,
        }
    }

    /// Builder-style dependency list.
    pub fn depends_on(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The per-job timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Upper bound on parallel jobs; the optimizer may hold the effective
    /// value lower.
    pub concurrency: usize,
    /// Default retry budget per job.
    pub retry_attempts: u32,
    /// Keep going past job failures; `false` aborts the batch on the
    /// first unrecoverable one.
    pub continue_on_error: bool,
    /// Base directory for relative output paths.
    pub output_dir: Option<PathBuf>,
    /// Validate and expand only; dispatch nothing.
    pub dry_run: bool,
    /// Sweep temp residue after the batch finishes.
    pub cleanup: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            retry_attempts: 1,
            continue_on_error: true,
            output_dir: None,
            dry_run: false,
            cleanup: false,
        }
    }
}

/// Terminal state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Rendered successfully.
    Completed,
    /// Exhausted its retry budget.
    Failed,
    /// Never dispatched: failed dependency, cancellation or dry run.
    Skipped,
}

/// The record a batch keeps for each expanded job. Exactly one per job.
#[derive(Debug, Clone)]
pub struct BatchJobResult {
    /// Expanded job id.
    pub job_id: String,
    /// Terminal state.
    pub status: JobStatus,
    /// When the first attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the terminal state was reached.
    pub ended_at: Option<DateTime<Utc>>,
    /// Wall-clock time across attempts.
    pub duration: Option<Duration>,
    /// Where the output landed, on success.
    pub output_path: Option<PathBuf>,
    /// Last error, on failure.
    pub error: Option<String>,
    /// Retries consumed (0 means first attempt succeeded).
    pub retry_count: u32,
}

impl BatchJobResult {
    /// A skipped-job record.
    pub(crate) fn skipped(job_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Skipped,
            started_at: None,
            ended_at: None,
            duration: None,
            output_path: None,
            error: Some(reason.into()),
            retry_count: 0,
        }
    }
}

// ============================================================================
// Expansion
// ============================================================================

/// Substitute `{name}` placeholders from `values` into `input`.
fn substitute(input: &str, values: &BTreeMap<String, String>) -> String {
    let mut result = input.to_string();
    for (name, value) in values {
        result = result.replace(&format!("{{{name}}}"), value);
    }
    result
}

/// Materialize parametric jobs into concrete ones.
///
/// Scalar variables substitute in place. List variables multiply the job
/// by their Cartesian product; each expanded job's id is the base id with
/// `-<value>` appended per list variable, in variable-name order.
///
/// # Errors
///
/// [`PrinteerError::DuplicateId`] when two expanded jobs collide.
pub fn expand_jobs(jobs: &[BatchJob]) -> Result<Vec<BatchJob>> {
    let mut expanded = Vec::new();

    for job in jobs {
        let mut scalars = BTreeMap::new();
        let mut lists: Vec<(String, Vec<String>)> = Vec::new();
        for (name, value) in &job.variables {
            match value {
                VariableValue::Scalar(v) => {
                    scalars.insert(name.clone(), v.clone());
                }
                VariableValue::List(values) => lists.push((name.clone(), values.clone())),
            }
        }

        // Cartesian product over list variables; a job without lists
        // yields exactly one combination (the empty one).
        let mut combinations: Vec<Vec<(String, String)>> = vec![Vec::new()];
        for (name, values) in &lists {
            let mut next = Vec::with_capacity(combinations.len() * values.len());
            for combination in &combinations {
                for value in values {
                    let mut extended = combination.clone();
                    extended.push((name.clone(), value.clone()));
                    next.push(extended);
                }
            }
            combinations = next;
        }

        for combination in combinations {
            let mut values = scalars.clone();
            let mut id = job.id.clone();
            for (name, value) in &combination {
                values.insert(name.clone(), value.clone());
                id.push('-');
                id.push_str(value);
            }

            let mut concrete = job.clone();
            concrete.id = id;
            concrete.url = substitute(&job.url, &values);
            concrete.output = substitute(&job.output, &values);
            concrete.preset = job.preset.as_deref().map(|p| substitute(p, &values));
            concrete.dependencies = job
                .dependencies
                .iter()
                .map(|d| substitute(d, &values))
                .collect();
            concrete.variables = BTreeMap::new();
            expanded.push(concrete);
        }
    }

    let mut seen = HashSet::new();
    for job in &expanded {
        if !seen.insert(job.id.clone()) {
            return Err(PrinteerError::DuplicateId(job.id.clone()));
        }
    }

    Ok(expanded)
}

// ============================================================================
// Unit Tests
// ============================================================================
