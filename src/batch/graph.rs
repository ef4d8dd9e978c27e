//! Dependency graph over expanded job ids.
//!
//! Built once per batch, after expansion and before any dispatch.
//! Construction validates that every referenced dependency exists and
//! that the graph is acyclic (Kahn's algorithm — the ids left with a
//! positive in-degree after peeling are exactly the cycle participants).
//!
//! At run time the graph answers two questions: which jobs are ready now,
//! and which jobs become ready (or must be skipped) when a job reaches a
//! terminal state.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{PrinteerError, Result};

use super::job::BatchJob;

#[derive(Debug)]
pub(crate) struct DependencyGraph {
    /// id → ids that depend on it.
    dependents: HashMap<String, Vec<String>>,
    /// id → unresolved dependency count.
    pending: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Build and validate the graph.
    ///
    /// # Errors
    ///
    /// - [`PrinteerError::Validation`] for a dependency on an unknown id.
    /// - [`PrinteerError::CycleDetected`] naming the ids stuck on a cycle.
    pub(crate) fn build(jobs: &[BatchJob]) -> Result<Self> {
        let ids: HashSet<&str> = jobs.iter().map(|j| j.id.as_str()).collect();

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending: HashMap<String, usize> = HashMap::new();

        for job in jobs {
            pending.insert(job.id.clone(), job.dependencies.len());
            for dependency in &job.dependencies {
                if !ids.contains(dependency.as_str()) {
                    return Err(PrinteerError::Validation(format!(
                        "job {:?} depends on unknown job {:?}",
                        job.id, dependency
                    )));
                }
                if dependency == &job.id {
                    return Err(PrinteerError::CycleDetected {
                        cycle: vec![job.id.clone()],
                    });
                }
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .push(job.id.clone());
            }
        }

        // Kahn's peel on a scratch copy; what survives is cyclic.
        let mut scratch = pending.clone();
        let mut queue: VecDeque<String> = scratch
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id.clone())
            .collect();
        let mut processed = 0usize;
        while let Some(id) = queue.pop_front() {
            processed += 1;
            for dependent in dependents.get(&id).into_iter().flatten() {
                let count = scratch.get_mut(dependent).unwrap();
                *count -= 1;
                if *count == 0 {
                    queue.push_back(dependent.clone());
                }
            }
        }
        if processed < jobs.len() {
            let mut cycle: Vec<String> = scratch
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(id, _)| id)
                .collect();
            cycle.sort();
            return Err(PrinteerError::CycleDetected { cycle });
        }

        Ok(Self {
            dependents,
            pending,
        })
    }

    /// Ids with no unresolved dependencies.
    pub(crate) fn initially_ready(&self) -> Vec<String> {
        self.pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Record `id` completed; returns ids that just became ready.
    pub(crate) fn complete(&mut self, id: &str) -> Vec<String> {
        let mut ready = Vec::new();
        for dependent in self.dependents.get(id).cloned().into_iter().flatten() {
            if let Some(count) = self.pending.get_mut(&dependent) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.push(dependent);
                }
            }
        }
        ready
    }

    /// Record `id` failed or skipped; returns every transitive dependent,
    /// all of which must be skipped.
    pub(crate) fn fail(&mut self, id: &str) -> Vec<String> {
        let mut skipped = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(id.to_string());
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents.get(&current).cloned().into_iter().flatten() {
                if seen.insert(dependent.clone()) {
                    // Never becomes ready; remove from the pending set so
                    // the scheduler's bookkeeping stays exact.
                    self.pending.remove(&dependent);
                    skipped.push(dependent.clone());
                    queue.push_back(dependent);
                }
            }
        }
        skipped
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
