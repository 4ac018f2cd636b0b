//! Batch Executor
//!
//! Runs one full probe batch under the active parameter set:
//!
//! 1. The base workload, sequentially on the primary connection
//! 2. In enhanced mode, the analytic probe, then the concurrent sub-batch
//!
//! The concurrent sub-batch is served by a bounded pool of worker threads.
//! Each worker opens its own connection and applies the round's parameters to
//! it before claiming probes, since `SET` only affects the session it ran on.
//! Results are keyed by submission position, never by completion order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use super::query_runner::{ProbeOutcome, QueryRunner, DEFAULT_DEADLINE};
use crate::client::{share, ConnectionSource};
use crate::config::{ParameterController, ParameterSet};
use crate::workload::{concurrent_label, Suite, CONCURRENT_TOTAL_LABEL};

/// Default cap on concurrent probe workers
pub const DEFAULT_POOL_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Per-probe deadline
    pub deadline: Duration,
    /// Maximum concurrent workers for the concurrent sub-batch
    pub pool_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// One labelled sample
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSample {
    pub label: String,
    pub outcome: ProbeOutcome,
}

impl ProbeSample {
    pub fn sample(&self) -> f64 {
        self.outcome.sample()
    }
}

impl Serialize for ProbeSample {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let status = match self.outcome {
            ProbeOutcome::Completed { .. } => "completed",
            ProbeOutcome::TimedOut { .. } => "timed_out",
            ProbeOutcome::Failed { .. } => "failed",
        };
        let mut s = serializer.serialize_struct("ProbeSample", 3)?;
        s.serialize_field("label", &self.label)?;
        s.serialize_field("seconds", &self.sample())?;
        s.serialize_field("status", status)?;
        s.end()
    }
}

/// Every sample from one batch, in emission order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    samples: Vec<ProbeSample>,
}

impl BatchResult {
    pub fn push(&mut self, label: impl Into<String>, outcome: ProbeOutcome) {
        self.samples.push(ProbeSample {
            label: label.into(),
            outcome,
        });
    }

    pub fn samples(&self) -> &[ProbeSample] {
        &self.samples
    }

    pub fn labels(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.label.as_str()).collect()
    }

    /// Sample recorded under `label`
    pub fn get(&self, label: &str) -> Option<f64> {
        self.samples.iter().find(|s| s.label == label).map(ProbeSample::sample)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of all samples, sentinels included
    pub fn total(&self) -> f64 {
        self.samples.iter().map(ProbeSample::sample).sum()
    }

    pub fn failures(&self) -> usize {
        self.samples.iter().filter(|s| s.outcome.is_failed()).count()
    }

    pub fn timeouts(&self) -> usize {
        self.samples.iter().filter(|s| s.outcome.is_timed_out()).count()
    }
}

/// Runs batches of a suite
pub struct BatchExecutor<'a> {
    suite: &'a Suite,
    source: &'a dyn ConnectionSource,
    controller: ParameterController,
    config: BatchConfig,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(suite: &'a Suite, source: &'a dyn ConnectionSource, config: BatchConfig) -> Self {
        Self {
            suite,
            source,
            controller: ParameterController::new(),
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run the whole suite; `active` is what the primary connection currently has
    pub fn run_batch(&self, runner: &QueryRunner, active: &ParameterSet) -> BatchResult {
        let deadline = self.config.deadline;
        let mut result = BatchResult::default();

        for probe in self.suite.base().probes() {
            let outcome = runner.run(&probe.label, &probe.query, deadline);
            result.push(probe.label.clone(), outcome);
        }

        if let Some(ext) = self.suite.extension() {
            let outcome = runner.run(&ext.analytic.label, &ext.analytic.query, deadline);
            result.push(ext.analytic.label.clone(), outcome);

            if !ext.concurrent.is_empty() {
                let (outcomes, span) = self.run_concurrent(&ext.concurrent, active);
                let rows = outcomes
                    .iter()
                    .map(|o| match o {
                        ProbeOutcome::Completed { rows, .. } => *rows,
                        _ => 0,
                    })
                    .sum();
                for (index, outcome) in outcomes.into_iter().enumerate() {
                    result.push(concurrent_label(index), outcome);
                }
                result.push(
                    CONCURRENT_TOTAL_LABEL,
                    ProbeOutcome::Completed { elapsed: span, rows },
                );
            }
        }

        info!(
            "Batch complete: {} samples, total {:.4}s ({} failed, {} timed out)",
            result.len(),
            result.total(),
            result.failures(),
            result.timeouts()
        );
        result
    }

    /// Run `queries` on the worker pool; outcomes are in submission order
    ///
    /// The span runs from the first dispatch to the last completion, so worker
    /// connection setup is not part of it.
    fn run_concurrent(&self, queries: &[String], active: &ParameterSet) -> (Vec<ProbeOutcome>, Duration) {
        let workers = self.config.pool_size.max(1).min(queries.len());
        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<ProbeOutcome>>> = Mutex::new(vec![None; queries.len()]);
        let deadline = self.config.deadline;
        let controller = self.controller;
        let source = self.source;

        // First dispatch and last completion across all workers
        let window: Mutex<Option<(Instant, Instant)>> = Mutex::new(None);

        debug!("Running {} concurrent probes on {} workers", queries.len(), workers);
        thread::scope(|scope| {
            for worker_id in 0..workers {
                let next = &next;
                let slots = &slots;
                let window = &window;
                let spawned = thread::Builder::new()
                    .name(format!("batch-worker-{}", worker_id))
                    .spawn_scoped(scope, move || {
                        let conn = match source.connect() {
                            Ok(conn) => share(conn),
                            Err(e) => {
                                error!(worker_id, error = %e, "Worker could not open a connection");
                                return;
                            }
                        };
                        {
                            let mut guard = conn.lock();
                            if let Err(e) = controller.apply_set(&mut **guard, active) {
                                error!(worker_id, error = %e, "Worker could not apply parameters");
                                return;
                            }
                        }

                        let runner = QueryRunner::new(conn);
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            if index >= queries.len() {
                                break;
                            }
                            let dispatched = Instant::now();
                            let outcome = runner.run(&concurrent_label(index), &queries[index], deadline);
                            let finished = Instant::now();
                            slots.lock()[index] = Some(outcome);

                            let mut bounds = window.lock();
                            *bounds = Some(match *bounds {
                                Some((first, last)) => (first.min(dispatched), last.max(finished)),
                                None => (dispatched, finished),
                            });
                        }
                    });
                if let Err(e) = spawned {
                    error!(worker_id, error = %e, "Failed to spawn batch worker");
                }
            }
        });
        let span = window
            .into_inner()
            .map(|(first, last)| last.duration_since(first))
            .unwrap_or(Duration::ZERO);

        let outcomes = slots
            .into_inner()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| ProbeOutcome::Failed {
                    error: format!("no worker ran {}", concurrent_label(index)),
                })
            })
            .collect();
        (outcomes, span)
    }
}
