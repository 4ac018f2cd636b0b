//! Tuning harness
//!
//! Drives the round loop: ask the search strategy for a parameter set, apply
//! and verify it on the primary session, run one probe batch, persist the
//! samples, and hand the round back to the strategy. Rounds run strictly one
//! after another.
//!
//! Per-round failures are logged at the round boundary and the run continues.
//! A transport failure ends the run after the held connections are released.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, warn};

use super::batch::{BatchConfig, BatchExecutor};
use super::query_runner::QueryRunner;
use crate::client::{share, ConnectionSource, SharedConnection};
use crate::config::{HarnessConfig, ParameterController, ParameterSet};
use crate::optimizer::{best_round, RoundRecord, SearchStrategy};
use crate::store::ResultStore;
use crate::utils::Result;
use crate::workload::{prepare, DatasetSpec, Suite};

/// Harness behaviour that is not part of the search itself
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub batch: BatchConfig,
    pub dataset: DatasetSpec,
    /// Skip dataset creation (assume loaded)
    pub skip_setup: bool,
    /// Keep rows from earlier runs instead of wiping the table
    pub keep_results: bool,
    pub show_progress: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            dataset: DatasetSpec::default(),
            skip_setup: false,
            keep_results: false,
            show_progress: true,
        }
    }
}

impl From<&HarnessConfig> for HarnessOptions {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            batch: config.batch,
            dataset: config.dataset,
            skip_setup: config.skip_setup,
            keep_results: config.keep_results,
            show_progress: !config.quiet,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub strategy: String,
    /// Proposals the strategy made
    pub attempted: usize,
    /// Rounds whose samples were persisted
    pub completed: usize,
    pub failed: usize,
    pub best: Option<RoundRecord>,
    pub rounds: Vec<RoundRecord>,
    pub duration_secs: f64,
}

impl RunSummary {
    /// Print summary (compact format)
    pub fn print_summary(&self) {
        println!("\n=== Tuning run ({}) ===", self.strategy);
        println!(
            "Rounds: {} attempted | {} completed{} | Duration: {:.2}s",
            self.attempted,
            self.completed,
            if self.failed > 0 {
                format!(" | {} failed", self.failed)
            } else {
                String::new()
            },
            self.duration_secs
        );
        for record in &self.rounds {
            println!("  round {:3}: {:9.4}s  [{}]", record.round, record.objective, record.active);
        }
        match &self.best {
            Some(best) => println!(
                "Best: round {} with total {:.4}s  [{}]",
                best.round, best.objective, best.active
            ),
            None => println!("Best: no round completed"),
        }
    }
}

/// Round orchestrator
pub struct Harness {
    source: Box<dyn ConnectionSource>,
    store: ResultStore,
    suite: Suite,
    options: HarnessOptions,
    controller: ParameterController,
}

impl Harness {
    pub fn new(
        source: Box<dyn ConnectionSource>,
        store: ResultStore,
        suite: Suite,
        options: HarnessOptions,
    ) -> Self {
        Self {
            source,
            store,
            suite,
            options,
            controller: ParameterController::new(),
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    /// Initialize storage and dataset, then run rounds until the strategy is done
    pub fn run(&mut self, strategy: &mut dyn SearchStrategy) -> Result<RunSummary> {
        let start = Instant::now();
        let Self {
            source,
            store,
            suite,
            options,
            controller,
        } = self;

        let conn = share(source.connect()?);
        info!("Connected to {}", source.describe());

        store.create_table()?;
        if !options.keep_results {
            store.wipe()?;
        }

        if options.skip_setup {
            info!("Skipping dataset setup");
        } else {
            let prepared = prepare(&mut **conn.lock(), &options.dataset);
            match prepared {
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Transport failure during dataset setup; ending run");
                    release(conn);
                    return Err(e);
                }
                Err(e) => error!(error = %e, "Dataset setup failed; continuing with the existing data"),
                Ok(_) => {}
            }
        }

        let runner = QueryRunner::new(conn.clone());
        let executor = BatchExecutor::new(suite, &**source, options.batch);
        let progress = progress_bar(strategy.total_hint(), options.show_progress);

        let mut history: Vec<RoundRecord> = Vec::new();
        let mut attempted = 0;
        let mut failed = 0;

        while let Some(requested) = strategy.next(&history) {
            attempted += 1;
            let round = attempted;
            progress.set_message(requested.to_string());

            match run_round(round, &requested, &conn, &runner, &executor, store, *controller) {
                Ok(record) => {
                    info!(round, objective = record.objective, "Round {} complete [{}]", round, record.active);
                    history.push(record);
                }
                Err(e) if e.is_fatal() => {
                    error!(round, parameters = %requested, error = %e, "Transport failure; ending run");
                    progress.abandon_with_message(format!("aborted in round {}", round));
                    drop(runner);
                    release(conn);
                    return Err(e);
                }
                Err(e) => {
                    error!(round, parameters = %requested, error = %e, "Round failed");
                    failed += 1;
                }
            }
            progress.inc(1);
        }
        progress.finish_with_message(format!("{} rounds", attempted));

        drop(runner);
        release(conn);

        Ok(RunSummary {
            strategy: strategy.name().to_string(),
            attempted,
            completed: history.len(),
            failed,
            best: best_round(&history).cloned(),
            rounds: history,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// apply -> batch -> persist for one parameter set
fn run_round(
    round: usize,
    requested: &ParameterSet,
    conn: &SharedConnection,
    runner: &QueryRunner,
    executor: &BatchExecutor<'_>,
    store: &mut ResultStore,
    controller: ParameterController,
) -> Result<RoundRecord> {
    let applied = {
        let mut guard = conn.lock();
        controller.apply_set(&mut **guard, requested)?
    };
    if !applied.is_exact() {
        warn!(round, "Server adjusted {} parameter(s); recording the active values", applied.mismatches().count());
    }
    let active = applied.active();

    let batch = executor.run_batch(runner, &active);
    store.append(&active, &batch)?;

    Ok(RoundRecord {
        round,
        requested: requested.clone(),
        active,
        objective: batch.total(),
    })
}

/// Drop the primary session; abandoned probes may still hold it until they return
fn release(conn: SharedConnection) {
    match conn.try_lock_for(Duration::from_millis(100)) {
        Some(guard) => drop(guard),
        None => warn!("Primary connection still busy with an abandoned probe; closing it when that probe returns"),
    }
    drop(conn);
}

fn progress_bar(total: Option<usize>, visible: bool) -> ProgressBar {
    let pb = match total {
        Some(total) => ProgressBar::new(total as u64),
        None => ProgressBar::new_spinner(),
    };
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
