//! Probe execution and round orchestration
//!
//! This module provides the measurement side of the harness:
//! - run_with_deadline: bounded wait on a worker thread
//! - QueryRunner: timed execution of one probe on the primary session
//! - BatchExecutor: one batch of probes, with the optional concurrent sub-batch
//! - Harness: the apply / measure / persist round loop

pub mod batch;
pub mod deadline;
pub mod orchestrator;
pub mod query_runner;

pub use batch::{BatchConfig, BatchExecutor, BatchResult, ProbeSample, DEFAULT_POOL_SIZE};
pub use deadline::{run_with_deadline, TaskOutcome};
pub use orchestrator::{Harness, HarnessOptions, RunSummary};
pub use query_runner::{ProbeOutcome, QueryRunner, DEFAULT_DEADLINE, ERROR_SENTINEL};
