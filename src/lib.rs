//! pg-tuning-bench library
//!
//! Benchmark harness that measures a fixed probe suite under different
//! PostgreSQL runtime parameter settings and searches for the fastest one.

pub mod benchmark;
pub mod client;
pub mod config;
pub mod metrics;
pub mod optimizer;
pub mod store;
pub mod utils;
pub mod workload;
