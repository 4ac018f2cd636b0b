//! Result aggregation and reporting
//!
//! This module provides:
//! - Per-configuration aggregates (count, mean, p95) over stored samples
//! - JSON export of a finished run

pub mod reporter;
pub mod summary;

pub use reporter::RunReport;
pub use summary::{print_summaries, summarize, ConfigSummary};
