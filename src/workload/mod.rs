//! Probe workloads and the dataset they run against

pub mod dataset;
pub mod suite;

pub use dataset::{prepare, DatasetSpec, DatasetStatus};
pub use suite::{concurrent_label, Extension, Probe, Suite, Workload, CONCURRENT_TOTAL_LABEL};
