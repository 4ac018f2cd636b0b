//! Durable result storage

pub mod result_store;

pub use result_store::{ProbeResult, ResultStore, TABLE_NAME};
