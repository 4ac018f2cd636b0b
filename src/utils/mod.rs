//! Utility modules

pub mod error;

pub use error::{
    ConnectionError, ParameterError, Result, StoreError, TuningError, WorkloadError,
};
