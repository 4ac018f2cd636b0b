//! Configuration module

pub mod cli;
pub mod harness_config;
pub mod parameter;
pub mod runtime_config;

pub use cli::{CliArgs, SearchMode};
pub use harness_config::{HarnessConfig, StrategyConfig, DEFAULT_GRID};
pub use parameter::{ParameterSet, ParameterValue, TunableParameter, ValueKind, REAL_EPSILON};
pub use runtime_config::{AppliedSet, ParameterController, VerifiedValue};
