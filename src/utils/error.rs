//! Error types for pg-tuning-bench

use std::io;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum TuningError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Workload error: {0}")]
    Workload(#[from] WorkloadError),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TuningError {
    /// Transport failures end the whole run; everything else ends at most one round.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TuningError::Connection(e) if e.is_transport())
    }
}

/// Errors talking to the target service
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {target}: {reason}")]
    ConnectFailed { target: String, reason: String },

    /// The session is gone (socket closed, protocol desync, server shutdown)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The server rejected or failed the statement; the session is still usable
    #[error("Statement failed: {0}")]
    Execution(String),
}

impl ConnectionError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectFailed { .. } | ConnectionError::Transport(_)
        )
    }
}

/// Tunable parameter parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Unsupported parameter '{0}'")]
    Unknown(String),

    #[error("Invalid value '{value}' for {parameter}: {reason}")]
    InvalidValue {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Parameter {0} listed more than once")]
    Duplicate(String),

    #[error("Invalid bounds for {parameter}: {reason}")]
    InvalidBounds { parameter: String, reason: String },
}

/// Workload definition errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkloadError {
    #[error("Duplicate probe label '{0}'")]
    DuplicateLabel(String),

    #[error("Workload '{0}' has no queries")]
    Empty(String),
}

/// Result persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, TuningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_fatal() {
        let err: TuningError = ConnectionError::Transport("connection reset".to_string()).into();
        assert!(err.is_fatal());

        let err: TuningError = ConnectionError::ConnectFailed {
            target: "localhost:5432".to_string(),
            reason: "refused".to_string(),
        }
        .into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_execution_errors_are_not_fatal() {
        let err: TuningError =
            ConnectionError::Execution("permission denied to set parameter".to_string()).into();
        assert!(!err.is_fatal());

        let err: TuningError = ParameterError::Unknown("shared_buffers".to_string()).into();
        assert!(!err.is_fatal());
    }
}
