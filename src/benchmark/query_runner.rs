//! Query Runner
//!
//! Executes one probe against the shared primary connection, bounded by a
//! deadline, and turns the result into a single numeric sample:
//!
//! - completed: elapsed seconds, measured on the executing thread
//! - timed out: the deadline in seconds
//! - failed: [`ERROR_SENTINEL`]
//!
//! A timed-out probe is abandoned, not cancelled. The statement keeps running
//! on the server and its thread keeps the connection lock until it returns, so
//! the next statement on the same connection waits behind it.

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::deadline::{run_with_deadline, TaskOutcome};
use crate::client::SharedConnection;

/// Sample recorded for a probe that failed
pub const ERROR_SENTINEL: f64 = -1.0;

/// Per-probe deadline used when none is configured
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// How one probe ended
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Completed { elapsed: Duration, rows: usize },
    TimedOut { deadline: Duration },
    Failed { error: String },
}

impl ProbeOutcome {
    /// The number persisted for this probe
    pub fn sample(&self) -> f64 {
        match self {
            ProbeOutcome::Completed { elapsed, .. } => elapsed.as_secs_f64(),
            ProbeOutcome::TimedOut { deadline } => deadline.as_secs_f64(),
            ProbeOutcome::Failed { .. } => ERROR_SENTINEL,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ProbeOutcome::Completed { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, ProbeOutcome::TimedOut { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProbeOutcome::Failed { .. })
    }
}

/// Runs probes on one connection
pub struct QueryRunner {
    conn: SharedConnection,
}

impl QueryRunner {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &SharedConnection {
        &self.conn
    }

    /// Run `query` and wait at most `deadline` for it
    pub fn run(&self, label: &str, query: &str, deadline: Duration) -> ProbeOutcome {
        let conn = self.conn.clone();
        let sql = query.to_string();
        let task = run_with_deadline(format!("probe-{}", label), deadline, move || {
            let mut guard = conn.lock();
            let start = Instant::now();
            let result = guard.query(&sql);
            (start.elapsed(), result)
        });

        let outcome = match task {
            Ok(TaskOutcome::Joined((elapsed, Ok(rows)))) => ProbeOutcome::Completed {
                elapsed,
                rows: rows.row_count(),
            },
            Ok(TaskOutcome::Joined((_, Err(e)))) => ProbeOutcome::Failed { error: e.to_string() },
            Ok(TaskOutcome::Abandoned) => ProbeOutcome::TimedOut { deadline },
            Ok(TaskOutcome::Panicked) => ProbeOutcome::Failed {
                error: "probe thread panicked".to_string(),
            },
            Err(e) => ProbeOutcome::Failed {
                error: format!("failed to spawn probe thread: {}", e),
            },
        };

        match &outcome {
            ProbeOutcome::Completed { elapsed, rows } => {
                debug!("{}: {:.4} seconds ({} rows)", label, elapsed.as_secs_f64(), rows)
            }
            ProbeOutcome::TimedOut { deadline } => warn!(
                label,
                deadline_secs = deadline.as_secs_f64(),
                "Probe timed out; it may still be running on the server"
            ),
            ProbeOutcome::Failed { error } => error!(label, error = %error, "Probe failed"),
        }
        outcome
    }
}
