//! Service connection trait
//!
//! This trait abstracts the blocking request/response session to the tuned
//! server. The harness only needs three things from it: run a command, run a
//! query and consume its whole result, and know whether the session is dead.
//!
//! Implementations:
//! - `PgConnection`: PostgreSQL through the `postgres` crate
//! - `MockService` (tests): scripted in-process server

use std::sync::Arc;

use parking_lot::Mutex;

use crate::utils::ConnectionError;

/// Fully materialized result of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Rows in text form; `None` is SQL NULL
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First column of the first row
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }
}

/// Blocking session to the tuned service
///
/// A session is not safe for concurrent use; callers that share one across
/// threads wrap it in a [`SharedConnection`].
pub trait ServiceConnection: Send {
    /// Execute one or more statements, discarding any rows
    fn execute(&mut self, sql: &str) -> Result<(), ConnectionError>;

    /// Execute a query and read its entire result
    fn query(&mut self, sql: &str) -> Result<ResultSet, ConnectionError>;

    /// Whether the underlying transport is known to be gone
    fn is_closed(&self) -> bool;
}

/// Session shared between the controller and the probe threads it spawns
pub type SharedConnection = Arc<Mutex<Box<dyn ServiceConnection>>>;

pub fn share(conn: Box<dyn ServiceConnection>) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

/// Something that can open fresh, independent sessions
pub trait ConnectionSource: Send + Sync {
    fn connect(&self) -> Result<Box<dyn ServiceConnection>, ConnectionError>;

    /// Human-readable target for log messages
    fn describe(&self) -> String;
}

/// Extension trait with the parameter commands the controller needs
///
/// These are convenience methods built on top of [`ServiceConnection`].
/// Parameter names passed here must come from the allow-list in
/// `config::parameter`; values must already be in canonical form.
pub trait ServiceConnectionExt: ServiceConnection {
    /// `SHOW <name>`
    fn show(&mut self, name: &str) -> Result<String, ConnectionError> {
        let result = self.query(&format!("SHOW {}", name))?;
        result.scalar().map(str::to_string).ok_or_else(|| {
            ConnectionError::Execution(format!("SHOW {} returned no value", name))
        })
    }

    /// `SET <name> = '<value>'` inside a transaction that is committed
    ///
    /// On failure the transaction is rolled back so the session stays usable.
    fn set_committed(&mut self, name: &str, value: &str) -> Result<(), ConnectionError> {
        self.execute("BEGIN")?;
        if let Err(e) = self.execute(&format!("SET {} = '{}'", name, value)) {
            if !e.is_transport() {
                self.execute("ROLLBACK").ok();
            }
            return Err(e);
        }
        self.execute("COMMIT")
    }

    /// `SELECT 1` liveness check
    fn ping(&mut self) -> Result<bool, ConnectionError> {
        Ok(self.query("SELECT 1")?.scalar() == Some("1"))
    }
}

// Blanket implementation: any ServiceConnection automatically gets ServiceConnectionExt
impl<T: ServiceConnection + ?Sized> ServiceConnectionExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockService;

    #[test]
    fn test_show_returns_scalar() {
        let service = MockService::new();
        service.set_setting("work_mem", "4MB");
        let mut conn = service.open();
        assert_eq!(conn.show("work_mem").unwrap(), "4MB");
    }

    #[test]
    fn test_set_committed_wraps_in_transaction() {
        let service = MockService::new();
        let mut conn = service.open();
        conn.set_committed("work_mem", "16MB").unwrap();

        assert_eq!(service.setting("work_mem").as_deref(), Some("16MB"));
        let log = service.statements();
        assert_eq!(log, vec!["BEGIN", "SET work_mem = '16MB'", "COMMIT"]);
    }

    #[test]
    fn test_set_failure_rolls_back() {
        let service = MockService::new();
        service.fail_statements_containing("SET work_mem");
        let mut conn = service.open();

        let err = conn.set_committed("work_mem", "16MB").unwrap_err();
        assert!(!err.is_transport());
        assert_eq!(service.statements().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn test_ping() {
        let service = MockService::new();
        let mut conn = service.open();
        assert!(conn.ping().unwrap());
    }

    #[test]
    fn test_result_set_scalar() {
        let empty = ResultSet::default();
        assert_eq!(empty.scalar(), None);
        assert_eq!(empty.row_count(), 0);

        let rs = ResultSet {
            rows: vec![vec![Some("a".to_string()), None], vec![None, None]],
        };
        assert_eq!(rs.scalar(), Some("a"));
        assert_eq!(rs.row_count(), 2);
    }
}
