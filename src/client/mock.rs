//! Scripted in-process service for tests
//!
//! Understands just enough SQL for the harness: `BEGIN`/`COMMIT`/`ROLLBACK`,
//! `SET name = 'value'`, `SHOW name`, `SELECT 1` and anything containing
//! `pg_sleep(<seconds>)`, which blocks the calling thread for that long.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::control_plane::{ConnectionSource, ResultSet, ServiceConnection};
use crate::utils::ConnectionError;

#[derive(Default)]
struct MockState {
    settings: HashMap<String, String>,
    show_overrides: HashMap<String, String>,
    failing: Vec<String>,
    canned: Vec<(String, String)>,
    statements: Vec<(usize, String)>,
}

#[derive(Default)]
struct MockInner {
    state: Mutex<MockState>,
    closed: AtomicBool,
    refuse_connections: AtomicBool,
    connections: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Handle to a fake server; clones share state
#[derive(Clone, Default)]
pub struct MockService {
    inner: Arc<MockInner>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> Box<dyn ServiceConnection> {
        let id = self.inner.connections.fetch_add(1, Ordering::SeqCst);
        Box::new(MockConnection {
            id,
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn source(&self) -> MockSource {
        MockSource {
            service: self.clone(),
        }
    }

    pub fn set_setting(&self, name: &str, value: &str) {
        self.inner
            .state
            .lock()
            .settings
            .insert(name.to_string(), value.to_string());
    }

    pub fn setting(&self, name: &str) -> Option<String> {
        self.inner.state.lock().settings.get(name).cloned()
    }

    /// Make `SHOW name` report `value` no matter what was SET
    pub fn override_show(&self, name: &str, value: &str) {
        self.inner
            .state
            .lock()
            .show_overrides
            .insert(name.to_string(), value.to_string());
    }

    /// Statements containing `needle` fail with a server-side error
    pub fn fail_statements_containing(&self, needle: &str) {
        self.inner.state.lock().failing.push(needle.to_string());
    }

    /// Queries containing `needle` return a single row holding `value`
    pub fn respond_to(&self, needle: &str, value: &str) {
        self.inner
            .state
            .lock()
            .canned
            .push((needle.to_string(), value.to_string()));
    }

    /// Drop the transport: every later statement fails as a transport error
    pub fn shut_down(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn refuse_connections(&self) {
        self.inner.refuse_connections.store(true, Ordering::SeqCst);
    }

    pub fn statements(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .statements
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn statements_on(&self, connection: usize) -> Vec<String> {
        self.inner
            .state
            .lock()
            .statements
            .iter()
            .filter(|(id, _)| *id == connection)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn connections_opened(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Highest number of statements that were executing at the same time
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

pub struct MockSource {
    service: MockService,
}

impl ConnectionSource for MockSource {
    fn connect(&self) -> Result<Box<dyn ServiceConnection>, ConnectionError> {
        if self.service.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectFailed {
                target: self.describe(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.service.open())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

struct MockConnection {
    id: usize,
    inner: Arc<MockInner>,
}

impl MockConnection {
    fn run(&mut self, sql: &str) -> Result<ResultSet, ConnectionError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("server closed the connection".to_string()));
        }

        let sql = sql.trim().trim_end_matches(';').trim();
        let scalar_value = {
            let mut state = self.inner.state.lock();
            state.statements.push((self.id, sql.to_string()));
            if state.failing.iter().any(|needle| sql.contains(needle.as_str())) {
                return Err(ConnectionError::Execution(format!("mock failure: {}", sql)));
            }

            let upper = sql.to_uppercase();
            if let Some(name) = upper.strip_prefix("SHOW ") {
                let name = name.trim().to_lowercase();
                let value = state
                    .show_overrides
                    .get(&name)
                    .or_else(|| state.settings.get(&name))
                    .cloned();
                Some(value.ok_or_else(|| {
                    ConnectionError::Execution(format!("unrecognized parameter \"{}\"", name))
                })?)
            } else if upper.starts_with("SET ") {
                let body = &sql[4..];
                if let Some((name, value)) = body.split_once('=') {
                    let value = value.trim().trim_matches('\'').to_string();
                    state.settings.insert(name.trim().to_lowercase(), value);
                }
                None
            } else {
                state
                    .canned
                    .iter()
                    .find(|(needle, _)| sql.contains(needle.as_str()))
                    .map(|(_, value)| value.clone())
            }
        };

        if let Some(value) = scalar_value {
            return Ok(ResultSet {
                rows: vec![vec![Some(value)]],
            });
        }

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(secs) = parse_sleep(sql) {
            thread::sleep(Duration::from_secs_f64(secs));
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        let lower = sql.to_lowercase();
        if lower.starts_with("begin")
            || lower.starts_with("commit")
            || lower.starts_with("rollback")
            || lower.starts_with("set ")
        {
            return Ok(ResultSet::default());
        }
        if lower == "select 1" {
            return Ok(ResultSet {
                rows: vec![vec![Some("1".to_string())]],
            });
        }
        Ok(ResultSet {
            rows: vec![vec![Some(String::new())]],
        })
    }
}

fn parse_sleep(sql: &str) -> Option<f64> {
    let lower = sql.to_lowercase();
    let start = lower.find("pg_sleep(")? + "pg_sleep(".len();
    let end = start + lower[start..].find(')')?;
    lower[start..end].trim().parse().ok()
}

impl ServiceConnection for MockConnection {
    fn execute(&mut self, sql: &str) -> Result<(), ConnectionError> {
        self.run(sql).map(|_| ())
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet, ConnectionError> {
        self.run(sql)
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}
