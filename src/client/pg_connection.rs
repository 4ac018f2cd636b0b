//! PostgreSQL session for probe and control traffic
//!
//! Wraps a blocking `postgres::Client`. Probes go through the simple query
//! protocol so arbitrary SQL can be sent and every row is pulled off the wire
//! as text, which keeps result materialization inside the measured time.

use std::time::Duration;

use postgres::{Client, Config, NoTls, SimpleQueryMessage};

use super::control_plane::{ConnectionSource, ResultSet, ServiceConnection};
use crate::utils::ConnectionError;

/// Blocking PostgreSQL session
pub struct PgConnection {
    client: Client,
}

impl PgConnection {
    /// Open a session using a prepared client config
    pub fn connect(config: &Config, target: &str) -> Result<Self, ConnectionError> {
        let client = config
            .connect(NoTls)
            .map_err(|e| ConnectionError::ConnectFailed {
                target: target.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

/// Server-reported errors leave the session usable; anything else means the
/// transport is gone or out of sync.
fn classify(err: postgres::Error) -> ConnectionError {
    if let Some(db) = err.as_db_error() {
        return ConnectionError::Execution(format!("{} ({})", db.message(), db.code().code()));
    }
    if err.is_closed() {
        return ConnectionError::Transport("connection closed".to_string());
    }
    ConnectionError::Transport(err.to_string())
}

impl ServiceConnection for PgConnection {
    fn execute(&mut self, sql: &str) -> Result<(), ConnectionError> {
        self.client.batch_execute(sql).map_err(classify)
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet, ConnectionError> {
        let messages = self.client.simple_query(sql).map_err(classify)?;

        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                rows.push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            }
        }
        Ok(ResultSet { rows })
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// Connection factory for creating sessions with common config
#[derive(Clone, Debug)]
pub struct ConnectionFactory {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub dbname: String,
    pub connect_timeout: Duration,
    pub application_name: String,
}

impl ConnectionFactory {
    fn client_config(&self) -> Config {
        let mut config = Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.dbname)
            .connect_timeout(self.connect_timeout)
            .application_name(&self.application_name);
        if let Some(ref password) = self.password {
            config.password(password);
        }
        config
    }

    /// Create a new PostgreSQL session
    pub fn create(&self) -> Result<PgConnection, ConnectionError> {
        PgConnection::connect(&self.client_config(), &self.describe())
    }
}

impl ConnectionSource for ConnectionFactory {
    fn connect(&self) -> Result<Box<dyn ServiceConnection>, ConnectionError> {
        Ok(Box::new(self.create()?))
    }

    fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}
