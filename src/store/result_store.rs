//! Result Store
//!
//! Append-only SQLite table of probe samples. Each row carries the full
//! parameter set that was active when the probe ran, one column per supported
//! parameter (NULL when the round did not set it).

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;
use tracing::{debug, info};

use crate::benchmark::BatchResult;
use crate::config::{ParameterSet, ParameterValue, TunableParameter, ValueKind};
use crate::utils::StoreError;

pub const TABLE_NAME: &str = "performance_tests";

/// One persisted sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub id: i64,
    /// Microseconds since the Unix epoch
    pub timestamp_us: i64,
    pub test_name: String,
    /// Elapsed seconds, the deadline on timeout, or -1 on error
    pub execution_time: f64,
    pub parameters: ParameterSet,
}

pub struct ResultStore {
    conn: Connection,
    last_timestamp_us: i64,
}

impl ResultStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        debug!("Opened result store at {}", path.display());
        Ok(Self {
            conn,
            last_timestamp_us: 0,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            last_timestamp_us: 0,
        })
    }

    /// Create the results table if it does not exist yet
    pub fn create_table(&mut self) -> Result<(), StoreError> {
        let columns: Vec<String> = TunableParameter::ALL
            .iter()
            .map(|p| format!("{} {}", p.name(), column_type(*p)))
            .collect();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp      INTEGER NOT NULL,
                {columns},
                execution_time REAL    NOT NULL,
                test_name      TEXT    NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table}(timestamp);",
            table = TABLE_NAME,
            columns = columns.join(",\n                "),
        ))?;

        // Keep timestamps non-decreasing across runs that keep old results
        self.last_timestamp_us = self.conn.query_row(
            &format!("SELECT COALESCE(MAX(timestamp), 0) FROM {}", TABLE_NAME),
            [],
            |row| row.get(0),
        )?;
        Ok(())
    }

    /// Delete every stored sample
    pub fn wipe(&mut self) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(&format!("DELETE FROM {}", TABLE_NAME), [])?;
        self.last_timestamp_us = 0;
        info!("Cleared {} previous results", deleted);
        Ok(deleted)
    }

    /// Persist every sample of a batch in one transaction; returns rows written
    pub fn append(&mut self, parameters: &ParameterSet, batch: &BatchResult) -> Result<usize, StoreError> {
        let timestamp = self.next_timestamp();
        let sql = format!(
            "INSERT INTO {} (timestamp, {}, execution_time, test_name) VALUES ({})",
            TABLE_NAME,
            TunableParameter::ALL.map(|p| p.name()).join(", "),
            placeholders(TunableParameter::ALL.len() + 3),
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for sample in batch.samples() {
                let mut values = Vec::with_capacity(TunableParameter::ALL.len() + 3);
                values.push(Value::Integer(timestamp));
                values.extend(TunableParameter::ALL.iter().map(|p| column_value(parameters.get(*p))));
                values.push(Value::Real(sample.sample()));
                values.push(Value::Text(sample.label.clone()));
                stmt.execute(params_from_iter(values.iter()))?;
            }
        }
        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;

        self.last_timestamp_us = timestamp;
        debug!("Stored {} samples for [{}]", batch.len(), parameters);
        Ok(batch.len())
    }

    /// Every stored sample, newest first
    pub fn all(&self) -> Result<Vec<ProbeResult>, StoreError> {
        let sql = format!(
            "SELECT id, timestamp, {}, execution_time, test_name FROM {} ORDER BY timestamp DESC, id DESC",
            TunableParameter::ALL.map(|p| p.name()).join(", "),
            TABLE_NAME,
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_row)?;

        let mut results = Vec::new();
        for row in rows {
            let (id, timestamp_us, raw, execution_time, test_name) = row?;
            results.push(ProbeResult {
                id,
                timestamp_us,
                test_name,
                execution_time,
                parameters: decode_parameters(id, raw)?,
            });
        }
        Ok(results)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", TABLE_NAME), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn next_timestamp(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        now.max(self.last_timestamp_us)
    }
}

type RawRow = (i64, i64, Vec<Value>, f64, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    let n = TunableParameter::ALL.len();
    let mut raw = Vec::with_capacity(n);
    for i in 0..n {
        raw.push(row.get::<_, Value>(2 + i)?);
    }
    Ok((row.get(0)?, row.get(1)?, raw, row.get(2 + n)?, row.get(3 + n)?))
}

fn decode_parameters(id: i64, raw: Vec<Value>) -> Result<ParameterSet, StoreError> {
    let corrupt = |reason: String| StoreError::CorruptRow { id, reason };
    let mut values = Vec::new();
    for (param, value) in TunableParameter::ALL.iter().zip(raw) {
        let parsed = match value {
            Value::Null => continue,
            Value::Text(text) => param.parse_value(&text),
            Value::Real(v) => param.parse_value(&v.to_string()),
            Value::Integer(v) => param.parse_value(&v.to_string()),
            Value::Blob(_) => return Err(corrupt(format!("{} holds a blob", param))),
        };
        values.push((*param, parsed.map_err(|e| corrupt(e.to_string()))?));
    }
    ParameterSet::new(values).map_err(|e| corrupt(e.to_string()))
}

fn column_type(parameter: TunableParameter) -> &'static str {
    match parameter.kind() {
        ValueKind::Size => "TEXT",
        ValueKind::Real => "REAL",
    }
}

fn column_value(value: Option<&ParameterValue>) -> Value {
    match value {
        None => Value::Null,
        Some(ParameterValue::Real(v)) => Value::Real(*v),
        Some(size) => Value::Text(size.canonical()),
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::ProbeOutcome;
    use std::time::Duration;

    fn batch(samples: &[(&str, f64)]) -> BatchResult {
        let mut batch = BatchResult::default();
        for (label, secs) in samples {
            let outcome = if *secs < 0.0 {
                ProbeOutcome::Failed {
                    error: "boom".to_string(),
                }
            } else {
                ProbeOutcome::Completed {
                    elapsed: Duration::from_secs_f64(*secs),
                    rows: 1,
                }
            };
            batch.push(*label, outcome);
        }
        batch
    }

    fn store() -> ResultStore {
        let mut store = ResultStore::open_in_memory().unwrap();
        store.create_table().unwrap();
        store
    }

    #[test]
    fn test_append_and_read_back() {
        let mut store = store();
        let params = ParameterSet::parse([("work_mem", "4MB"), ("random_page_cost", "2.0")]).unwrap();

        let written = store.append(&params, &batch(&[("A", 0.5), ("B", -1.0)])).unwrap();
        assert_eq!(written, 2);

        let rows = store.all().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.parameters == params));
        let b = rows.iter().find(|r| r.test_name == "B").unwrap();
        assert_eq!(b.execution_time, -1.0);
    }

    #[test]
    fn test_all_is_newest_first() {
        let mut store = store();
        let first = ParameterSet::parse([("work_mem", "4MB")]).unwrap();
        let second = ParameterSet::parse([("work_mem", "16MB")]).unwrap();
        store.append(&first, &batch(&[("A", 0.1)])).unwrap();
        store.append(&second, &batch(&[("A", 0.2)])).unwrap();

        let rows = store.all().unwrap();
        assert_eq!(rows[0].parameters, second);
        assert_eq!(rows[1].parameters, first);
        assert!(rows[0].timestamp_us >= rows[1].timestamp_us);
    }

    #[test]
    fn test_unset_parameters_stay_null() {
        let mut store = store();
        let params = ParameterSet::parse([("effective_cache_size", "200MB")]).unwrap();
        store.append(&params, &batch(&[("A", 0.1)])).unwrap();

        let rows = store.all().unwrap();
        assert_eq!(rows[0].parameters.len(), 1);
        assert_eq!(
            rows[0].parameters.get(TunableParameter::EffectiveCacheSize).map(|v| v.canonical()),
            Some("200MB".to_string())
        );
    }

    #[test]
    fn test_wipe_clears_rows() {
        let mut store = store();
        store.append(&ParameterSet::default(), &batch(&[("A", 0.1), ("B", 0.2)])).unwrap();
        assert_eq!(store.wipe().unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_append_rolls_back() {
        let mut store = store();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON performance_tests
                 WHEN NEW.test_name = 'Boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store.append(&ParameterSet::default(), &batch(&[("A", 0.1), ("Boom", 0.2)]));
        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_results_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.db");
        let params = ParameterSet::parse([("work_mem", "64MB")]).unwrap();
        {
            let mut store = ResultStore::open(&path).unwrap();
            store.create_table().unwrap();
            store.append(&params, &batch(&[("A", 0.3)])).unwrap();
        }

        let mut store = ResultStore::open(&path).unwrap();
        store.create_table().unwrap();
        let rows = store.all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parameters, params);
        assert!(store.last_timestamp_us >= rows[0].timestamp_us);
    }
}
