//! Base dataset the probe suites query
//!
//! Creates `users` and `orders` and fills them once. Safe to call on a
//! database that is already populated: existing rows are left alone.

use tracing::{info, warn};

use crate::client::ServiceConnection;
use crate::utils::{ConnectionError, Result};

/// Size of the generated dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    pub users: u64,
    pub orders: u64,
}

impl Default for DatasetSpec {
    fn default() -> Self {
        Self {
            users: 10_000,
            orders: 100_000,
        }
    }
}

/// What `prepare` found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    Created { users: u64, orders: u64 },
    AlreadyPopulated { users: u64 },
}

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100),
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS orders (
        id SERIAL PRIMARY KEY,
        user_id INTEGER REFERENCES users(id),
        total_amount DECIMAL(10, 2),
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
";

/// Create and populate the dataset inside one transaction
pub fn prepare(conn: &mut dyn ServiceConnection, spec: &DatasetSpec) -> Result<DatasetStatus> {
    conn.execute("BEGIN")?;
    match populate(conn, spec) {
        Ok(status) => {
            conn.execute("COMMIT")?;
            if matches!(status, DatasetStatus::Created { .. }) {
                // Fresh planner statistics so the first round is not skewed
                if let Err(e) = conn.execute("ANALYZE users; ANALYZE orders") {
                    warn!("ANALYZE after dataset load failed: {}", e);
                }
            }
            info!("Test environment ready: {:?}", status);
            Ok(status)
        }
        Err(e) => {
            if !e.is_transport() {
                conn.execute("ROLLBACK").ok();
            }
            Err(e.into())
        }
    }
}

fn populate(
    conn: &mut dyn ServiceConnection,
    spec: &DatasetSpec,
) -> std::result::Result<DatasetStatus, ConnectionError> {
    conn.execute(CREATE_TABLES)?;

    let existing = conn.query("SELECT COUNT(*) FROM users")?;
    let users: u64 = existing
        .scalar()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| ConnectionError::Execution("COUNT(*) returned no number".to_string()))?;
    if users > 0 {
        return Ok(DatasetStatus::AlreadyPopulated { users });
    }

    conn.execute(&format!(
        "INSERT INTO users (id, name) SELECT g, 'User' || g FROM generate_series(1, {}) AS g",
        spec.users
    ))?;
    conn.execute("SELECT setval(pg_get_serial_sequence('users', 'id'), (SELECT MAX(id) FROM users))")?;
    conn.execute(&format!(
        "INSERT INTO orders (user_id, total_amount) \
         SELECT floor(random() * {} + 1)::int, (random() * 1000)::numeric(10, 2) \
         FROM generate_series(1, {})",
        spec.users, spec.orders
    ))?;

    Ok(DatasetStatus::Created {
        users: spec.users,
        orders: spec.orders,
    })
}
