//! Probe suites
//!
//! A suite is a base workload that always runs, plus an optional extension
//! (one heavier analytic probe and a concurrent ad-hoc sub-batch) selected by
//! configuration.

use std::collections::HashSet;

use crate::utils::WorkloadError;

/// Label of the wall-clock span of the concurrent sub-batch
pub const CONCURRENT_TOTAL_LABEL: &str = "Concurrent batch (total)";

/// Label of the concurrent probe submitted at `index`
pub fn concurrent_label(index: usize) -> String {
    format!("Concurrent query {}", index + 1)
}

/// A single labelled probe query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub label: String,
    pub query: String,
}

impl Probe {
    pub fn new(label: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            query: query.into(),
        }
    }
}

/// Ordered, uniquely labelled probe list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    name: String,
    probes: Vec<Probe>,
}

impl Workload {
    pub fn new(name: impl Into<String>, probes: Vec<Probe>) -> Result<Self, WorkloadError> {
        let name = name.into();
        if probes.is_empty() {
            return Err(WorkloadError::Empty(name));
        }
        let mut seen = HashSet::new();
        for probe in &probes {
            if !seen.insert(probe.label.as_str()) {
                return Err(WorkloadError::DuplicateLabel(probe.label.clone()));
            }
        }
        Ok(Self { name, probes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// The four-query suite over the users/orders dataset
    pub fn base() -> Self {
        Self {
            name: "base".to_string(),
            probes: vec![
                Probe::new("Simple SELECT", "SELECT * FROM users LIMIT 10000"),
                Probe::new(
                    "JOIN operation",
                    "SELECT orders.*, users.name FROM orders JOIN users ON orders.user_id = users.id LIMIT 10000",
                ),
                Probe::new(
                    "Aggregation",
                    "SELECT user_id, COUNT(*), AVG(total_amount) FROM orders GROUP BY user_id",
                ),
                Probe::new(
                    "Complex query",
                    "SELECT u.name, COUNT(o.id) AS order_count, AVG(o.total_amount) AS avg_order_amount \
                     FROM users u \
                     LEFT JOIN orders o ON u.id = o.user_id \
                     WHERE u.created_at > '2023-01-01' \
                     GROUP BY u.id \
                     HAVING COUNT(o.id) > 0 \
                     ORDER BY avg_order_amount DESC \
                     LIMIT 1000",
                ),
            ],
        }
    }
}

/// Extra probes run in enhanced mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Heavier query, run sequentially after the base workload
    pub analytic: Probe,
    /// Ad-hoc queries issued concurrently; labelled by submission position
    pub concurrent: Vec<String>,
}

impl Extension {
    pub fn enhanced() -> Self {
        Self {
            analytic: Probe::new(
                "Window analytics",
                "SELECT user_id, total_amount, \
                 SUM(total_amount) OVER (PARTITION BY user_id ORDER BY created_at) AS running_total, \
                 RANK() OVER (PARTITION BY user_id ORDER BY total_amount DESC) AS amount_rank \
                 FROM orders ORDER BY user_id, created_at LIMIT 20000",
            ),
            concurrent: vec![
                "SELECT COUNT(*) FROM orders WHERE total_amount > 500".to_string(),
                "SELECT user_id, SUM(total_amount) FROM orders GROUP BY user_id ORDER BY 2 DESC LIMIT 100"
                    .to_string(),
                "SELECT u.name, o.total_amount FROM users u JOIN orders o ON o.user_id = u.id WHERE o.total_amount < 10"
                    .to_string(),
                "SELECT date_trunc('hour', created_at) AS bucket, COUNT(*) FROM orders GROUP BY bucket"
                    .to_string(),
                "SELECT * FROM users WHERE name LIKE 'User1%' ORDER BY id DESC LIMIT 1000".to_string(),
            ],
        }
    }
}

/// Base workload plus an optional extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    base: Workload,
    extension: Option<Extension>,
}

impl Suite {
    /// Compose a suite, checking that every label a batch can produce is unique
    pub fn new(base: Workload, extension: Option<Extension>) -> Result<Self, WorkloadError> {
        let suite = Self { base, extension };
        let mut seen = HashSet::new();
        for label in suite.labels() {
            if !seen.insert(label.clone()) {
                return Err(WorkloadError::DuplicateLabel(label));
            }
        }
        Ok(suite)
    }

    /// The default suite, with or without the enhanced extension
    pub fn standard(enhanced: bool) -> Self {
        Self {
            base: Workload::base(),
            extension: enhanced.then(Extension::enhanced),
        }
    }

    pub fn base(&self) -> &Workload {
        &self.base
    }

    pub fn extension(&self) -> Option<&Extension> {
        self.extension.as_ref()
    }

    /// Every label one batch produces, in the order samples are emitted
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.base.probes().iter().map(|p| p.label.clone()).collect();
        if let Some(ext) = &self.extension {
            labels.push(ext.analytic.label.clone());
            labels.extend((0..ext.concurrent.len()).map(concurrent_label));
            if !ext.concurrent.is_empty() {
                labels.push(CONCURRENT_TOTAL_LABEL.to_string());
            }
        }
        labels
    }
}
