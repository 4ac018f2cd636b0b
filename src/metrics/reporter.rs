//! Run report export
//!
//! Bundles the run summary, the per-configuration aggregates and the raw
//! stored samples into one JSON document.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use super::summary::ConfigSummary;
use crate::benchmark::RunSummary;
use crate::store::ProbeResult;

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport<'a> {
    pub summary: &'a RunSummary,
    pub configurations: &'a [ConfigSummary],
    pub results: &'a [ProbeResult],
}

impl<'a> RunReport<'a> {
    pub fn new(
        summary: &'a RunSummary,
        configurations: &'a [ConfigSummary],
        results: &'a [ProbeResult],
    ) -> Self {
        Self {
            summary,
            configurations,
            results,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tool": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "run": self.summary,
            "configurations": self.configurations,
            "results": self.results.iter().map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "timestamp_us": r.timestamp_us,
                    "test_name": r.test_name,
                    "execution_time": r.execution_time,
                    "parameters": r.parameters,
                })
            }).collect::<Vec<_>>()
        })
    }

    /// Write the report to a JSON file
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "{}", serde_json::to_string_pretty(&self.to_json())?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterSet;
    use crate::optimizer::RoundRecord;

    fn summary(active: &ParameterSet) -> RunSummary {
        let record = RoundRecord {
            round: 1,
            requested: active.clone(),
            active: active.clone(),
            objective: 0.25,
        };
        RunSummary {
            strategy: "grid".to_string(),
            attempted: 1,
            completed: 1,
            failed: 0,
            best: Some(record.clone()),
            rounds: vec![record],
            duration_secs: 1.5,
        }
    }

    #[test]
    fn test_report_json_shape() {
        let active = ParameterSet::parse([("work_mem", "16MB"), ("random_page_cost", "2.0")]).unwrap();
        let summary = summary(&active);
        let results = vec![ProbeResult {
            id: 1,
            timestamp_us: 1_700_000_000_000_000,
            test_name: "Simple select".to_string(),
            execution_time: 0.25,
            parameters: active.clone(),
        }];

        let json = RunReport::new(&summary, &[], &results).to_json();
        assert_eq!(json["run"]["strategy"], "grid");
        assert_eq!(json["run"]["best"]["round"], 1);
        assert_eq!(json["results"][0]["parameters"]["work_mem"], "16MB");
        assert_eq!(json["results"][0]["execution_time"], 0.25);
    }

    #[test]
    fn test_write_json_file() {
        let active = ParameterSet::parse([("work_mem", "4MB")]).unwrap();
        let summary = summary(&active);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        RunReport::new(&summary, &[], &[]).write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["run"]["completed"], 1);
        assert!(parsed["results"].as_array().unwrap().is_empty());
    }
}
