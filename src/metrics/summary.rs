//! Per-configuration aggregation of stored samples
//!
//! Groups probe results by (parameter set, test label) and reduces the
//! non-sentinel samples to count, mean and p95. Timeout samples hold the
//! deadline and are counted like any completed sample.

use std::collections::HashMap;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::benchmark::ERROR_SENTINEL;
use crate::config::ParameterSet;
use crate::store::ProbeResult;

/// One hour, in microseconds
const MAX_TRACKABLE_US: u64 = 3_600_000_000;

/// Aggregate of one test label under one configuration
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub parameters: ParameterSet,
    pub test_name: String,
    /// Non-sentinel samples
    pub count: u64,
    /// Samples recorded as execution errors
    pub errors: u64,
    pub mean_secs: Option<f64>,
    pub p95_secs: Option<f64>,
}

struct Group {
    parameters: ParameterSet,
    test_name: String,
    histogram: Histogram<u64>,
    sum: f64,
    errors: u64,
}

impl Group {
    fn finish(self) -> ConfigSummary {
        let count = self.histogram.len();
        let (mean_secs, p95_secs) = if count == 0 {
            (None, None)
        } else {
            (
                Some(self.sum / count as f64),
                Some(self.histogram.value_at_quantile(0.95) as f64 / 1_000_000.0),
            )
        };
        ConfigSummary {
            parameters: self.parameters,
            test_name: self.test_name,
            count,
            errors: self.errors,
            mean_secs,
            p95_secs,
        }
    }
}

/// Aggregate results in order of first appearance, oldest first
pub fn summarize(results: &[ProbeResult]) -> Vec<ConfigSummary> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    let mut ordered: Vec<&ProbeResult> = results.iter().collect();
    ordered.sort_by_key(|r| (r.timestamp_us, r.id));

    for result in ordered {
        let key = (result.parameters.to_string(), result.test_name.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                parameters: result.parameters.clone(),
                test_name: result.test_name.clone(),
                histogram: Histogram::new_with_bounds(1, MAX_TRACKABLE_US, 3)
                    .expect("static histogram bounds are valid"),
                sum: 0.0,
                errors: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];

        if result.execution_time == ERROR_SENTINEL || result.execution_time < 0.0 {
            group.errors += 1;
            continue;
        }
        let us = ((result.execution_time * 1_000_000.0).round() as u64).clamp(1, MAX_TRACKABLE_US);
        group.histogram.saturating_record(us);
        group.sum += result.execution_time;
    }

    groups.into_iter().map(Group::finish).collect()
}

/// Print the aggregates as a compact table
pub fn print_summaries(summaries: &[ConfigSummary]) {
    println!("\n=== Per-configuration results ===");
    let mut current: Option<&ParameterSet> = None;
    for s in summaries {
        if current != Some(&s.parameters) {
            println!("\n[{}]", s.parameters);
            current = Some(&s.parameters);
        }
        match (s.mean_secs, s.p95_secs) {
            (Some(mean), Some(p95)) => println!(
                "  {:<28} n={:<3} mean={:.4}s p95={:.4}s{}",
                s.test_name,
                s.count,
                mean,
                p95,
                if s.errors > 0 {
                    format!(" errors={}", s.errors)
                } else {
                    String::new()
                }
            ),
            _ => println!("  {:<28} no successful samples (errors={})", s.test_name, s.errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: i64, params: &ParameterSet, label: &str, secs: f64) -> ProbeResult {
        ProbeResult {
            id,
            timestamp_us: id * 10,
            test_name: label.to_string(),
            execution_time: secs,
            parameters: params.clone(),
        }
    }

    #[test]
    fn test_groups_by_configuration_and_label() {
        let small = ParameterSet::parse([("work_mem", "4MB")]).unwrap();
        let large = ParameterSet::parse([("work_mem", "64MB")]).unwrap();
        // Newest first, as the store returns them
        let results = vec![
            result(4, &large, "A", 0.2),
            result(3, &small, "A", 0.3),
            result(2, &small, "B", 1.0),
            result(1, &small, "A", 0.1),
        ];

        let summaries = summarize(&results);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].parameters, small);
        assert_eq!(summaries[0].test_name, "A");
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].mean_secs.unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(summaries[2].parameters, large);
    }

    #[test]
    fn test_sentinels_excluded_from_statistics() {
        let params = ParameterSet::parse([("random_page_cost", "2.0")]).unwrap();
        let results = vec![
            result(1, &params, "A", 0.5),
            result(2, &params, "A", -1.0),
            result(3, &params, "B", -1.0),
        ];

        let summaries = summarize(&results);
        assert_eq!(summaries[0].count, 1);
        assert_eq!(summaries[0].errors, 1);
        assert!((summaries[0].mean_secs.unwrap() - 0.5).abs() < 1e-9);

        assert_eq!(summaries[1].count, 0);
        assert_eq!(summaries[1].errors, 1);
        assert_eq!(summaries[1].mean_secs, None);
    }

    #[test]
    fn test_p95_tracks_slow_tail() {
        let params = ParameterSet::default();
        let mut results: Vec<ProbeResult> = (0..19).map(|i| result(i, &params, "A", 0.01)).collect();
        results.push(result(19, &params, "A", 2.0));
        results.push(result(20, &params, "A", 2.0));

        let summary = &summarize(&results)[0];
        assert_eq!(summary.count, 21);
        let p95 = summary.p95_secs.unwrap();
        assert!(p95 > 1.9 && p95 < 2.1, "p95 was {}", p95);
    }
}
