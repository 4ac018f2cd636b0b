//! Sequential model-based parameter optimization
//!
//! Phase 1: Exploration - a few uniformly random points seed the model
//! Phase 2: Exploitation - a Gaussian-process surrogate scores random and
//! local candidates with an acquisition function; the best one runs next
//!
//! The objective is minimized (it is the summed latency of one round).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use super::space::ParameterSpace;
use super::strategy::{RoundRecord, SearchStrategy};
use super::surrogate::GaussianProcess;
use crate::config::ParameterSet;

/// Acquisition policy used to rank candidates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    /// Expected improvement over the best objective, with exploration margin `xi`
    ExpectedImprovement { xi: f64 },
    /// Lower confidence bound `mean - kappa * std`
    LowerConfidenceBound { kappa: f64 },
}

impl Default for Acquisition {
    fn default() -> Self {
        Acquisition::ExpectedImprovement { xi: 0.01 }
    }
}

impl Acquisition {
    /// Higher is better
    fn score(&self, mean: f64, std: f64, best: f64) -> f64 {
        match *self {
            Acquisition::ExpectedImprovement { xi } => {
                let improvement = best - mean - xi;
                if std <= 1e-12 {
                    return improvement.max(0.0);
                }
                let z = improvement / std;
                improvement * normal_cdf(z) + std * normal_pdf(z)
            }
            Acquisition::LowerConfidenceBound { kappa } => -(mean - kappa * std),
        }
    }
}

impl FromStr for Acquisition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ei" | "expected-improvement" => Ok(Acquisition::default()),
            "lcb" | "lower-confidence-bound" => Ok(Acquisition::LowerConfidenceBound { kappa: 1.96 }),
            other => Err(format!("unknown acquisition '{}' (expected ei or lcb)", other)),
        }
    }
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acquisition::ExpectedImprovement { xi } => write!(f, "ei(xi={})", xi),
            Acquisition::LowerConfidenceBound { kappa } => write!(f, "lcb(kappa={})", kappa),
        }
    }
}

/// Optimizer settings
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Total proposals, including the random ones
    pub rounds: usize,
    /// Random proposals before the surrogate is used
    pub initial_points: usize,
    /// Random candidates scored per proposal
    pub candidates: usize,
    /// Extra candidates sampled around the best point
    pub local_candidates: usize,
    pub acquisition: Acquisition,
    pub length_scale: f64,
    /// Observation noise on the standardized objective
    pub noise: f64,
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            rounds: 20,
            initial_points: 3,
            candidates: 256,
            local_candidates: 32,
            acquisition: Acquisition::default(),
            length_scale: 0.25,
            noise: 1e-3,
            seed: 42,
        }
    }
}

/// Single observed round
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub round: usize,
    /// Unit-cube coordinates the model was fed
    pub point: Vec<f64>,
    pub parameters: ParameterSet,
    pub objective: f64,
}

/// Result of optimization
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub round: usize,
    pub parameters: ParameterSet,
    pub objective: f64,
}

/// Gaussian-process search over a bounded space
pub struct BayesianSearch {
    space: ParameterSpace,
    config: OptimizerConfig,
    rng: fastrand::Rng,
    /// Proposals handed out so far
    proposed: usize,
    /// History entries already observed
    consumed: usize,
    /// Last proposal, used when a record cannot be mapped back onto the space
    pending: Option<Vec<f64>>,
    history: Vec<Measurement>,
    best_result: Option<OptimizationResult>,
}

impl BayesianSearch {
    pub fn new(space: ParameterSpace, config: OptimizerConfig) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(config.seed),
            space,
            config,
            proposed: 0,
            consumed: 0,
            pending: None,
            history: Vec::new(),
            best_result: None,
        }
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// Get best result found so far
    pub fn best_result(&self) -> Option<&OptimizationResult> {
        self.best_result.as_ref()
    }

    /// Get all measurements
    pub fn history(&self) -> &[Measurement] {
        &self.history
    }

    /// Check if the proposal budget is spent
    pub fn is_complete(&self) -> bool {
        self.proposed >= self.config.rounds
    }

    /// Record one (point, objective) observation
    pub fn observe(&mut self, round: usize, point: Vec<f64>, parameters: ParameterSet, objective: f64) {
        if !objective.is_finite() {
            return;
        }
        let is_better = self
            .best_result
            .as_ref()
            .map(|b| objective < b.objective)
            .unwrap_or(true);
        if is_better {
            self.best_result = Some(OptimizationResult {
                round,
                parameters: parameters.clone(),
                objective,
            });
        }
        self.history.push(Measurement {
            round,
            point,
            parameters,
            objective,
        });
    }

    /// Feed rounds the strategy has not seen yet
    fn ingest(&mut self, records: &[RoundRecord]) {
        let start = self.consumed.min(records.len());
        for record in &records[start..] {
            let point = self
                .space
                .to_unit(&record.active)
                .or_else(|| self.space.to_unit(&record.requested))
                .or_else(|| self.pending.clone());
            match point {
                Some(point) => self.observe(record.round, point, record.active.clone(), record.objective),
                None => debug!("Round {} does not cover the search space; skipped", record.round),
            }
        }
        self.consumed = records.len();
    }

    /// Next unit point to evaluate
    fn suggest(&mut self) -> Vec<f64> {
        if self.history.len() < self.config.initial_points {
            return self.space.sample_random(&mut self.rng);
        }

        let xs: Vec<Vec<f64>> = self.history.iter().map(|m| m.point.clone()).collect();
        let ys: Vec<f64> = self.history.iter().map(|m| m.objective).collect();
        let Some(model) = GaussianProcess::fit(&xs, &ys, self.config.length_scale, self.config.noise) else {
            debug!("Surrogate fit failed; falling back to a random point");
            return self.space.sample_random(&mut self.rng);
        };
        let best = ys.iter().copied().fold(f64::INFINITY, f64::min);

        let mut candidates: Vec<Vec<f64>> = (0..self.config.candidates)
            .map(|_| self.space.sample_random(&mut self.rng))
            .collect();
        if let Some(anchor) = self.best_point() {
            for _ in 0..self.config.local_candidates {
                let local = anchor
                    .iter()
                    .map(|x| (x + (self.rng.f64() - 0.5) * 0.2).clamp(0.0, 1.0))
                    .collect();
                candidates.push(local);
            }
        }

        let acquisition = self.config.acquisition;
        candidates
            .into_iter()
            .map(|c| {
                let (mean, std) = model.predict(&c);
                (acquisition.score(mean, std, best), c)
            })
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, c)| c)
            .unwrap_or_else(|| self.space.sample_random(&mut self.rng))
    }

    fn best_point(&self) -> Option<Vec<f64>> {
        self.history
            .iter()
            .min_by(|a, b| a.objective.total_cmp(&b.objective))
            .map(|m| m.point.clone())
    }

    /// Format optimization summary
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str(&format!(
            "Optimizer: {} over {} parameter(s)\n",
            self.config.acquisition,
            self.space.dim()
        ));
        s.push_str(&format!(
            "Proposals: {} of {} | Observed: {}\n",
            self.proposed,
            self.config.rounds,
            self.history.len()
        ));

        if let Some(ref best) = self.best_result {
            s.push_str("\nBest Result:\n");
            s.push_str(&format!("  round: {}\n", best.round));
            s.push_str(&format!("  parameters: {}\n", best.parameters));
            s.push_str(&format!("  objective: {:.4}s\n", best.objective));
        } else {
            s.push_str("\nNo round was observed.\n");
        }

        s.push_str("\nMeasurement History:\n");
        for m in &self.history {
            s.push_str(&format!(
                "  round={:3} objective={:9.4}s {}\n",
                m.round, m.objective, m.parameters
            ));
        }

        s
    }
}

impl SearchStrategy for BayesianSearch {
    fn name(&self) -> &str {
        "bayesian"
    }

    fn next(&mut self, history: &[RoundRecord]) -> Option<ParameterSet> {
        self.ingest(history);
        if self.is_complete() {
            return None;
        }
        let point = self.suggest();
        let parameters = self.space.realize(&point);
        self.pending = Some(point);
        self.proposed += 1;
        debug!("Proposal {}: {}", self.proposed, parameters);
        Some(parameters)
    }

    fn total_hint(&self) -> Option<usize> {
        Some(self.config.rounds)
    }
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz and Stegun 7.1.26; absolute error below 1.5e-7
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}
