//! Search strategy contract shared by grid and model-based search

use serde::Serialize;

use crate::config::ParameterSet;

/// One completed, persisted round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    /// 1-based round number
    pub round: usize,
    /// What the strategy proposed
    pub requested: ParameterSet,
    /// What the server reported after applying it
    pub active: ParameterSet,
    /// Sum of the round's samples, sentinels included
    pub objective: f64,
}

/// Decides which configuration the next round runs
///
/// `history` holds only rounds whose samples were persisted. A proposal that
/// never shows up in the history (apply failed, store failed) is simply lost;
/// the strategy must not assume every proposal is observed.
pub trait SearchStrategy {
    fn name(&self) -> &str;

    /// Next configuration to try, or `None` when the search is done
    fn next(&mut self, history: &[RoundRecord]) -> Option<ParameterSet>;

    /// Number of proposals this strategy will make, when known up front
    fn total_hint(&self) -> Option<usize> {
        None
    }
}

/// Lowest-objective round so far
pub fn best_round(history: &[RoundRecord]) -> Option<&RoundRecord> {
    history
        .iter()
        .filter(|r| r.objective.is_finite())
        .min_by(|a, b| a.objective.total_cmp(&b.objective))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(round: usize, objective: f64) -> RoundRecord {
        RoundRecord {
            round,
            requested: ParameterSet::default(),
            active: ParameterSet::default(),
            objective,
        }
    }

    #[test]
    fn test_best_round_is_lowest_objective() {
        let history = vec![record(1, 3.0), record(2, 1.5), record(3, 2.0)];
        assert_eq!(best_round(&history).map(|r| r.round), Some(2));
        assert!(best_round(&[]).is_none());
    }
}
