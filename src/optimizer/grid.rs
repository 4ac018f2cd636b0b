//! Exhaustive grid search
//!
//! The Cartesian product of every axis is computed once, up front, and handed
//! out in lexicographic order over the axis order given (last axis varies
//! fastest). Feedback is ignored.

use super::strategy::{RoundRecord, SearchStrategy};
use crate::config::{ParameterSet, ParameterValue, TunableParameter};
use crate::utils::ParameterError;

/// Values to try for one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    pub parameter: TunableParameter,
    pub values: Vec<ParameterValue>,
}

impl GridAxis {
    /// Parse `name=v1,v2,...`
    pub fn parse(spec: &str) -> Result<Self, ParameterError> {
        let (name, values) = spec.split_once('=').ok_or_else(|| ParameterError::InvalidValue {
            parameter: spec.to_string(),
            value: String::new(),
            reason: "expected name=v1,v2,...".to_string(),
        })?;
        let parameter = TunableParameter::parse(name.trim())?;
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| parameter.parse_value(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { parameter, values })
    }
}

pub struct GridSearch {
    points: Vec<ParameterSet>,
    cursor: usize,
}

impl GridSearch {
    pub fn new(axes: Vec<GridAxis>) -> Result<Self, ParameterError> {
        for (i, axis) in axes.iter().enumerate() {
            if axis.values.is_empty() {
                return Err(ParameterError::InvalidBounds {
                    parameter: axis.parameter.name().to_string(),
                    reason: "no values to try".to_string(),
                });
            }
            if axes[..i].iter().any(|a| a.parameter == axis.parameter) {
                return Err(ParameterError::Duplicate(axis.parameter.name().to_string()));
            }
        }

        let mut combos: Vec<Vec<(TunableParameter, ParameterValue)>> =
            if axes.is_empty() { Vec::new() } else { vec![Vec::new()] };
        for axis in &axes {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |value| {
                        let mut next = prefix.clone();
                        next.push((axis.parameter, *value));
                        next
                    })
                })
                .collect();
        }

        let points = combos
            .into_iter()
            .map(ParameterSet::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { points, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ParameterSet] {
        &self.points
    }
}

impl SearchStrategy for GridSearch {
    fn name(&self) -> &str {
        "grid"
    }

    fn next(&mut self, _history: &[RoundRecord]) -> Option<ParameterSet> {
        let point = self.points.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(point)
    }

    fn total_hint(&self) -> Option<usize> {
        Some(self.points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes(specs: &[&str]) -> Vec<GridAxis> {
        specs.iter().map(|s| GridAxis::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_round_count_is_product_size() {
        let mut grid = GridSearch::new(axes(&[
            "work_mem=4MB,16MB,64MB",
            "effective_cache_size=100MB,200MB",
            "random_page_cost=2.0,3.0",
        ]))
        .unwrap();
        assert_eq!(grid.total_hint(), Some(12));

        let mut rounds = 0;
        while grid.next(&[]).is_some() {
            rounds += 1;
        }
        assert_eq!(rounds, 12);
        assert!(grid.next(&[]).is_none());
    }

    #[test]
    fn test_last_axis_varies_fastest() {
        let grid = GridSearch::new(axes(&["work_mem=4MB,16MB", "random_page_cost=2.0,3.0"])).unwrap();
        let rendered: Vec<String> = grid.points().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "work_mem=4MB, random_page_cost=2",
                "work_mem=4MB, random_page_cost=3",
                "work_mem=16MB, random_page_cost=2",
                "work_mem=16MB, random_page_cost=3",
            ]
        );
    }

    #[test]
    fn test_two_round_grid() {
        let mut grid = GridSearch::new(axes(&["work_mem=4MB,8MB"])).unwrap();
        assert_eq!(grid.next(&[]).unwrap().to_string(), "work_mem=4MB");
        assert_eq!(grid.next(&[]).unwrap().to_string(), "work_mem=8MB");
        assert!(grid.next(&[]).is_none());
    }

    #[test]
    fn test_invalid_axes_rejected() {
        assert!(GridAxis::parse("shared_buffers=128MB").is_err());
        assert!(GridAxis::parse("work_mem").is_err());
        assert!(GridSearch::new(axes(&["work_mem="])).is_err());
        assert!(GridSearch::new(axes(&["work_mem=4MB", "work_mem=8MB"])).is_err());
    }

    #[test]
    fn test_empty_grid_proposes_nothing() {
        let mut grid = GridSearch::new(Vec::new()).unwrap();
        assert!(grid.is_empty());
        assert!(grid.next(&[]).is_none());
    }
}
