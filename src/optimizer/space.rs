//! Bounded continuous search space
//!
//! Every dimension is mapped onto `[0, 1]` for the surrogate model. Points
//! coming back out are coerced to values the server accepts: sizes are
//! rounded to whole MB, reals to four decimals, both kept inside the bounds.

use crate::config::{ParameterSet, ParameterValue, TunableParameter, ValueKind};
use crate::utils::ParameterError;

const KB_PER_MB: f64 = 1024.0;

/// One tuned parameter and its inclusive bounds, in normalized numeric form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension {
    pub parameter: TunableParameter,
    pub low: f64,
    pub high: f64,
}

impl Dimension {
    pub fn new(
        parameter: TunableParameter,
        low: ParameterValue,
        high: ParameterValue,
    ) -> Result<Self, ParameterError> {
        let bounds = |reason: &str| ParameterError::InvalidBounds {
            parameter: parameter.name().to_string(),
            reason: reason.to_string(),
        };
        if low.kind() != parameter.kind() || high.kind() != parameter.kind() {
            return Err(bounds("bound kind does not match the parameter"));
        }
        let (low, high) = (low.as_f64(), high.as_f64());
        if low >= high {
            return Err(bounds("low must be below high"));
        }
        if parameter.kind() == ValueKind::Size && (high / KB_PER_MB).floor() < (low / KB_PER_MB).ceil() {
            return Err(bounds("range does not contain a whole MB"));
        }
        Ok(Self { parameter, low, high })
    }

    /// Parse `name:low:high`, e.g. `work_mem:4MB:256MB`
    pub fn parse(spec: &str) -> Result<Self, ParameterError> {
        let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
        let [name, low, high] = parts.as_slice() else {
            return Err(ParameterError::InvalidBounds {
                parameter: spec.to_string(),
                reason: "expected name:low:high".to_string(),
            });
        };
        let parameter = TunableParameter::parse(name)?;
        Self::new(parameter, parameter.parse_value(low)?, parameter.parse_value(high)?)
    }

    pub fn to_real(&self, unit: f64) -> f64 {
        self.low + unit.clamp(0.0, 1.0) * (self.high - self.low)
    }

    pub fn to_unit(&self, real: f64) -> f64 {
        ((real - self.low) / (self.high - self.low)).clamp(0.0, 1.0)
    }

    /// Server-acceptable value nearest to the unit coordinate
    pub fn realize(&self, unit: f64) -> ParameterValue {
        let real = self.to_real(unit);
        match self.parameter.kind() {
            ValueKind::Size => {
                let min_mb = (self.low / KB_PER_MB).ceil();
                let max_mb = (self.high / KB_PER_MB).floor();
                let mb = (real / KB_PER_MB).round().clamp(min_mb, max_mb);
                ParameterValue::Size {
                    kb: (mb * KB_PER_MB) as u64,
                }
            }
            ValueKind::Real => {
                let rounded = (real * 10_000.0).round() / 10_000.0;
                ParameterValue::Real(rounded.clamp(self.low, self.high))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    dims: Vec<Dimension>,
}

impl ParameterSpace {
    pub fn new(dims: Vec<Dimension>) -> Result<Self, ParameterError> {
        if dims.is_empty() {
            return Err(ParameterError::InvalidBounds {
                parameter: "<none>".to_string(),
                reason: "search space has no dimensions".to_string(),
            });
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].iter().any(|d| d.parameter == dim.parameter) {
                return Err(ParameterError::Duplicate(dim.parameter.name().to_string()));
            }
        }
        Ok(Self { dims })
    }

    pub fn dim(&self) -> usize {
        self.dims.len()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn sample_random(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        (0..self.dims.len()).map(|_| rng.f64()).collect()
    }

    /// Coerce a unit point into a parameter set
    pub fn realize(&self, unit: &[f64]) -> ParameterSet {
        let values = self
            .dims
            .iter()
            .zip(unit)
            .map(|(dim, u)| (dim.parameter, dim.realize(*u)))
            .collect();
        // Dimensions are unique and values take each dimension's own kind
        ParameterSet::new(values).unwrap_or_default()
    }

    /// Unit coordinates of a set, if it covers every dimension
    pub fn to_unit(&self, set: &ParameterSet) -> Option<Vec<f64>> {
        self.dims
            .iter()
            .map(|dim| set.get(dim.parameter).map(|v| dim.to_unit(v.as_f64())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension() {
        let dim = Dimension::parse("work_mem:4MB:256MB").unwrap();
        assert_eq!(dim.parameter, TunableParameter::WorkMem);
        assert_eq!(dim.low, 4096.0);
        assert_eq!(dim.high, 262_144.0);

        assert!(Dimension::parse("work_mem:4MB").is_err());
        assert!(Dimension::parse("work_mem:64MB:4MB").is_err());
        assert!(Dimension::parse("random_page_cost:1.0:1.0").is_err());
        assert!(Dimension::parse("work_mem:100kB:900kB").is_err());
    }

    #[test]
    fn test_sizes_round_to_whole_mb_within_bounds() {
        let dim = Dimension::parse("work_mem:4MB:256MB").unwrap();
        for unit in [0.0, 0.013, 0.5, 0.77, 1.0] {
            let ParameterValue::Size { kb } = dim.realize(unit) else {
                panic!("size dimension produced a real");
            };
            assert_eq!(kb % 1024, 0);
            assert!((4096..=262_144).contains(&kb));
        }
        assert_eq!(dim.realize(0.0), ParameterValue::Size { kb: 4096 });
        assert_eq!(dim.realize(1.0), ParameterValue::Size { kb: 262_144 });
    }

    #[test]
    fn test_reals_round_to_four_decimals() {
        let dim = Dimension::parse("random_page_cost:1.0:4.0").unwrap();
        let ParameterValue::Real(v) = dim.realize(0.123456789) else {
            panic!("real dimension produced a size");
        };
        assert_eq!(v, (v * 10_000.0).round() / 10_000.0);
        assert!((1.0..=4.0).contains(&v));
    }

    #[test]
    fn test_unit_round_trip() {
        let space = ParameterSpace::new(vec![
            Dimension::parse("work_mem:4MB:256MB").unwrap(),
            Dimension::parse("random_page_cost:1.0:4.0").unwrap(),
        ])
        .unwrap();
        let set = space.realize(&[0.5, 0.5]);
        assert_eq!(set.to_string(), "work_mem=130MB, random_page_cost=2.5");

        let unit = space.to_unit(&set).unwrap();
        assert!((unit[0] - 0.5).abs() < 0.01);
        assert!((unit[1] - 0.5).abs() < 1e-9);

        let partial = ParameterSet::parse([("work_mem", "8MB")]).unwrap();
        assert!(space.to_unit(&partial).is_none());
    }

    #[test]
    fn test_duplicate_dimensions_rejected() {
        let dim = Dimension::parse("work_mem:4MB:256MB").unwrap();
        assert!(ParameterSpace::new(vec![dim, dim]).is_err());
        assert!(ParameterSpace::new(Vec::new()).is_err());
    }
}
