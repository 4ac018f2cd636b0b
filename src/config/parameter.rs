//! Tunable server parameters
//!
//! Only parameters listed in [`TunableParameter`] can be sent to the server.
//! Each one has a fixed value kind that decides how values are parsed,
//! rendered into `SET` statements, and compared after read-back.

use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::utils::ParameterError;

/// Tolerance for comparing real-valued parameters after read-back
pub const REAL_EPSILON: f64 = 1e-6;

const KB_PER_MB: u64 = 1024;
const KB_PER_GB: u64 = 1024 * 1024;
const KB_PER_TB: u64 = 1024 * 1024 * 1024;

/// How a parameter's value is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Memory size with unit, normalized to kB
    Size,
    /// Floating-point planner cost ratio
    Real,
}

/// Parameters the harness is allowed to tune
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TunableParameter {
    WorkMem,
    MaintenanceWorkMem,
    EffectiveCacheSize,
    RandomPageCost,
    SeqPageCost,
    CpuTupleCost,
    CpuIndexTupleCost,
}

impl TunableParameter {
    /// Every supported parameter, in result-table column order
    pub const ALL: [TunableParameter; 7] = [
        TunableParameter::WorkMem,
        TunableParameter::MaintenanceWorkMem,
        TunableParameter::EffectiveCacheSize,
        TunableParameter::RandomPageCost,
        TunableParameter::SeqPageCost,
        TunableParameter::CpuTupleCost,
        TunableParameter::CpuIndexTupleCost,
    ];

    /// Server-side GUC name
    pub fn name(&self) -> &'static str {
        match self {
            TunableParameter::WorkMem => "work_mem",
            TunableParameter::MaintenanceWorkMem => "maintenance_work_mem",
            TunableParameter::EffectiveCacheSize => "effective_cache_size",
            TunableParameter::RandomPageCost => "random_page_cost",
            TunableParameter::SeqPageCost => "seq_page_cost",
            TunableParameter::CpuTupleCost => "cpu_tuple_cost",
            TunableParameter::CpuIndexTupleCost => "cpu_index_tuple_cost",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            TunableParameter::WorkMem
            | TunableParameter::MaintenanceWorkMem
            | TunableParameter::EffectiveCacheSize => ValueKind::Size,
            TunableParameter::RandomPageCost
            | TunableParameter::SeqPageCost
            | TunableParameter::CpuTupleCost
            | TunableParameter::CpuIndexTupleCost => ValueKind::Real,
        }
    }

    /// Unit of a bare number, in kB (effective_cache_size counts 8kB pages)
    fn bare_unit_kb(&self) -> u64 {
        match self {
            TunableParameter::EffectiveCacheSize => 8,
            _ => 1,
        }
    }

    /// Parse a parameter name (case-insensitive)
    pub fn parse(name: &str) -> Result<Self, ParameterError> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == lower)
            .ok_or_else(|| ParameterError::Unknown(name.trim().to_string()))
    }

    /// Parse a user- or server-supplied value for this parameter
    pub fn parse_value(&self, text: &str) -> Result<ParameterValue, ParameterError> {
        let invalid = |reason: &str| ParameterError::InvalidValue {
            parameter: self.name().to_string(),
            value: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        match self.kind() {
            ValueKind::Real => {
                let value: f64 = trimmed.parse().map_err(|_| invalid("not a number"))?;
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid("must be a finite non-negative number"));
                }
                Ok(ParameterValue::Real(value))
            }
            ValueKind::Size => {
                let split = trimmed
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(trimmed.len());
                let (digits, unit) = trimmed.split_at(split);
                let amount: u64 = digits.parse().map_err(|_| invalid("missing size"))?;
                let multiplier = match unit.trim().to_lowercase().as_str() {
                    "" => self.bare_unit_kb(),
                    "kb" | "k" => 1,
                    "mb" | "m" => KB_PER_MB,
                    "gb" | "g" => KB_PER_GB,
                    "tb" | "t" => KB_PER_TB,
                    _ => return Err(invalid("unknown unit (expected kB, MB, GB or TB)")),
                };
                let kb = amount
                    .checked_mul(multiplier)
                    .ok_or_else(|| invalid("size overflows"))?;
                if kb == 0 {
                    return Err(invalid("size must be positive"));
                }
                Ok(ParameterValue::Size { kb })
            }
        }
    }
}

impl fmt::Display for TunableParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TunableParameter {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A normalized parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Size { kb: u64 },
    Real(f64),
}

impl ParameterValue {
    /// Numeric form used by the optimizer (kB for sizes)
    pub fn as_f64(&self) -> f64 {
        match self {
            ParameterValue::Size { kb } => *kb as f64,
            ParameterValue::Real(v) => *v,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ParameterValue::Size { .. } => ValueKind::Size,
            ParameterValue::Real(_) => ValueKind::Real,
        }
    }

    /// Canonical text, matching how the server renders values in `SHOW`
    ///
    /// Sizes use the largest unit that divides them exactly; reals use the
    /// shortest round-trip representation.
    pub fn canonical(&self) -> String {
        match self {
            ParameterValue::Size { kb } => format_size_kb(*kb),
            ParameterValue::Real(v) => format!("{}", v),
        }
    }

    /// Compare against a read-back value using the kind's comparison policy
    pub fn matches(&self, actual: &ParameterValue) -> bool {
        match (self, actual) {
            (ParameterValue::Real(expected), ParameterValue::Real(actual)) => {
                (expected - actual).abs() < REAL_EPSILON
            }
            (ParameterValue::Size { .. }, ParameterValue::Size { .. }) => {
                self.canonical() == actual.canonical()
            }
            _ => false,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Format a kB amount with the largest exact unit
pub fn format_size_kb(kb: u64) -> String {
    if kb != 0 && kb % KB_PER_TB == 0 {
        format!("{}TB", kb / KB_PER_TB)
    } else if kb != 0 && kb % KB_PER_GB == 0 {
        format!("{}GB", kb / KB_PER_GB)
    } else if kb != 0 && kb % KB_PER_MB == 0 {
        format!("{}MB", kb / KB_PER_MB)
    } else {
        format!("{}kB", kb)
    }
}

/// Ordered set of parameter values applied together for one round
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    values: Vec<(TunableParameter, ParameterValue)>,
}

impl ParameterSet {
    /// Build a set, rejecting duplicates and kind mismatches
    pub fn new(values: Vec<(TunableParameter, ParameterValue)>) -> Result<Self, ParameterError> {
        for (i, (param, value)) in values.iter().enumerate() {
            if values[..i].iter().any(|(p, _)| p == param) {
                return Err(ParameterError::Duplicate(param.name().to_string()));
            }
            if param.kind() != value.kind() {
                return Err(ParameterError::InvalidValue {
                    parameter: param.name().to_string(),
                    value: value.canonical(),
                    reason: format!("expected a {:?} value", param.kind()).to_lowercase(),
                });
            }
        }
        Ok(Self { values })
    }

    /// Parse `(name, value)` text pairs
    pub fn parse<'a, I>(pairs: I) -> Result<Self, ParameterError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let values = pairs
            .into_iter()
            .map(|(name, value)| {
                let param = TunableParameter::parse(name)?;
                Ok((param, param.parse_value(value)?))
            })
            .collect::<Result<Vec<_>, ParameterError>>()?;
        Self::new(values)
    }

    pub fn get(&self, parameter: TunableParameter) -> Option<&ParameterValue> {
        self.values
            .iter()
            .find(|(p, _)| *p == parameter)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TunableParameter, ParameterValue)> {
        self.values.iter()
    }

    pub fn parameters(&self) -> impl Iterator<Item = TunableParameter> + '_ {
        self.values.iter().map(|(p, _)| *p)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (param, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", param, value)?;
        }
        Ok(())
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (param, value) in &self.values {
            match value {
                ParameterValue::Size { .. } => map.serialize_entry(param.name(), &value.canonical())?,
                ParameterValue::Real(v) => map.serialize_entry(param.name(), v)?,
            }
        }
        map.end()
    }
}
