//! Runtime parameter application
//!
//! Applies tunable parameters with `SET` and verifies them with `SHOW` before
//! any probe runs. A value the server silently clamps or rounds is reported as
//! a mismatch, never as an error: the round continues with whatever value is
//! actually active, because the server (privileges, limits, unit rounding)
//! has the final say.

use tracing::{debug, warn};

use super::parameter::{ParameterSet, ParameterValue, TunableParameter};
use crate::client::{ServiceConnection, ServiceConnectionExt};
use crate::utils::Result;

/// Outcome of applying one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedValue {
    pub parameter: TunableParameter,
    pub requested: ParameterValue,
    /// Value the server reports after the change
    pub actual: ParameterValue,
    /// Raw `SHOW` text
    pub actual_text: String,
}

impl VerifiedValue {
    pub fn is_match(&self) -> bool {
        self.requested.matches(&self.actual)
    }
}

/// Outcome of applying a whole parameter set
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedSet {
    pub verified: Vec<VerifiedValue>,
}

impl AppliedSet {
    /// The configuration that is really in effect
    pub fn active(&self) -> ParameterSet {
        // Parameters and kinds come from an already valid set
        ParameterSet::new(
            self.verified
                .iter()
                .map(|v| (v.parameter, v.actual))
                .collect(),
        )
        .unwrap_or_default()
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &VerifiedValue> {
        self.verified.iter().filter(|v| !v.is_match())
    }

    pub fn is_exact(&self) -> bool {
        self.mismatches().next().is_none()
    }
}

/// Applies and verifies runtime parameters on one session
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterController;

impl ParameterController {
    pub fn new() -> Self {
        Self
    }

    /// Read the current value of a parameter without changing it
    pub fn show(
        &self,
        conn: &mut dyn ServiceConnection,
        parameter: TunableParameter,
    ) -> Result<ParameterValue> {
        let text = conn.show(parameter.name())?;
        Ok(parameter.parse_value(&text)?)
    }

    /// SET, commit, then SHOW a single parameter
    ///
    /// Errors only when the commands themselves fail or the read-back cannot
    /// be parsed; a differing value is reported through [`VerifiedValue`].
    pub fn apply(
        &self,
        conn: &mut dyn ServiceConnection,
        parameter: TunableParameter,
        value: &ParameterValue,
    ) -> Result<VerifiedValue> {
        let requested_text = value.canonical();
        conn.set_committed(parameter.name(), &requested_text)?;

        let actual_text = conn.show(parameter.name())?;
        let actual = parameter.parse_value(&actual_text)?;

        let verified = VerifiedValue {
            parameter,
            requested: *value,
            actual,
            actual_text,
        };

        if verified.is_match() {
            debug!("Parameter {} set to {}", parameter, verified.actual_text);
        } else {
            match (value, &actual) {
                (ParameterValue::Real(want), ParameterValue::Real(got)) => warn!(
                    parameter = %parameter,
                    requested = %requested_text,
                    actual = %verified.actual_text,
                    difference = (got - want).abs(),
                    "Parameter not applied exactly; continuing with the active value"
                ),
                _ => warn!(
                    parameter = %parameter,
                    requested = %requested_text,
                    actual = %verified.actual_text,
                    "Parameter not applied exactly (rounding, privileges or server limits); continuing with the active value"
                ),
            }
        }

        Ok(verified)
    }

    /// Apply every parameter of a set in order
    ///
    /// Stops at the first parameter whose commands fail.
    pub fn apply_set(
        &self,
        conn: &mut dyn ServiceConnection,
        set: &ParameterSet,
    ) -> Result<AppliedSet> {
        let mut verified = Vec::with_capacity(set.len());
        for (parameter, value) in set.iter() {
            verified.push(self.apply(conn, *parameter, value)?);
        }
        Ok(AppliedSet { verified })
    }
}
