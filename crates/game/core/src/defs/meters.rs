//! Meter and flag definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bounded numeric per-character variable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeterDef {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub default: f64,
    /// Largest absolute change a single turn may apply, when set.
    #[serde(default)]
    pub delta_cap_per_turn: Option<f64>,
    /// Applied (signed) on each day rollover.
    #[serde(default)]
    pub decay_per_day: f64,
    /// Applied (signed) on each slot rollover.
    #[serde(default)]
    pub decay_per_slot: f64,
    /// Named thresholds surfaced on character cards (e.g. "warm": 50).
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl MeterDef {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

fn default_true() -> bool {
    true
}

/// A global flag value: bool, number, or string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FlagValue {
    /// True when both values are of the same primitive kind.
    pub fn same_kind(&self, other: &FlagValue) -> bool {
        matches!(
            (self, other),
            (FlagValue::Bool(_), FlagValue::Bool(_))
                | (FlagValue::Number(_), FlagValue::Number(_))
                | (FlagValue::Text(_), FlagValue::Text(_))
        )
    }
}

impl From<bool> for FlagValue {
    fn from(v: bool) -> Self {
        FlagValue::Bool(v)
    }
}

impl From<f64> for FlagValue {
    fn from(v: f64) -> Self {
        FlagValue::Number(v)
    }
}

impl From<&str> for FlagValue {
    fn from(v: &str) -> Self {
        FlagValue::Text(v.to_string())
    }
}

/// Flag definition: default value, optional value whitelist, UI visibility.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlagDef {
    pub default: FlagValue,
    #[serde(default)]
    pub allowed_values: Option<Vec<FlagValue>>,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl FlagDef {
    /// Whether `value` is assignable to this flag (kind match + whitelist).
    pub fn accepts(&self, value: &FlagValue) -> bool {
        if !self.default.same_kind(value) {
            return false;
        }
        match &self.allowed_values {
            Some(allowed) => allowed.iter().any(|v| v == value),
            None => true,
        }
    }
}
