//! Temporary character overlays with durations, gate clamps, and hooks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Effect;

/// How co-active modifiers of one group combine when queried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingPolicy {
    /// Highest-priority modifier wins for behaviour/appearance queries.
    #[default]
    Highest,
    /// All active modifiers contribute.
    All,
}

/// Gate overrides enforced while the modifier is active.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModifierSafety {
    /// Forced-false gates; Checker deltas relying on them are rejected.
    #[serde(default)]
    pub disallow_gates: Vec<String>,
    /// Forced-true gates.
    #[serde(default)]
    pub allow_gates: Vec<String>,
}

/// Extra clamp range applied to a meter while the modifier is active.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct MeterClamp {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifierDef {
    pub id: String,
    #[serde(default)]
    pub group: Option<String>,
    /// Auto-activation condition; absent means explicit-only.
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub duration_default_min: Option<u32>,
    #[serde(default)]
    pub appearance: Option<String>,
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub safety: ModifierSafety,
    #[serde(default)]
    pub clamp_meters: BTreeMap<String, MeterClamp>,
    #[serde(default)]
    pub entry_effects: Vec<Effect>,
    #[serde(default)]
    pub exit_effects: Vec<Effect>,
    /// Multiplier on active-method travel time while this modifier is on
    /// (passive methods like rideshares ignore it).
    #[serde(default = "default_multiplier")]
    pub travel_time_multiplier: f64,
    #[serde(default)]
    pub stacking: StackingPolicy,
    /// Modifier ids that may not be co-active with this one.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Tie-break for the `highest` stacking policy.
    #[serde(default)]
    pub priority: i32,
}

fn default_multiplier() -> f64 {
    1.0
}
