//! Character definitions: identity, gates, schedules, starting kit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::MeterDef;

/// A per-character permission derived from state each turn.
///
/// A gate is true iff `when` is true, or at least one of `when_any` is
/// true, or all of `when_all` are true. `guards_meters`/`guards_flags`
/// name the state keys whose Checker deltas this gate protects.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateDef {
    pub id: String,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub when_any: Vec<String>,
    #[serde(default)]
    pub when_all: Vec<String>,
    /// Writer guidance when the gate is open.
    #[serde(default)]
    pub acceptance: Option<String>,
    /// Narrative line inserted when a gated delta is refused.
    #[serde(default)]
    pub refusal: Option<String>,
    #[serde(default)]
    pub guards_meters: Vec<String>,
    #[serde(default)]
    pub guards_flags: Vec<String>,
}

/// One schedule entry; first matching rule (declaration order) wins.
///
/// All present constraints must match: `slot`, `weekday`, and the DSL
/// `when` condition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleRule {
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub weekday: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
    pub location: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub pronouns: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub appearance: Option<String>,
    #[serde(default)]
    pub dialogue_style: Option<String>,
    /// Character-specific meters, overriding or extending the game table.
    #[serde(default)]
    pub meters: BTreeMap<String, MeterDef>,
    #[serde(default)]
    pub gates: Vec<GateDef>,
    #[serde(default)]
    pub schedule: Vec<ScheduleRule>,
    /// Starting general inventory.
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
    /// Starting owned clothing items.
    #[serde(default)]
    pub clothing: Vec<String>,
    /// Starting owned outfits.
    #[serde(default)]
    pub outfits: Vec<String>,
    /// Outfit worn at session start.
    #[serde(default)]
    pub active_outfit: Option<String>,
    /// Fixed location pin; characters without one follow their schedule.
    #[serde(default)]
    pub location: Option<String>,
}
