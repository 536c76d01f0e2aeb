//! Zones, locations, connections, and movement configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Privacy {
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// A directed edge between two locations in the same zone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionDef {
    pub direction: String,
    pub to: String,
    /// Distance class looked up in `movement.local.distance_modifiers`.
    #[serde(default)]
    pub distance: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationDef {
    pub id: String,
    pub zone: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default)]
    pub connections: Vec<ConnectionDef>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub unlock_when: Option<String>,
    /// Known to the player from the start.
    #[serde(default)]
    pub discovered: bool,
    /// Auto-discovery condition, evaluated on arrival attempts.
    #[serde(default)]
    pub discovery_conditions: Option<String>,
    /// Initial floor stock for take/drop.
    #[serde(default)]
    pub items: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub discovered: bool,
    #[serde(default)]
    pub discovery_conditions: Option<String>,
    /// Locations that serve as exits when `use_entry_exit` is on.
    #[serde(default)]
    pub exits: Vec<String>,
    /// Locations travellers arrive at when entering the zone.
    #[serde(default)]
    pub entrances: Vec<String>,
}

/// Local (intra-zone) movement costs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalMovement {
    /// Minutes per distance unit.
    #[serde(default = "default_base_time")]
    pub base_time: u32,
    /// Distance-class multipliers (e.g. "short": 1.0, "long": 3.0).
    #[serde(default)]
    pub distance_modifiers: BTreeMap<String, f64>,
    /// Cost for non-adjacent goto within a zone.
    #[serde(default = "default_goto_time")]
    pub goto_default_time: u32,
}

fn default_base_time() -> u32 {
    1
}

fn default_goto_time() -> u32 {
    5
}

impl Default for LocalMovement {
    fn default() -> Self {
        Self {
            base_time: default_base_time(),
            distance_modifiers: BTreeMap::new(),
            goto_default_time: default_goto_time(),
        }
    }
}

/// A way of travelling between zones.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TravelMethodDef {
    pub id: String,
    /// Minutes per unit distance. Checked first.
    #[serde(default)]
    pub time_cost: Option<u32>,
    /// Named time category; unit cost times distance. Checked second.
    #[serde(default)]
    pub category: Option<String>,
    /// Distance units per minute. Checked last.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Active methods (walking, cycling) are subject to modifier-based
    /// time multipliers; passive ones (rideshare) are not.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// An undirected travel link between two zones.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneConnectionDef {
    pub from: String,
    pub to: String,
    #[serde(default = "default_distance")]
    pub distance: f64,
    /// Permitted method ids; empty means any defined method.
    #[serde(default)]
    pub methods: Vec<String>,
}

fn default_distance() -> f64 {
    1.0
}

impl ZoneConnectionDef {
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TravelConfig {
    /// Require departing from a zone exit and arriving at a zone entrance.
    #[serde(default)]
    pub use_entry_exit: bool,
    #[serde(default)]
    pub methods: Vec<TravelMethodDef>,
    #[serde(default)]
    pub connections: Vec<ZoneConnectionDef>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MovementConfig {
    #[serde(default)]
    pub local: LocalMovement,
    #[serde(default)]
    pub travel: TravelConfig,
}
