//! Globally unlockable actions.

use serde::{Deserialize, Serialize};

use super::Effect;

/// An action surfaced in the choice list once unlocked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionDef {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub goto: Option<String>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub time_category: Option<String>,
}
