//! General inventory item definitions.

use serde::{Deserialize, Serialize};

use super::Effect;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub stackable: bool,
    #[serde(default)]
    pub consumable: bool,
    #[serde(default = "default_true")]
    pub droppable: bool,
    #[serde(default = "default_true")]
    pub can_give: bool,
    #[serde(default)]
    pub value: f64,
    /// Fired once per 0→n ownership transition.
    #[serde(default)]
    pub on_get: Vec<Effect>,
    /// Fired when the owner's count reaches 0.
    #[serde(default)]
    pub on_lost: Vec<Effect>,
    /// Fired after a successful give, on top of on_lost/on_get.
    #[serde(default)]
    pub on_give: Vec<Effect>,
    /// Fired by the `use` action.
    #[serde(default)]
    pub on_use: Vec<Effect>,
}

fn default_true() -> bool {
    true
}
