//! Wardrobe definitions: slot order, clothing items, outfits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Slot order, outermost first. Concealment resolution walks this order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WardrobeConfig {
    #[serde(default)]
    pub slot_order: Vec<String>,
}

impl WardrobeConfig {
    pub fn slot_priority(&self, slot: &str) -> Option<usize> {
        self.slot_order.iter().position(|s| s == slot)
    }

    pub fn has_slot(&self, slot: &str) -> bool {
        self.slot_order.iter().any(|s| s == slot)
    }
}

/// Worn-item state. "removed" is expressed in state by slot absence; the
/// variant exists for effect payloads and the Checker wire format.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClothingState {
    Intact,
    Opened,
    Displaced,
    Removed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClothingItemDef {
    pub id: String,
    pub name: String,
    /// Slots the item fills when worn.
    pub occupies: Vec<String>,
    /// Slots hidden beneath this item while it is intact.
    #[serde(default)]
    pub conceals: Vec<String>,
    #[serde(default)]
    pub can_open: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub unlock_when: Option<String>,
    /// Per-state appearance lines, keyed by state name.
    #[serde(default)]
    pub descriptions: BTreeMap<String, String>,
    #[serde(default)]
    pub value: f64,
}

impl ClothingItemDef {
    pub fn description_for(&self, state: ClothingState) -> Option<&str> {
        self.descriptions.get(&state.to_string()).map(String::as_str)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutfitDef {
    pub id: String,
    pub name: String,
    /// Member clothing items, composed in declaration order.
    pub items: Vec<String>,
    /// Grant missing member items when the outfit is acquired.
    #[serde(default = "default_true")]
    pub grant_items: bool,
}

fn default_true() -> bool {
    true
}
