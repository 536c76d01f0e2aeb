//! Story nodes: scenes, hubs, encounters, endings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use super::Effect;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
    Scene,
    Hub,
    Encounter,
    Ending,
}

/// An authored choice offered to the player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChoiceDef {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub conditions: Option<String>,
    /// Shown instead of hiding the choice when conditions fail.
    #[serde(default)]
    pub disabled_reason: Option<String>,
    /// Applied in phase 7 when the choice is selected.
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub goto: Option<String>,
    /// Explicit minutes; bypasses the per-visit conversation cap.
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub time_category: Option<String>,
}

/// Authored node-to-node transition, evaluated top to bottom.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionDef {
    pub when: String,
    pub to: String,
}

/// Per-node time costs, overriding the game defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeBehavior {
    /// Action-kind → category name.
    #[serde(default)]
    pub kinds: BTreeMap<String, String>,
    #[serde(default)]
    pub cap_per_visit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    #[serde(default)]
    pub preconditions: Option<String>,
    /// Entry effects fire only on the first-ever entry.
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub entry_effects: Vec<Effect>,
    #[serde(default)]
    pub exit_effects: Vec<Effect>,
    /// Author guidance for the Writer; never shown to the player.
    #[serde(default)]
    pub beats: Vec<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceDef>,
    #[serde(default)]
    pub dynamic_choices: Vec<ChoiceDef>,
    #[serde(default)]
    pub transitions: Vec<TransitionDef>,
    #[serde(default)]
    pub time_behavior: Option<TimeBehavior>,
}

impl NodeDef {
    pub fn is_ending(&self) -> bool {
        matches!(self.node_type, NodeType::Ending)
    }

    /// All node ids this node can transition to by its own rules.
    pub fn reachable_nodes(&self) -> impl Iterator<Item = &str> {
        self.transitions
            .iter()
            .map(|t| t.to.as_str())
            .chain(self.choices.iter().filter_map(|c| c.goto.as_deref()))
            .chain(self.dynamic_choices.iter().filter_map(|c| c.goto.as_deref()))
    }
}
