//! Story arcs: ordered stages with advancement conditions.

use serde::{Deserialize, Serialize};

use super::Effect;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageDef {
    pub id: String,
    /// Condition to advance INTO this stage; ignored for the first stage.
    #[serde(default)]
    pub advance_when: Option<String>,
    #[serde(default)]
    pub on_enter: Vec<Effect>,
    /// Applied on the stage being left when advancing out of it.
    #[serde(default)]
    pub on_advance: Vec<Effect>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArcDef {
    pub id: String,
    pub name: String,
    pub stages: Vec<StageDef>,
}

impl ArcDef {
    pub fn stage(&self, idx: usize) -> Option<&StageDef> {
        self.stages.get(idx)
    }
}
