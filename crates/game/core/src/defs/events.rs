//! World events: scheduled, conditional, and random.

use serde::{Deserialize, Serialize};

use super::{ChoiceDef, Effect};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTrigger {
    /// Fires whenever `when` holds.
    Conditional { when: String },
    /// Bernoulli sample with probability `weight/100` each eligible turn;
    /// at most one random event fires per turn.
    Random {
        weight: f64,
        #[serde(default)]
        when: Option<String>,
    },
    /// Fires when the clock matches.
    Scheduled {
        #[serde(default)]
        slot: Option<String>,
        #[serde(default)]
        weekday: Option<String>,
        #[serde(default)]
        when: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventDef {
    pub id: String,
    pub trigger: EventTrigger,
    /// Restrict to a location; absent means anywhere.
    #[serde(default)]
    pub location: Option<String>,
    /// Minimum minutes between firings.
    #[serde(default)]
    pub cooldown_min: u32,
    #[serde(default)]
    pub once_per_game: bool,
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Writer guidance appended to the turn's narrative parts.
    #[serde(default)]
    pub beats: Vec<String>,
    /// Choices injected into the next choice list.
    #[serde(default)]
    pub choices: Vec<ChoiceDef>,
    /// Node transition forced by this event; short-circuits the turn to
    /// finalization.
    #[serde(default)]
    pub forced_transition: Option<String>,
}
