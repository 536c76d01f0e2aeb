//! Mutable per-session game state.
//!
//! All collections are ordered (`BTreeMap`/`BTreeSet`) so snapshots and
//! summaries serialize byte-identically across runs, which the replay
//! determinism contract depends on. The whole tree is `Clone`: the turn
//! pipeline takes a pre-turn snapshot for rollback by cloning.

mod factory;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::defs::{ClothingState, FlagValue, Game, UnlockCategory, MINUTES_PER_DAY};
use crate::error::StateError;

/// Bound on narrative history kept verbatim.
pub const NARRATIVE_HISTORY_LIMIT: usize = 20;
/// Bound on the rolling character memory log.
pub const MEMORY_LOG_LIMIT: usize = 200;

/// Minute-accurate clock. Slot and weekday are derived via [`Game`] config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeState {
    pub day: u32,
    /// Minutes since midnight, `0..1440`.
    pub minutes: u32,
}

impl TimeState {
    pub fn hhmm(&self) -> String {
        format!("{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }

    /// Advance by `minutes`, wrapping days. Returns days rolled over.
    pub fn advance(&mut self, minutes: u32) -> u32 {
        let total = self.minutes + minutes;
        let days = total / MINUTES_PER_DAY;
        self.minutes = total % MINUTES_PER_DAY;
        self.day += days;
        days
    }
}

/// Current position of the session (the player's party).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationState {
    pub zone: String,
    pub id: String,
}

/// An item worn in a slot. Removal is expressed by key absence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WornItem {
    pub item: String,
    pub state: ClothingState,
}

/// An active modifier instance on a character.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifierState {
    pub remaining_min: i64,
    /// Applied by auto-activation (removed when its `when` turns false),
    /// as opposed to an explicit `apply_modifier` effect.
    pub auto: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CharacterState {
    pub meters: BTreeMap<String, f64>,
    pub modifiers: BTreeMap<String, ModifierState>,
    pub inventory: BTreeMap<String, u32>,
    pub clothing_inventory: BTreeMap<String, u32>,
    pub owned_outfits: BTreeSet<String>,
    /// slot → worn item; keys are within the game's slot set.
    pub worn: BTreeMap<String, WornItem>,
    pub active_outfit: Option<String>,
    /// Items granted by outfit acquisition, returned on outfit removal.
    pub granted_outfit_items: BTreeMap<String, BTreeSet<String>>,
    pub location_pin: Option<String>,
}

impl CharacterState {
    pub fn meter(&self, id: &str) -> f64 {
        self.meters.get(id).copied().unwrap_or(0.0)
    }

    pub fn item_count(&self, id: &str) -> u32 {
        self.inventory.get(id).copied().unwrap_or(0)
    }

    pub fn owns_clothing(&self, id: &str) -> bool {
        self.clothing_inventory.get(id).copied().unwrap_or(0) > 0
    }
}

/// One line of character memory, shown in the story-events feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterMemory {
    pub text: String,
    pub characters: Vec<String>,
    pub day: u32,
}

/// Locked-id sets per namespace.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LockedSets {
    pub items: BTreeSet<String>,
    pub clothing: BTreeSet<String>,
    pub outfits: BTreeSet<String>,
    pub zones: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub actions: BTreeSet<String>,
    pub endings: BTreeSet<String>,
}

impl LockedSets {
    pub fn set_for(&mut self, category: UnlockCategory) -> &mut BTreeSet<String> {
        match category {
            UnlockCategory::Items => &mut self.items,
            UnlockCategory::Clothing => &mut self.clothing,
            UnlockCategory::Outfits => &mut self.outfits,
            UnlockCategory::Zones => &mut self.zones,
            UnlockCategory::Locations => &mut self.locations,
            UnlockCategory::Actions => &mut self.actions,
            UnlockCategory::Endings => &mut self.endings,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    pub time: TimeState,
    pub location: LocationState,
    /// Includes the player under [`crate::defs::PLAYER_ID`].
    pub characters: BTreeMap<String, CharacterState>,
    pub flags: BTreeMap<String, FlagValue>,
    pub location_inventory: BTreeMap<String, BTreeMap<String, u32>>,
    pub discovered_locations: BTreeSet<String>,
    pub discovered_zones: BTreeSet<String>,
    pub unlocked_actions: BTreeSet<String>,
    pub unlocked_endings: BTreeSet<String>,
    pub locked: LockedSets,
    /// arc id → current stage index.
    pub arc_progress: BTreeMap<String, usize>,
    pub arc_history: BTreeMap<String, Vec<String>>,
    /// event id → minutes until eligible again.
    pub event_cooldowns: BTreeMap<String, i64>,
    pub events_once: BTreeSet<String>,
    pub current_node: String,
    /// Whether the current node's entry effects have run for this visit.
    pub node_entered: bool,
    /// Event-injected choices offered in the last choice list, kept so a
    /// later `choice` action can still resolve them.
    pub event_choices: Vec<crate::defs::ChoiceDef>,
    pub visited_nodes: BTreeSet<String>,
    pub turn: u64,
    pub narrative_history: VecDeque<String>,
    pub memory_log: VecDeque<CharacterMemory>,
    pub narrative_summary: String,
    pub ai_turns_since_summary: u32,
    /// Minutes of default-cost time spent in the current node visit.
    pub time_in_node: u32,
    pub base_seed: u64,
}

impl GameState {
    pub fn character(&self, id: &str) -> Option<&CharacterState> {
        self.characters.get(id)
    }

    pub fn character_mut(&mut self, id: &str) -> Option<&mut CharacterState> {
        self.characters.get_mut(id)
    }

    pub fn player(&self) -> &CharacterState {
        &self.characters[crate::defs::PLAYER_ID]
    }

    pub fn player_mut(&mut self) -> &mut CharacterState {
        self.characters
            .get_mut(crate::defs::PLAYER_ID)
            .expect("player state always present")
    }

    pub fn location_stock(&self, location: &str, item: &str) -> u32 {
        self.location_inventory
            .get(location)
            .and_then(|inv| inv.get(item))
            .copied()
            .unwrap_or(0)
    }

    pub fn push_narrative(&mut self, text: String) {
        if text.trim().is_empty() {
            return;
        }
        self.narrative_history.push_back(text);
        while self.narrative_history.len() > NARRATIVE_HISTORY_LIMIT {
            self.narrative_history.pop_front();
        }
    }

    pub fn push_memory(&mut self, memory: CharacterMemory) {
        self.memory_log.push_back(memory);
        while self.memory_log.len() > MEMORY_LOG_LIMIT {
            self.memory_log.pop_front();
        }
    }

    /// Check the turn-boundary invariants against the definitions.
    ///
    /// Meant for tests and the orchestrator's post-commit assertion; the
    /// first violated invariant is reported.
    pub fn check_invariants(&self, game: &Game) -> Result<(), StateError> {
        if self.time.minutes >= MINUTES_PER_DAY || self.time.day < 1 {
            return Err(StateError::invariant(format!(
                "time out of range: day {} minute {}",
                self.time.day, self.time.minutes
            )));
        }
        if game.node(&self.current_node).is_none() {
            return Err(StateError::invariant(format!(
                "current node '{}' is not defined",
                self.current_node
            )));
        }
        for (char_id, cs) in &self.characters {
            for (meter_id, value) in &cs.meters {
                if let Some(def) = game.meter(char_id, meter_id)
                    && (*value < def.min || *value > def.max)
                {
                    return Err(StateError::invariant(format!(
                        "meter {char_id}.{meter_id} = {value} outside [{}, {}]",
                        def.min, def.max
                    )));
                }
            }
            for (slot, worn) in &cs.worn {
                if !game.wardrobe.has_slot(slot) {
                    return Err(StateError::invariant(format!(
                        "{char_id} wears '{}' in unknown slot '{slot}'",
                        worn.item
                    )));
                }
                if !cs.owns_clothing(&worn.item) {
                    return Err(StateError::invariant(format!(
                        "{char_id} wears unowned clothing '{}'",
                        worn.item
                    )));
                }
            }
            for (outfit, granted) in &cs.granted_outfit_items {
                for item in granted {
                    if !cs.owns_clothing(item) {
                        return Err(StateError::invariant(format!(
                            "{char_id}: granted item '{item}' of outfit '{outfit}' not owned"
                        )));
                    }
                }
            }
            for (modifier, ms) in &cs.modifiers {
                if ms.remaining_min < 0 {
                    return Err(StateError::invariant(format!(
                        "{char_id}: modifier '{modifier}' has negative duration"
                    )));
                }
            }
        }
        Ok(())
    }
}

pub use factory::new_session_state;
