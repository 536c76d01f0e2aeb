//! Per-turn transient context.
//!
//! One [`TurnContext`] is created at phase 1 and dropped at phase 22. It
//! owns the turn RNG, the gate truth table, the presence list, and all the
//! scratch the phases accumulate (narrative parts, fired events, pending
//! transitions). Services receive it alongside the game and state; nothing
//! in here survives the turn except what the orchestrator copies out.

use std::cell::RefCell;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::defs::{ChoiceDef, Game};
use crate::expr::{eval_condition, eval_value, ActiveGates, EvalContext, Value};
use crate::rng::TurnRng;
use crate::state::GameState;

/// Cap on recursive effect expansion (conditional/random/hooks).
pub const MAX_EFFECT_DEPTH: u8 = 8;

/// Where a choice came from; also its ordering class in the choice list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSource {
    Node,
    Dynamic,
    Action,
    Movement,
    Event,
}

/// One entry of the per-turn choice list handed to the player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChoiceItem {
    pub id: String,
    pub prompt: String,
    pub enabled: bool,
    #[serde(default)]
    pub disabled_reason: Option<String>,
    pub source: ChoiceSource,
}

#[derive(Debug)]
pub struct TurnContext {
    pub turn: u64,
    pub rng: TurnRng,
    pub active_gates: ActiveGates,
    /// Characters at the current location, player included.
    pub present: Vec<String>,
    /// Resolved action time category name, if any (diagnostic).
    pub resolved_time_category: Option<String>,
    /// Minutes the action will cost at phase 18.
    pub time_advance_minutes: u32,
    /// Total minutes actually advanced during this turn (effects included);
    /// modifier durations tick by this amount.
    pub minutes_elapsed: u32,
    pub events_fired: Vec<String>,
    pub event_choices: Vec<ChoiceDef>,
    pub milestones_reached: Vec<String>,
    pub narrative_parts: Vec<String>,
    pub choices: Vec<ChoiceItem>,
    pub action_summary: String,
    /// Node transition queued by a goto effect, resolved in phase 15.
    pub pending_goto: Option<String>,
    /// Set by an event's forced transition: skip AI and finalize.
    pub forced_finalize: bool,
    pub skip_node_effects: bool,
    /// Item hooks already fired this turn (`owner:item:hook`).
    pub fired_hooks: BTreeSet<String>,
    /// Net meter movement this turn (`owner:meter`), for per-turn caps.
    pub meter_deltas: std::collections::BTreeMap<String, f64>,
    /// Warn-once keys for the expression evaluator.
    pub warned: RefCell<BTreeSet<String>>,
    /// Recursion depth of the effect resolver.
    pub effect_depth: u8,
}

impl TurnContext {
    pub fn new(turn: u64, base_seed: u64) -> Self {
        Self {
            turn,
            rng: TurnRng::for_turn(base_seed, turn),
            active_gates: ActiveGates::new(),
            present: Vec::new(),
            resolved_time_category: None,
            time_advance_minutes: 0,
            minutes_elapsed: 0,
            events_fired: Vec::new(),
            event_choices: Vec::new(),
            milestones_reached: Vec::new(),
            narrative_parts: Vec::new(),
            choices: Vec::new(),
            action_summary: String::new(),
            pending_goto: None,
            forced_finalize: false,
            skip_node_effects: false,
            fired_hooks: BTreeSet::new(),
            meter_deltas: std::collections::BTreeMap::new(),
            warned: RefCell::new(BTreeSet::new()),
            effect_depth: 0,
        }
    }

    /// Build an evaluation context over the current state.
    ///
    /// Borrows `self` and `state` immutably; construct fresh before each
    /// guard evaluation and let it drop before mutating.
    pub fn eval<'a>(&'a self, game: &'a Game, state: &'a GameState) -> EvalContext<'a> {
        EvalContext {
            game,
            state,
            gates: &self.active_gates,
            present: &self.present,
            rng: &self.rng,
            warned: &self.warned,
        }
    }

    pub fn check(&self, game: &Game, state: &GameState, expr: &str) -> bool {
        eval_condition(expr, &self.eval(game, state))
    }

    pub fn value_of(&self, game: &Game, state: &GameState, expr: &str) -> Value {
        eval_value(expr, &self.eval(game, state))
    }

    /// True when `gate` is open for `character`; unknown gates are open.
    pub fn gate_open(&self, character: &str, gate: &str) -> bool {
        self.active_gates
            .get(character)
            .and_then(|g| g.get(gate))
            .copied()
            .unwrap_or(true)
    }

    /// True when the character defines `gate` and it evaluated false.
    pub fn gate_defined_closed(&self, character: &str, gate: &str) -> bool {
        self.active_gates
            .get(character)
            .and_then(|g| g.get(gate))
            .map(|open| !*open)
            .unwrap_or(false)
    }

    pub fn refuse(&mut self, text: impl Into<String>) {
        self.narrative_parts.push(text.into());
    }

    /// Fire-once bookkeeping for item hooks.
    pub fn hook_not_yet_fired(&mut self, owner: &str, item: &str, hook: &str) -> bool {
        self.fired_hooks.insert(format!("{owner}:{item}:{hook}"))
    }
}
