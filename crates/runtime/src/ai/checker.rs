//! Checker JSON parsing and gated application.
//!
//! Deltas are additive to whatever phase 7 already applied. Everything is
//! clamped and validated: ownership, concealment, locks, per-turn caps,
//! and the gate truth table all hold against whatever the model says.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use plotplay_core::defs::{
    ClothingState, Effect, EffectKind, FlagValue, Game, MeterOp, PLAYER_ID,
};
use plotplay_core::effects::apply_batch;
use plotplay_core::services::{clothing, modifiers, movement};
use plotplay_core::state::{CharacterMemory, GameState};
use plotplay_core::turn::TurnContext;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SafetyBlock {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default)]
    pub violations: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ModifierOp {
    Apply {
        apply: String,
        #[serde(default)]
        duration_min: Option<u32>,
    },
    Remove {
        remove: String,
    },
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LocationDelta {
    #[serde(default)]
    pub zone: Option<String>,
    pub id: String,
}

/// The strict Checker schema. Unknown keys are discarded by serde.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CheckerOutput {
    #[serde(default)]
    pub safety: SafetyBlock,
    #[serde(default)]
    pub meters: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
    #[serde(default)]
    pub inventory: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub clothing: BTreeMap<String, BTreeMap<String, ClothingState>>,
    #[serde(default)]
    pub modifiers: BTreeMap<String, Vec<ModifierOp>>,
    #[serde(default)]
    pub location: Option<LocationDelta>,
    #[serde(default)]
    pub events_fired: Vec<String>,
    #[serde(default)]
    pub node_transition: Option<String>,
    #[serde(default)]
    pub character_memories: BTreeMap<String, String>,
    #[serde(default)]
    pub narrative_summary: Option<String>,
}

/// Parse a Checker reply, tolerating code fences and stray prose around
/// the JSON object.
pub fn parse_checker_output(raw: &str) -> Option<CheckerOutput> {
    let trimmed = raw.trim();
    if let Ok(parsed) = serde_json::from_str::<CheckerOutput>(trimmed) {
        return Some(parsed);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<CheckerOutput>(&trimmed[start..=end]).ok()
}

/// A signed delta string: `+N`, `-N`, or `=N`.
fn parse_delta(s: &str) -> Option<(MeterOp, f64)> {
    let s = s.trim();
    let (op, rest) = match s.as_bytes().first()? {
        b'+' => (MeterOp::Add, &s[1..]),
        b'-' => (MeterOp::Subtract, &s[1..]),
        b'=' => (MeterOp::Set, &s[1..]),
        _ => (MeterOp::Add, s),
    };
    rest.trim().parse::<f64>().ok().map(|n| (op, n))
}

/// The gate (and its refusal line) guarding a meter on a character, if
/// one of the character's defined-closed gates claims it.
fn closed_gate_for_meter<'g>(
    game: &'g Game,
    ctx: &TurnContext,
    owner: &str,
    meter: &str,
) -> Option<(&'g str, Option<&'g str>)> {
    let def = game.character(owner)?;
    def.gates
        .iter()
        .find(|g| {
            g.guards_meters.iter().any(|m| m == meter) && ctx.gate_defined_closed(owner, &g.id)
        })
        .map(|g| (g.id.as_str(), g.refusal.as_deref()))
}

/// Any character's defined-closed gate guarding a global flag.
fn closed_gate_for_flag<'g>(
    game: &'g Game,
    ctx: &TurnContext,
    flag: &str,
) -> Option<(&'g str, Option<&'g str>)> {
    for character in &game.characters {
        for gate in &character.gates {
            if gate.guards_flags.iter().any(|f| f == flag)
                && ctx.gate_defined_closed(&character.id, &gate.id)
            {
                return Some((gate.id.as_str(), gate.refusal.as_deref()));
            }
        }
    }
    None
}

/// Phase 13: apply a parsed Checker output.
pub fn apply_checker_output(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    output: &CheckerOutput,
    summary_requested: bool,
) {
    // Safety first: a flagged turn keeps its memories and narration but
    // drops every state delta.
    if !output.safety.ok {
        warn!(target: "checker", violations = ?output.safety.violations, "safety violation");
        for violation in &output.safety.violations {
            ctx.refuse(violation.clone());
        }
        record_memories(state, output);
        return;
    }

    let mut refused_gates: Vec<String> = Vec::new();
    let mut effects: Vec<Effect> = Vec::new();

    for (owner, meters) in &output.meters {
        if state.character(owner).is_none() {
            warn!(target: "checker", owner = owner.as_str(), "meter delta for unknown character");
            continue;
        }
        for (meter, delta) in meters {
            let Some((op, value)) = parse_delta(delta) else {
                warn!(target: "checker", delta = delta.as_str(), "unparseable meter delta");
                continue;
            };
            if let Some((gate, refusal)) = closed_gate_for_meter(game, ctx, owner, meter) {
                debug!(target: "checker", gate, meter = meter.as_str(), "delta dropped by gate");
                note_refusal(ctx, &mut refused_gates, gate, refusal);
                continue;
            }
            effects.push(Effect::of(EffectKind::MeterChange {
                target: owner.clone(),
                meter: meter.clone(),
                op,
                value,
                respect_caps: true,
                cap_per_turn: true,
            }));
        }
    }

    for (key, value) in &output.flags {
        if let Some((gate, refusal)) = closed_gate_for_flag(game, ctx, key) {
            debug!(target: "checker", gate, flag = key.as_str(), "flag dropped by gate");
            note_refusal(ctx, &mut refused_gates, gate, refusal);
            continue;
        }
        effects.push(Effect::of(EffectKind::FlagSet {
            key: key.clone(),
            value: value.clone(),
        }));
    }

    for (owner, items) in &output.inventory {
        for (item, delta) in items {
            let Some((op, value)) = parse_delta(delta) else {
                continue;
            };
            let count = value.abs().round() as u32;
            let kind = match op {
                MeterOp::Subtract => EffectKind::InventoryRemove {
                    owner: owner.clone(),
                    item: item.clone(),
                    count,
                },
                _ => EffectKind::InventoryAdd {
                    owner: owner.clone(),
                    item: item.clone(),
                    count,
                },
            };
            effects.push(Effect::of(kind));
        }
    }

    apply_batch(game, state, ctx, &effects);

    // Clothing deltas go through the service so ownership, concealment,
    // and locks hold; a violating delta is discarded.
    for (character, slots) in &output.clothing {
        for (slot, target_state) in slots {
            if let Err(refusal) =
                clothing::set_slot_state(game, state, ctx, character, slot, *target_state)
            {
                debug!(
                    target: "checker",
                    character = character.as_str(),
                    slot = slot.as_str(),
                    refusal = refusal.as_str(),
                    "clothing delta discarded"
                );
            }
        }
    }

    for (character, ops) in &output.modifiers {
        for op in ops {
            match op {
                ModifierOp::Apply {
                    apply,
                    duration_min,
                } => modifiers::apply(game, state, ctx, character, apply, *duration_min, false),
                ModifierOp::Remove { remove } => {
                    modifiers::remove(game, state, ctx, character, remove)
                }
            }
        }
    }

    // Writer-narrated relocation is free: the prose already paid for it.
    if let Some(delta) = &output.location
        && delta.id != state.location.id
    {
        if let Err(refusal) = movement::relocate_free(game, state, ctx, &delta.id) {
            debug!(target: "checker", location = delta.id.as_str(), refusal = refusal.as_str(),
                   "location delta discarded");
        }
    }

    for event_id in &output.events_fired {
        let Some(event) = game.event(event_id) else {
            continue;
        };
        if !ctx.events_fired.contains(event_id) {
            ctx.events_fired.push(event_id.clone());
            if event.cooldown_min > 0 {
                state
                    .event_cooldowns
                    .insert(event_id.clone(), i64::from(event.cooldown_min));
            }
            if event.once_per_game {
                state.events_once.insert(event_id.clone());
            }
        }
    }

    if let Some(node_id) = &output.node_transition {
        let reachable = game
            .node(&state.current_node)
            .map(|n| n.reachable_nodes().any(|id| id == node_id))
            .unwrap_or(false);
        if reachable && game.node(node_id).is_some() {
            ctx.pending_goto = Some(node_id.clone());
        } else {
            warn!(target: "checker", node = node_id.as_str(), "unreachable node transition dropped");
        }
    }

    record_memories(state, output);

    if summary_requested && let Some(summary) = &output.narrative_summary {
        state.narrative_summary = summary.clone();
        state.ai_turns_since_summary = 0;
    }
}

fn note_refusal(
    ctx: &mut TurnContext,
    refused: &mut Vec<String>,
    gate: &str,
    refusal: Option<&str>,
) {
    if refused.iter().any(|g| g == gate) {
        return;
    }
    refused.push(gate.to_string());
    if let Some(line) = refusal {
        ctx.refuse(line.to_string());
    }
}

fn record_memories(state: &mut GameState, output: &CheckerOutput) {
    let day = state.time.day;
    for (character, line) in &output.character_memories {
        let mut characters = vec![character.clone()];
        if character != PLAYER_ID {
            characters.push(PLAYER_ID.to_string());
        }
        state.push_memory(CharacterMemory {
            text: line.clone(),
            characters,
            day,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = r#"{"meters": {"emma": {"trust": "+10"}}}"#;
        let parsed = parse_checker_output(plain).unwrap();
        assert_eq!(parsed.meters["emma"]["trust"], "+10");

        let fenced = "```json\n{\"flags\": {\"first_kiss\": true}}\n```";
        let parsed = parse_checker_output(fenced).unwrap();
        assert_eq!(parsed.flags["first_kiss"], FlagValue::Bool(true));

        assert!(parse_checker_output("no json here").is_none());
    }

    #[test]
    fn delta_strings() {
        assert_eq!(parse_delta("+10"), Some((MeterOp::Add, 10.0)));
        assert_eq!(parse_delta("-3"), Some((MeterOp::Subtract, 3.0)));
        assert_eq!(parse_delta("=42"), Some((MeterOp::Set, 42.0)));
        assert_eq!(parse_delta("7"), Some((MeterOp::Add, 7.0)));
        assert_eq!(parse_delta("abc"), None);
    }

    #[test]
    fn unknown_keys_are_discarded() {
        let raw = r#"{"meters": {}, "hallucinated_key": {"x": 1}}"#;
        assert!(parse_checker_output(raw).is_some());
    }
}
