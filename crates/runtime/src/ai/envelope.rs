//! The turn envelope: everything the Writer and Checker see.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plotplay_core::defs::{Game, NarrationConfig, PLAYER_ID};
use plotplay_core::services::{clothing, modifiers, summary};
use plotplay_core::state::GameState;
use plotplay_core::turn::{ChoiceItem, TurnContext};

use crate::config::AiSettings;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateCard {
    pub id: String,
    pub open: bool,
    #[serde(default)]
    pub acceptance: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub dialogue_style: Option<String>,
    pub meters: BTreeMap<String, f64>,
    pub thresholds: BTreeMap<String, BTreeMap<String, f64>>,
    pub gates: Vec<GateCard>,
    pub modifiers: Vec<String>,
    /// Appearance lines from the dominant modifier of each group.
    pub overlays: Vec<String>,
    pub outfit: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeCard {
    pub id: String,
    pub node_type: String,
    pub title: String,
    pub beats: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerCard {
    pub meters: BTreeMap<String, f64>,
    pub inventory: BTreeMap<String, u32>,
    pub modifiers: Vec<String>,
    pub clothing: String,
}

/// Everything a single AI turn is prompted with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnEnvelope {
    pub game_title: String,
    pub narration: NarrationSnapshot,
    pub time: summary::TimeSummary,
    pub location: summary::LocationSummary,
    pub node: NodeCard,
    pub player: PlayerCard,
    pub characters: Vec<CharacterCard>,
    pub narrative_summary: String,
    pub history: Vec<String>,
    pub choices: Vec<ChoiceItem>,
    pub action: String,
    /// Ask the Checker for a fresh rolling summary this turn.
    pub request_summary: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NarrationSnapshot {
    pub pov: String,
    pub tense: String,
    pub paragraphs: u32,
}

impl From<&NarrationConfig> for NarrationSnapshot {
    fn from(cfg: &NarrationConfig) -> Self {
        Self {
            pov: cfg.pov.clone(),
            tense: cfg.tense.clone(),
            paragraphs: cfg.paragraphs,
        }
    }
}

/// Phase 9: assemble the envelope from current state.
pub fn build_envelope(
    game: &Game,
    state: &GameState,
    ctx: &TurnContext,
    settings: &AiSettings,
    request_summary: bool,
) -> TurnEnvelope {
    let node = game.node(&state.current_node);
    let player = state.player();

    let characters = ctx
        .present
        .iter()
        .filter(|id| id.as_str() != PLAYER_ID)
        .filter_map(|id| {
            let def = game.character(id)?;
            let cs = state.character(id)?;
            let gates = def
                .gates
                .iter()
                .map(|g| GateCard {
                    id: g.id.clone(),
                    open: ctx.gate_open(id, &g.id),
                    acceptance: g.acceptance.clone(),
                    refusal: g.refusal.clone(),
                })
                .collect();
            let thresholds = cs
                .meters
                .keys()
                .filter_map(|m| {
                    let def = game.meter(id, m)?;
                    (!def.thresholds.is_empty()).then(|| (m.clone(), def.thresholds.clone()))
                })
                .collect();
            let overlays = modifiers::dominant_in_groups(game, state, id)
                .into_iter()
                .filter_map(|m| game.modifier(m))
                .filter_map(|d| d.appearance.clone())
                .collect();
            Some(CharacterCard {
                id: id.clone(),
                name: def.name.clone(),
                age: def.age,
                personality: def.personality.clone(),
                dialogue_style: def.dialogue_style.clone(),
                meters: cs.meters.clone(),
                thresholds,
                gates,
                modifiers: cs.modifiers.keys().cloned().collect(),
                overlays,
                outfit: clothing::appearance(game, state, id),
            })
        })
        .collect();

    let history = state
        .narrative_history
        .iter()
        .rev()
        .take(settings.history_window)
        .rev()
        .cloned()
        .collect();

    TurnEnvelope {
        game_title: game.meta.title.clone(),
        narration: NarrationSnapshot::from(&game.narration),
        time: summary::TimeSummary {
            day: state.time.day,
            time_hhmm: state.time.hhmm(),
            slot: game.time.slot_at(state.time.minutes).map(|w| w.id.clone()),
            weekday: game.time.weekday_for(state.time.day).to_string(),
        },
        location: summary::LocationSummary {
            zone: state.location.zone.clone(),
            id: state.location.id.clone(),
            name: game
                .location(&state.location.id)
                .map(|l| l.name.clone())
                .unwrap_or_default(),
            privacy: game
                .location(&state.location.id)
                .map(|l| l.privacy.to_string())
                .unwrap_or_default(),
        },
        characters,
        node: NodeCard {
            id: state.current_node.clone(),
            node_type: node.map(|n| n.node_type.to_string()).unwrap_or_default(),
            title: node.map(|n| n.title.clone()).unwrap_or_default(),
            beats: node.map(|n| n.beats.clone()).unwrap_or_default(),
        },
        player: PlayerCard {
            meters: player.meters.clone(),
            inventory: player.inventory.clone(),
            modifiers: player.modifiers.keys().cloned().collect(),
            clothing: clothing::appearance(game, state, PLAYER_ID),
        },
        narrative_summary: state.narrative_summary.clone(),
        history,
        choices: ctx.choices.clone(),
        action: ctx.action_summary.clone(),
        request_summary,
    }
}

/// Render the Writer prompt: prose only, no state language.
pub fn writer_prompt(envelope: &TurnEnvelope) -> String {
    let context = serde_json::to_string_pretty(envelope).unwrap_or_default();
    format!(
        "You are the narrator of \"{title}\". Write {paragraphs} paragraph(s) of \
         {pov}-person, {tense}-tense prose continuing the scene after the player's \
         action. Stay inside what the context allows: respect closed gates, worn \
         clothing, and who is present. Output prose only — no lists, no JSON, no \
         state commentary.\n\n--- CONTEXT ---\n{context}\n--- END CONTEXT ---\n\
         Player action: {action}\n",
        title = envelope.game_title,
        paragraphs = envelope.narration.paragraphs,
        pov = envelope.narration.pov,
        tense = envelope.narration.tense,
        context = context,
        action = envelope.action,
    )
}

/// Render the Checker prompt: strict JSON deltas for the Writer's prose.
pub fn checker_prompt(envelope: &TurnEnvelope, writer_text: &str) -> String {
    let context = serde_json::to_string_pretty(envelope).unwrap_or_default();
    let summary_clause = if envelope.request_summary {
        "Include a \"narrative_summary\" string condensing the story so far.\n"
    } else {
        ""
    };
    format!(
        "You are the state checker. Given the context and the narration below, emit \
         ONLY a JSON object with any of these keys: safety {{ok, violations}}, \
         meters {{owner: {{meter: \"+N\"|\"-N\"|\"=N\"}}}}, flags, \
         inventory {{owner: {{item: \"+N\"|\"-N\"}}}}, \
         clothing {{character: {{slot: \"intact\"|\"opened\"|\"displaced\"|\"removed\"}}}}, \
         modifiers {{character: [{{\"apply\": id, \"duration_min\": n}} | {{\"remove\": id}}]}}, \
         location {{zone, id}}, events_fired, node_transition, character_memories. \
         Report only changes the narration supports.\n{summary_clause}\
         \n--- CONTEXT ---\n{context}\n--- END CONTEXT ---\n\
         --- NARRATION ---\n{writer_text}\n--- END NARRATION ---\n",
    )
}
