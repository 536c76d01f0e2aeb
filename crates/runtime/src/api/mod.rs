//! Wire shapes for the HTTP surface.
//!
//! The HTTP server itself is an external collaborator; these are the
//! request/response envelopes it exchanges, plus the projection helpers
//! that build read-only views from a session snapshot.

use serde::{Deserialize, Serialize};

use plotplay_core::defs::{Game, PLAYER_ID};
use plotplay_core::services::{clothing, gates, presence};
use plotplay_core::state::GameState;
use plotplay_core::turn::{ChoiceItem, TurnContext};
use plotplay_core::StateSummary;

pub use plotplay_core::PlayerAction as ActionRequest;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub game_id: String,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub state_summary: StateSummary,
    pub choices: Vec<ChoiceItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterBrief {
    pub id: String,
    pub name: String,
    pub present: bool,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharactersResponse {
    pub player: CharacterBrief,
    pub characters: Vec<CharacterBrief>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateView {
    pub id: String,
    pub allow: bool,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub acceptance: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryView {
    pub text: String,
    pub characters: Vec<String>,
    pub day: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterView {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub pronouns: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub appearance: Option<String>,
    #[serde(default)]
    pub dialogue_style: Option<String>,
    pub gates: Vec<GateView>,
    pub memories: Vec<MemoryView>,
    pub meters: std::collections::BTreeMap<String, f64>,
    pub modifiers: Vec<String>,
    pub clothing: String,
    pub present: bool,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoryEventsResponse {
    pub memories: Vec<MemoryView>,
}

/// A scratch context for read-only projections: fresh presence and gate
/// table over the snapshot, nothing mutated.
fn view_context(game: &Game, state: &GameState) -> TurnContext {
    let mut ctx = TurnContext::new(state.turn, state.base_seed);
    // Presence first; gate conditions may consult it.
    presence::refresh(game, state, &mut ctx);
    gates::evaluate(game, state, &mut ctx);
    ctx
}

/// `GET /session/{id}/characters`.
pub fn characters_view(game: &Game, state: &GameState) -> CharactersResponse {
    let ctx = view_context(game, state);
    let player_name = game
        .character(PLAYER_ID)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "You".to_string());

    let characters = game
        .characters
        .iter()
        .filter(|c| c.id != PLAYER_ID)
        .map(|def| {
            let present = ctx.present.iter().any(|p| p == &def.id);
            CharacterBrief {
                id: def.id.clone(),
                name: def.name.clone(),
                present,
                location: present.then(|| state.location.id.clone()),
            }
        })
        .collect();

    CharactersResponse {
        player: CharacterBrief {
            id: PLAYER_ID.to_string(),
            name: player_name,
            present: true,
            location: Some(state.location.id.clone()),
        },
        characters,
    }
}

/// `GET /session/{id}/character/{char_id}`.
///
/// The player sees every memory; other characters only the ones tagged
/// with them.
pub fn character_view(game: &Game, state: &GameState, char_id: &str) -> Option<CharacterView> {
    let def = game.character(char_id)?;
    let cs = state.character(char_id)?;
    let ctx = view_context(game, state);

    let gates = def
        .gates
        .iter()
        .map(|g| GateView {
            id: g.id.clone(),
            allow: ctx.gate_open(char_id, &g.id),
            condition: g.when.clone(),
            acceptance: g.acceptance.clone(),
            refusal: g.refusal.clone(),
        })
        .collect();

    let memories = state
        .memory_log
        .iter()
        .filter(|m| char_id == PLAYER_ID || m.characters.iter().any(|c| c == char_id))
        .map(|m| MemoryView {
            text: m.text.clone(),
            characters: m.characters.clone(),
            day: m.day,
        })
        .collect();

    let present = ctx.present.iter().any(|p| p == char_id);

    Some(CharacterView {
        id: def.id.clone(),
        name: def.name.clone(),
        age: def.age,
        gender: def.gender.clone(),
        pronouns: def.pronouns.clone(),
        personality: def.personality.clone(),
        appearance: def.appearance.clone(),
        dialogue_style: def.dialogue_style.clone(),
        gates,
        memories,
        meters: cs.meters.clone(),
        modifiers: cs.modifiers.keys().cloned().collect(),
        clothing: clothing::appearance(game, state, char_id),
        present,
        location: present.then(|| state.location.id.clone()),
    })
}

/// `GET /session/{id}/story-events`.
pub fn story_events(state: &GameState) -> StoryEventsResponse {
    StoryEventsResponse {
        memories: state
            .memory_log
            .iter()
            .map(|m| MemoryView {
                text: m.text.clone(),
                characters: m.characters.clone(),
                day: m.day,
            })
            .collect(),
    }
}
