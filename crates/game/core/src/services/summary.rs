//! Phase 21: the stable snapshot envelope returned each turn.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::defs::{FlagValue, Game, PLAYER_ID};
use crate::state::GameState;
use crate::turn::TurnContext;

use super::clothing;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeSummary {
    pub day: u32,
    pub time_hhmm: String,
    pub slot: Option<String>,
    pub weekday: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationSummary {
    pub zone: String,
    pub id: String,
    pub name: String,
    pub privacy: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub id: String,
    pub name: String,
    pub meters: BTreeMap<String, f64>,
    pub modifiers: Vec<String>,
    pub clothing: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub meters: BTreeMap<String, f64>,
    pub inventory: BTreeMap<String, u32>,
    pub clothing: String,
    pub money: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlagView {
    pub value: FlagValue,
    pub visible: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EconomySummary {
    pub currency: String,
    pub balance: f64,
}

/// The envelope the UI reads every turn. Field order and the ordered maps
/// keep serialization stable for replay comparison.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateSummary {
    pub time: TimeSummary,
    pub location: LocationSummary,
    pub player: PlayerSummary,
    pub characters: Vec<CharacterSummary>,
    pub exits: Vec<String>,
    pub flags: BTreeMap<String, FlagView>,
    pub economy: EconomySummary,
    pub current_node: String,
    pub action_summary: String,
}

pub fn build(game: &Game, state: &GameState, ctx: &TurnContext) -> StateSummary {
    let location_def = game.location(&state.location.id);

    let player = state.player();
    let money = player.meter(&game.economy.money_meter);

    let visible_meters = |owner: &str, meters: &BTreeMap<String, f64>| -> BTreeMap<String, f64> {
        meters
            .iter()
            .filter(|(id, _)| {
                game.meter(owner, id).map(|def| def.visible).unwrap_or(true)
            })
            .map(|(id, v)| (id.clone(), *v))
            .collect()
    };

    let characters = ctx
        .present
        .iter()
        .filter(|id| id.as_str() != PLAYER_ID)
        .filter_map(|id| {
            let cs = state.character(id)?;
            let def = game.character(id)?;
            Some(CharacterSummary {
                id: id.clone(),
                name: def.name.clone(),
                meters: visible_meters(id, &cs.meters),
                modifiers: cs.modifiers.keys().cloned().collect(),
                clothing: clothing::appearance(game, state, id),
            })
        })
        .collect();

    // Backend stays the source of truth: invisible flags are present but
    // marked, so tests can assert on them without leaking them to the UI.
    let flags = state
        .flags
        .iter()
        .map(|(key, value)| {
            let visible = game.flags.get(key).map(|f| f.visible).unwrap_or(true);
            (
                key.clone(),
                FlagView {
                    value: value.clone(),
                    visible,
                },
            )
        })
        .collect();

    let exits = location_def
        .map(|l| {
            l.connections
                .iter()
                .map(|c| c.direction.clone())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    StateSummary {
        time: TimeSummary {
            day: state.time.day,
            time_hhmm: state.time.hhmm(),
            slot: game.time.slot_at(state.time.minutes).map(|w| w.id.clone()),
            weekday: game.time.weekday_for(state.time.day).to_string(),
        },
        location: LocationSummary {
            zone: state.location.zone.clone(),
            id: state.location.id.clone(),
            name: location_def.map(|l| l.name.clone()).unwrap_or_default(),
            privacy: location_def
                .map(|l| l.privacy.to_string())
                .unwrap_or_default(),
        },
        player: PlayerSummary {
            meters: visible_meters(PLAYER_ID, &player.meters),
            inventory: player.inventory.clone(),
            clothing: clothing::appearance(game, state, PLAYER_ID),
            money,
        },
        characters,
        exits,
        flags,
        economy: EconomySummary {
            currency: game.economy.currency.clone(),
            balance: money,
        },
        current_node: state.current_node.clone(),
        action_summary: ctx.action_summary.clone(),
    }
}
