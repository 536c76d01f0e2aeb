//! Which characters are at the current location.

use crate::defs::{Game, PLAYER_ID};
use crate::state::GameState;
use crate::turn::TurnContext;

/// Recompute the presence list: player, pinned characters, then scheduled
/// ones. Schedule rules are checked in declaration order; the first match
/// decides the character's location for the current time.
pub fn refresh(game: &Game, state: &GameState, ctx: &mut TurnContext) {
    let mut present = vec![PLAYER_ID.to_string()];
    let here = state.location.id.as_str();

    for def in &game.characters {
        if def.id == PLAYER_ID {
            continue;
        }
        let Some(cs) = state.character(&def.id) else {
            continue;
        };

        let location = if let Some(pin) = &cs.location_pin {
            Some(pin.clone())
        } else {
            scheduled_location(game, state, ctx, &def.id)
        };

        if location.as_deref() == Some(here) {
            present.push(def.id.clone());
        }
    }

    ctx.present = present;
}

fn scheduled_location(
    game: &Game,
    state: &GameState,
    ctx: &TurnContext,
    char_id: &str,
) -> Option<String> {
    let def = game.character(char_id)?;
    let slot = game.time.slot_at(state.time.minutes).map(|w| w.id.as_str());
    let weekday = game.time.weekday_for(state.time.day);

    for rule in &def.schedule {
        if let Some(wanted) = &rule.slot
            && slot != Some(wanted.as_str())
        {
            continue;
        }
        if let Some(wanted) = &rule.weekday
            && wanted != weekday
        {
            continue;
        }
        if let Some(when) = &rule.when
            && !ctx.check(game, state, when)
        {
            continue;
        }
        return Some(rule.location.clone());
    }
    None
}
