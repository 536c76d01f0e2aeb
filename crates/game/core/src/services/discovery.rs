//! Phase 17: discovery of locations and zones.

use crate::defs::Game;
use crate::state::GameState;
use crate::turn::TurnContext;

/// Mark locations and zones whose discovery conditions now pass.
pub fn update(game: &Game, state: &mut GameState, ctx: &mut TurnContext) {
    let mut found_locations = Vec::new();
    for location in &game.locations {
        if state.discovered_locations.contains(&location.id) {
            continue;
        }
        if let Some(expr) = &location.discovery_conditions
            && ctx.check(game, state, expr)
        {
            found_locations.push(location.id.clone());
        }
    }
    for id in found_locations {
        state.discovered_locations.insert(id);
    }

    let mut found_zones = Vec::new();
    for zone in &game.zones {
        if state.discovered_zones.contains(&zone.id) {
            continue;
        }
        if let Some(expr) = &zone.discovery_conditions
            && ctx.check(game, state, expr)
        {
            found_zones.push(zone.id.clone());
        }
    }
    for id in found_zones {
        state.discovered_zones.insert(id);
    }
}
