//! Local moves, in-zone goto, cross-zone travel, and companions.

use std::collections::{BTreeSet, VecDeque};

use crate::defs::{Game, LocationDef, TravelMethodDef, PLAYER_ID};
use crate::state::GameState;
use crate::turn::TurnContext;

use super::presence;

pub type Refusal = String;

/// What kind of move is being attempted, for companion willingness gates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    Move,
    Goto,
    Travel,
}

impl MoveKind {
    fn gate_suffix(self) -> &'static str {
        match self {
            MoveKind::Move => "move",
            MoveKind::Goto => "goto",
            MoveKind::Travel => "travel",
        }
    }
}

/// A completed move: where we ended up and what it cost.
#[derive(Clone, Debug)]
pub struct MoveReport {
    pub destination: String,
    pub minutes: u32,
}

/// Step through a named connection of the current location.
pub fn move_direction(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    direction: &str,
    companions: &[String],
) -> Result<MoveReport, Refusal> {
    let here = current_location(game, state)?;
    let connection = here
        .connections
        .iter()
        .find(|c| c.direction == direction)
        .ok_or_else(|| format!("There's no way {direction} from here."))?;

    let minutes = local_cost(game, connection.distance.as_deref());
    let to = connection.to.clone();
    complete_move(game, state, ctx, &to, minutes, MoveKind::Move, companions)
}

/// Go directly to a location in the current zone.
pub fn goto_location(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    target: &str,
    companions: &[String],
) -> Result<MoveReport, Refusal> {
    let here = current_location(game, state)?;
    let dest = game
        .location(target)
        .ok_or_else(|| "You don't know the way there.".to_string())?;
    if dest.zone != here.zone {
        return Err("That's not in this part of town; travel there instead.".to_string());
    }

    // Direct edge cost when adjacent, zone default otherwise; either way
    // the destination must be reachable through the connection graph.
    let direct = here.connections.iter().find(|c| c.to == target);
    let minutes = match direct {
        Some(conn) => local_cost(game, conn.distance.as_deref()),
        None => {
            if !reachable_in_zone(game, &here.id, target) {
                return Err("You can't get there from here.".to_string());
            }
            game.movement.local.goto_default_time
        }
    };
    complete_move(game, state, ctx, target, minutes, MoveKind::Goto, companions)
}

/// Cross-zone travel via a zone connection and method.
pub fn travel(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    target: &str,
    method_id: Option<&str>,
    companions: &[String],
) -> Result<MoveReport, Refusal> {
    let here = current_location(game, state)?;
    let dest = game
        .location(target)
        .ok_or_else(|| "You don't know that place.".to_string())?;
    if dest.zone == here.zone {
        return Err("That's close enough to just walk to.".to_string());
    }

    let link = game
        .movement
        .travel
        .connections
        .iter()
        .find(|c| c.links(&here.zone, &dest.zone))
        .ok_or_else(|| "There's no way to travel there.".to_string())?;

    let method = pick_method(game, &link.methods, method_id)
        .ok_or_else(|| "No way of getting there suits.".to_string())?;

    if game.movement.travel.use_entry_exit {
        let exits = game.zone(&here.zone).map(|z| z.exits.clone()).unwrap_or_default();
        if !exits.is_empty() && !exits.iter().any(|e| e == &here.id) {
            return Err("You need to head to a way out of the area first.".to_string());
        }
        let entrances = game
            .zone(&dest.zone)
            .map(|z| z.entrances.clone())
            .unwrap_or_default();
        if !entrances.is_empty() && !entrances.iter().any(|e| e == target) {
            return Err("You can't arrive directly there.".to_string());
        }
    }

    let mut minutes = method_minutes(game, method, link.distance);
    if method.active {
        let multiplier = active_travel_multiplier(game, state);
        minutes = ((f64::from(minutes) * multiplier).round() as i64).max(0) as u32;
    }

    complete_move(game, state, ctx, target, minutes, MoveKind::Travel, companions)
}

fn current_location<'g>(game: &'g Game, state: &GameState) -> Result<&'g LocationDef, Refusal> {
    game.location(&state.location.id)
        .ok_or_else(|| "You are nowhere in particular.".to_string())
}

fn local_cost(game: &Game, distance: Option<&str>) -> u32 {
    let base = f64::from(game.movement.local.base_time);
    let modifier = distance
        .and_then(|d| game.movement.local.distance_modifiers.get(d).copied())
        .unwrap_or(1.0);
    (base * modifier).round().max(0.0) as u32
}

fn pick_method<'g>(
    game: &'g Game,
    allowed: &[String],
    wanted: Option<&str>,
) -> Option<&'g TravelMethodDef> {
    let permitted = |id: &str| allowed.is_empty() || allowed.iter().any(|m| m == id);
    match wanted {
        Some(id) => game
            .movement
            .travel
            .methods
            .iter()
            .find(|m| m.id == id && permitted(&m.id)),
        None => game
            .movement
            .travel
            .methods
            .iter()
            .find(|m| permitted(&m.id)),
    }
}

fn method_minutes(game: &Game, method: &TravelMethodDef, distance: f64) -> u32 {
    if let Some(per_unit) = method.time_cost {
        return (f64::from(per_unit) * distance).round().max(0.0) as u32;
    }
    if let Some(category) = &method.category
        && let Some(unit) = game.time.categories.get(category)
    {
        return (f64::from(*unit) * distance).round().max(0.0) as u32;
    }
    if let Some(speed) = method.speed
        && speed > 0.0
    {
        return (distance / speed).round().max(0.0) as u32;
    }
    game.time.defaults.default
}

fn active_travel_multiplier(game: &Game, state: &GameState) -> f64 {
    state
        .player()
        .modifiers
        .keys()
        .filter_map(|id| game.modifier(id))
        .map(|def| def.travel_time_multiplier)
        .product()
}

/// Companion willingness, destination access, and the actual relocation.
fn complete_move(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    target: &str,
    minutes: u32,
    kind: MoveKind,
    companions: &[String],
) -> Result<MoveReport, Refusal> {
    let dest = game
        .location(target)
        .ok_or_else(|| "You don't know the way there.".to_string())?;

    // Companions must be here and willing before anyone moves.
    for companion in companions {
        if !ctx.present.iter().any(|p| p == companion) {
            let name = character_name(game, companion);
            return Err(format!("{name} isn't here to come along."));
        }
        let specific = format!("follow_player_{}", kind.gate_suffix());
        if ctx.gate_defined_closed(companion, "follow_player")
            || ctx.gate_defined_closed(companion, &specific)
        {
            let name = character_name(game, companion);
            return Err(format!("{name} won't come along."));
        }
    }

    // Access: discovered, auto-discoverable, or nothing doing.
    let known = state.discovered_locations.contains(target);
    if !known {
        let discoverable = dest
            .discovery_conditions
            .as_ref()
            .map(|expr| ctx.check(game, state, expr))
            .unwrap_or(false);
        if !discoverable {
            return Err("You don't know the way there.".to_string());
        }
    }
    if state.locked.locations.contains(target) {
        let unlocked = dest
            .unlock_when
            .as_ref()
            .map(|expr| ctx.check(game, state, expr))
            .unwrap_or(false);
        if !unlocked {
            return Err("That way is closed.".to_string());
        }
    }

    state.location.id = dest.id.clone();
    state.location.zone = dest.zone.clone();
    state.discovered_locations.insert(dest.id.clone());
    state.discovered_zones.insert(dest.zone.clone());

    // Companions arrive with the player and stay until re-scheduled.
    for companion in companions {
        if companion == PLAYER_ID {
            continue;
        }
        if let Some(cs) = state.character_mut(companion) {
            cs.location_pin = Some(dest.id.clone());
        }
    }

    ctx.time_advance_minutes = minutes;
    presence::refresh(game, state, ctx);

    Ok(MoveReport {
        destination: dest.id.clone(),
        minutes,
    })
}

/// Relocate with no time cost, validating access but not connectivity
/// cost: used when narration has already carried the party somewhere and
/// the state just has to agree.
pub fn relocate_free(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    target: &str,
) -> Result<(), Refusal> {
    let saved_minutes = ctx.time_advance_minutes;
    let report = {
        let here = current_location(game, state)?;
        let dest = game
            .location(target)
            .ok_or_else(|| "Unknown place.".to_string())?;
        let legal = dest.zone == here.zone && reachable_in_zone(game, &here.id, target)
            || game
                .movement
                .travel
                .connections
                .iter()
                .any(|c| c.links(&here.zone, &dest.zone));
        if !legal {
            return Err("You can't get there from here.".to_string());
        }
        complete_move(game, state, ctx, target, 0, MoveKind::Goto, &[])
    };
    ctx.time_advance_minutes = saved_minutes;
    report.map(|_| ())
}

fn character_name(game: &Game, id: &str) -> String {
    game.character(id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Breadth-first reachability over intra-zone connections.
fn reachable_in_zone(game: &Game, from: &str, to: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([from.to_string()]);
    while let Some(id) = queue.pop_front() {
        if id == to {
            return true;
        }
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(loc) = game.location(&id) {
            for conn in &loc.connections {
                if !seen.contains(&conn.to) {
                    queue.push_back(conn.to.clone());
                }
            }
        }
    }
    false
}
