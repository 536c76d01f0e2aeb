//! Initial session state built from a validated game definition.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::defs::{Game, PLAYER_ID};

use super::{CharacterState, GameState, LocationState, LockedSets, TimeState, WornItem};
use crate::defs::ClothingState;

fn character_state(game: &Game, char_id: &str) -> CharacterState {
    let def = game.character(char_id);

    let mut meters = BTreeMap::new();
    for (id, m) in &game.meters {
        meters.insert(id.clone(), m.clamp(m.default));
    }
    if let Some(def) = def {
        for (id, m) in &def.meters {
            meters.insert(id.clone(), m.clamp(m.default));
        }
    }

    let mut cs = CharacterState {
        meters,
        ..CharacterState::default()
    };

    if let Some(def) = def {
        cs.inventory = def.inventory.clone();
        for item in &def.clothing {
            cs.clothing_inventory.insert(item.clone(), 1);
        }
        cs.owned_outfits = def.outfits.iter().cloned().collect();
        cs.location_pin = def.location.clone();

        // Starting outfit composes worn slots the same way outfit_put_on
        // does: declaration order, last item wins per slot.
        if let Some(outfit_id) = &def.active_outfit
            && let Some(outfit) = game.outfit(outfit_id)
        {
            for item_id in &outfit.items {
                cs.clothing_inventory.entry(item_id.clone()).or_insert(1);
                if let Some(item) = game.clothing_item(item_id) {
                    for slot in &item.occupies {
                        cs.worn.insert(
                            slot.clone(),
                            WornItem {
                                item: item_id.clone(),
                                state: ClothingState::Intact,
                            },
                        );
                    }
                }
            }
            cs.active_outfit = Some(outfit_id.clone());
        }
    }

    cs
}

/// Build the session's starting state from the game's `start` block.
pub fn new_session_state(game: &Game, base_seed: u64) -> GameState {
    let start_location = game.location(&game.start.location);
    let zone = start_location
        .map(|l| l.zone.clone())
        .unwrap_or_default();

    let mut characters = BTreeMap::new();
    characters.insert(PLAYER_ID.to_string(), character_state(game, PLAYER_ID));
    for def in &game.characters {
        if def.id != PLAYER_ID {
            characters.insert(def.id.clone(), character_state(game, &def.id));
        }
    }

    let mut discovered_locations: BTreeSet<String> = game
        .locations
        .iter()
        .filter(|l| l.discovered)
        .map(|l| l.id.clone())
        .collect();
    discovered_locations.insert(game.start.location.clone());

    let mut discovered_zones: BTreeSet<String> = game
        .zones
        .iter()
        .filter(|z| z.discovered)
        .map(|z| z.id.clone())
        .collect();
    if !zone.is_empty() {
        discovered_zones.insert(zone.clone());
    }

    let location_inventory = game
        .locations
        .iter()
        .filter(|l| !l.items.is_empty())
        .map(|l| (l.id.clone(), l.items.clone()))
        .collect();

    let mut locked = LockedSets::default();
    for l in &game.locations {
        if l.locked {
            locked.locations.insert(l.id.clone());
        }
    }
    for c in &game.clothing_items {
        if c.locked {
            locked.clothing.insert(c.id.clone());
        }
    }

    let arc_progress = game.arcs.iter().map(|a| (a.id.clone(), 0usize)).collect();
    let arc_history = game
        .arcs
        .iter()
        .map(|a| {
            let first = a.stages.first().map(|s| vec![s.id.clone()]).unwrap_or_default();
            (a.id.clone(), first)
        })
        .collect();

    GameState {
        time: TimeState {
            day: game.start.day,
            minutes: game.start.minutes,
        },
        location: LocationState {
            zone,
            id: game.start.location.clone(),
        },
        characters,
        flags: game
            .flags
            .iter()
            .map(|(k, f)| (k.clone(), f.default.clone()))
            .collect(),
        location_inventory,
        discovered_locations,
        discovered_zones,
        unlocked_actions: BTreeSet::new(),
        unlocked_endings: BTreeSet::new(),
        locked,
        arc_progress,
        arc_history,
        event_cooldowns: BTreeMap::new(),
        events_once: BTreeSet::new(),
        current_node: game.start.node.clone(),
        node_entered: false,
        event_choices: Vec::new(),
        visited_nodes: BTreeSet::new(),
        turn: 0,
        narrative_history: VecDeque::new(),
        memory_log: VecDeque::new(),
        narrative_summary: String::new(),
        ai_turns_since_summary: 0,
        time_in_node: 0,
        base_seed,
    }
}
