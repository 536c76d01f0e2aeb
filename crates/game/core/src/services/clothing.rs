//! Worn-clothing state machine: slots, concealment, locks, outfits.
//!
//! Refusals are values, not errors: an impossible clothing change returns
//! the line the player should read, and no state moves. The Writer is
//! never asked to narrate a state change that did not happen.

use crate::defs::{ClothingItemDef, ClothingState, Game};
use crate::state::{CharacterState, GameState, WornItem};
use crate::turn::TurnContext;

pub type Refusal = String;

/// True when the clothing item is currently locked for `state`'s world.
///
/// An item is locked while its id sits in the locked set (seeded from the
/// definition, cleared by `unlock` effects) or while its `unlock_when`
/// condition evaluates false.
fn is_locked(game: &Game, state: &GameState, ctx: &TurnContext, def: &ClothingItemDef) -> bool {
    if state.locked.clothing.contains(&def.id) {
        return true;
    }
    match &def.unlock_when {
        Some(expr) => !ctx.check(game, state, expr),
        None => false,
    }
}

/// The intact item concealing `slot`, if any.
///
/// An item conceals a slot when it is worn in a strictly higher-priority
/// slot (earlier in `slot_order`), lists the slot in `conceals`, and is
/// itself intact. `ignore_item` exempts the item being changed so a
/// multi-slot garment never conceals itself.
fn concealing_item<'a>(
    game: &'a Game,
    cs: &CharacterState,
    slot: &str,
    ignore_item: &str,
) -> Option<&'a ClothingItemDef> {
    let priority = game.wardrobe.slot_priority(slot)?;
    for (worn_slot, worn) in &cs.worn {
        if worn.item == ignore_item || worn.state != ClothingState::Intact {
            continue;
        }
        let Some(worn_priority) = game.wardrobe.slot_priority(worn_slot) else {
            continue;
        };
        if worn_priority >= priority {
            continue;
        }
        if let Some(def) = game.clothing_item(&worn.item)
            && def.conceals.iter().any(|s| s == slot)
        {
            return Some(def);
        }
    }
    None
}

/// Put a clothing item on: fills every slot it occupies, intact.
pub fn put_on(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    owner: &str,
    item_id: &str,
) -> Result<(), Refusal> {
    let Some(def) = game.clothing_item(item_id) else {
        return Err("Nothing happens.".to_string());
    };
    let owned = state
        .character(owner)
        .map(|c| c.owns_clothing(item_id))
        .unwrap_or(false);
    if !owned {
        return Err(format!("The {} isn't theirs to wear.", def.name));
    }
    if is_locked(game, state, ctx, def) {
        return Err(format!("The {} stays where it is.", def.name));
    }
    let unknown_slot = def.occupies.iter().find(|s| !game.wardrobe.has_slot(s));
    if let Some(slot) = unknown_slot {
        tracing::warn!(target: "clothing", item = item_id, slot = slot.as_str(), "unknown slot");
        return Err("Nothing happens.".to_string());
    }

    if let Some(cs) = state.character_mut(owner) {
        for slot in &def.occupies {
            cs.worn.insert(
                slot.clone(),
                WornItem {
                    item: item_id.to_string(),
                    state: ClothingState::Intact,
                },
            );
        }
    }
    Ok(())
}

/// Take a clothing item off entirely; it stays in the clothing inventory.
pub fn take_off(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    owner: &str,
    item_id: &str,
) -> Result<(), Refusal> {
    set_item_state(game, state, ctx, owner, item_id, ClothingState::Removed)
}

/// Transition one worn item to a new state (all of its occupied slots).
pub fn set_item_state(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    owner: &str,
    item_id: &str,
    target: ClothingState,
) -> Result<(), Refusal> {
    let slots: Vec<String> = state
        .character(owner)
        .map(|c| {
            c.worn
                .iter()
                .filter(|(_, w)| w.item == item_id)
                .map(|(slot, _)| slot.clone())
                .collect()
        })
        .unwrap_or_default();
    if slots.is_empty() {
        let name = game
            .clothing_item(item_id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| item_id.to_string());
        return Err(format!("The {name} isn't being worn."));
    }
    transition(game, state, ctx, owner, item_id, &slots, target)
}

/// Transition whatever occupies `slot` to a new state.
///
/// Only the addressed slot changes, so a multi-slot garment can be
/// displaced at one slot and intact at another. `removed` still clears
/// the whole garment from every slot it occupies.
pub fn set_slot_state(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    owner: &str,
    slot: &str,
    target: ClothingState,
) -> Result<(), Refusal> {
    let item_id = state
        .character(owner)
        .and_then(|c| c.worn.get(slot))
        .map(|w| w.item.clone());
    let Some(item_id) = item_id else {
        return Err(format!("Nothing is worn there ({slot})."));
    };
    if target == ClothingState::Removed {
        return set_item_state(game, state, ctx, owner, &item_id, target);
    }
    transition(game, state, ctx, owner, &item_id, &[slot.to_string()], target)
}

fn transition(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    owner: &str,
    item_id: &str,
    slots: &[String],
    target: ClothingState,
) -> Result<(), Refusal> {
    let Some(def) = game.clothing_item(item_id) else {
        return Err("Nothing happens.".to_string());
    };

    // Locks block everything except returning to intact.
    if target != ClothingState::Intact && is_locked(game, state, ctx, def) {
        return Err(format!("The {} won't budge.", def.name));
    }

    // Concealment: outer intact garments shield the slots they conceal.
    if let Some(cs) = state.character(owner) {
        for slot in slots {
            if let Some(outer) = concealing_item(game, cs, slot, item_id) {
                return Err(format!("The {} is in the way.", outer.name));
            }
        }
    }

    for slot in slots {
        let current = state
            .character(owner)
            .and_then(|c| c.worn.get(slot))
            .map(|w| w.state)
            .ok_or_else(|| format!("The {} isn't being worn.", def.name))?;
        if current == target {
            continue;
        }
        let allowed = matches!(
            (current, target),
            (ClothingState::Intact, ClothingState::Opened)
                | (ClothingState::Intact, ClothingState::Displaced)
                | (ClothingState::Opened, ClothingState::Intact)
                | (ClothingState::Displaced, ClothingState::Intact)
                | (_, ClothingState::Removed)
        );
        if !allowed {
            return Err(format!("The {} can't go from there to that.", def.name));
        }
        if target == ClothingState::Opened && !def.can_open {
            return Err(format!("The {} doesn't open.", def.name));
        }
    }

    if let Some(cs) = state.character_mut(owner) {
        if target == ClothingState::Removed {
            cs.worn.retain(|_, worn| worn.item != item_id);
        } else {
            for slot in slots {
                if let Some(worn) = cs.worn.get_mut(slot) {
                    worn.state = target;
                }
            }
        }
    }
    Ok(())
}

/// Compose an outfit onto its owner: requires the outfit and every member
/// item to be owned; slots fill in declaration order, last item wins.
pub fn outfit_put_on(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    owner: &str,
    outfit_id: &str,
) -> Result<(), Refusal> {
    let Some(outfit) = game.outfit(outfit_id) else {
        return Err("Nothing happens.".to_string());
    };
    let Some(cs) = state.character(owner) else {
        return Err("Nothing happens.".to_string());
    };
    if !cs.owned_outfits.contains(outfit_id) {
        return Err(format!("The {} isn't theirs.", outfit.name));
    }
    for item in &outfit.items {
        if !cs.owns_clothing(item) {
            let name = game
                .clothing_item(item)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| item.clone());
            return Err(format!("The {name} is missing from the wardrobe."));
        }
        if let Some(def) = game.clothing_item(item)
            && is_locked(game, state, ctx, def)
        {
            return Err(format!("The {} won't budge.", def.name));
        }
    }

    if let Some(cs) = state.character_mut(owner) {
        cs.worn.clear();
    }
    let items = outfit.items.clone();
    for item_id in items {
        if let Some(def) = game.clothing_item(&item_id)
            && let Some(cs) = state.character_mut(owner)
        {
            for slot in &def.occupies {
                if !game.wardrobe.has_slot(slot) {
                    continue;
                }
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
    if let Some(cs) = state.character_mut(owner) {
        cs.active_outfit = Some(outfit_id.to_string());
    }
    Ok(())
}

/// Strip everything worn; outfit ownership is unchanged.
pub fn outfit_take_off(state: &mut GameState, owner: &str) {
    if let Some(cs) = state.character_mut(owner) {
        cs.worn.clear();
        cs.active_outfit = None;
    }
}

/// Textual appearance summary for prompt envelopes: slot order, per-state
/// description lines, "uncovered" for empty slots.
pub fn appearance(game: &Game, state: &GameState, owner: &str) -> String {
    let Some(cs) = state.character(owner) else {
        return String::new();
    };
    let mut lines = Vec::new();
    for slot in &game.wardrobe.slot_order {
        match cs.worn.get(slot) {
            Some(worn) => {
                let line = game
                    .clothing_item(&worn.item)
                    .map(|def| {
                        def.description_for(worn.state)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("{} ({})", def.name, worn.state))
                    })
                    .unwrap_or_else(|| worn.item.clone());
                lines.push(format!("{slot}: {line}"));
            }
            None => lines.push(format!("{slot}: uncovered")),
        }
    }
    lines.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::new_session_state;
    use crate::turn::TurnContext;

    fn game() -> Game {
        serde_json::from_value(serde_json::json!({
            "meta": {"id": "t", "title": "t"},
            "start": {"location": "here", "node": "start"},
            "zones": [{"id": "z", "name": "Z"}],
            "locations": [{"id": "here", "zone": "z", "name": "Here"}],
            "nodes": [{"id": "start", "type": "hub", "title": "Start"}],
            "wardrobe": {"slot_order": ["outerwear", "top", "bottom", "underwear_top", "feet"]},
            "characters": [{
                "id": "kate", "name": "Kate",
                "clothing": ["dress", "coat", "heels", "bra"],
                "outfits": ["evening"]
            }],
            "clothing_items": [
                {"id": "dress", "name": "Dress", "occupies": ["top", "bottom"],
                 "conceals": ["underwear_top"], "can_open": true},
                {"id": "coat", "name": "Coat", "occupies": ["outerwear"],
                 "conceals": ["top"], "can_open": true},
                {"id": "heels", "name": "Heels", "occupies": ["feet"]},
                {"id": "bra", "name": "Bra", "occupies": ["underwear_top"]},
                {"id": "cursed_belt", "name": "Cursed Belt", "occupies": ["accessories"],
                 "locked": true}
            ],
            "outfits": [
                {"id": "evening", "name": "Evening", "items": ["dress", "heels"]}
            ]
        }))
        .unwrap()
    }

    fn fixture() -> (Game, GameState, TurnContext) {
        let game = game();
        let state = new_session_state(&game, 1);
        let ctx = TurnContext::new(1, 1);
        (game, state, ctx)
    }

    #[test]
    fn outfit_composition_last_item_wins() {
        let (game, mut state, mut ctx) = fixture();
        outfit_put_on(&game, &mut state, &mut ctx, "kate", "evening").unwrap();
        let kate = state.character("kate").unwrap();
        assert_eq!(kate.worn["top"].item, "dress");
        assert_eq!(kate.worn["bottom"].item, "dress");
        assert_eq!(kate.worn["feet"].item, "heels");
        assert_eq!(kate.active_outfit.as_deref(), Some("evening"));
        assert!(!kate.worn.contains_key("underwear_top"));
    }

    #[test]
    fn slot_state_changes_only_that_slot() {
        let (game, mut state, mut ctx) = fixture();
        outfit_put_on(&game, &mut state, &mut ctx, "kate", "evening").unwrap();
        set_slot_state(&game, &mut state, &mut ctx, "kate", "top", ClothingState::Displaced)
            .unwrap();
        let kate = state.character("kate").unwrap();
        assert_eq!(kate.worn["top"].state, ClothingState::Displaced);
        assert_eq!(kate.worn["bottom"].state, ClothingState::Intact);
    }

    #[test]
    fn removal_clears_every_occupied_slot() {
        let (game, mut state, mut ctx) = fixture();
        outfit_put_on(&game, &mut state, &mut ctx, "kate", "evening").unwrap();
        set_slot_state(&game, &mut state, &mut ctx, "kate", "top", ClothingState::Removed)
            .unwrap();
        let kate = state.character("kate").unwrap();
        assert!(!kate.worn.contains_key("top"));
        assert!(!kate.worn.contains_key("bottom"));
        assert!(kate.owns_clothing("dress"));
    }

    #[test]
    fn empty_slot_refuses_state_change() {
        let (game, mut state, mut ctx) = fixture();
        outfit_put_on(&game, &mut state, &mut ctx, "kate", "evening").unwrap();
        let err = set_slot_state(
            &game,
            &mut state,
            &mut ctx,
            "kate",
            "underwear_top",
            ClothingState::Removed,
        )
        .unwrap_err();
        assert!(err.contains("underwear_top"));
    }

    #[test]
    fn concealment_blocks_inner_changes_until_outer_yields() {
        let (game, mut state, mut ctx) = fixture();
        put_on(&game, &mut state, &mut ctx, "kate", "bra").unwrap();
        put_on(&game, &mut state, &mut ctx, "kate", "dress").unwrap();
        put_on(&game, &mut state, &mut ctx, "kate", "coat").unwrap();

        // Coat conceals top; the dress cannot move while the coat is intact.
        let err =
            set_slot_state(&game, &mut state, &mut ctx, "kate", "top", ClothingState::Displaced)
                .unwrap_err();
        assert!(err.contains("Coat"));

        // Bra sits under the intact dress.
        let err = take_off(&game, &mut state, &mut ctx, "kate", "bra").unwrap_err();
        assert!(err.contains("Dress"));

        // Outer-to-inner order works.
        take_off(&game, &mut state, &mut ctx, "kate", "coat").unwrap();
        set_slot_state(&game, &mut state, &mut ctx, "kate", "top", ClothingState::Displaced)
            .unwrap();
    }

    #[test]
    fn opened_dress_stops_concealing() {
        let (game, mut state, mut ctx) = fixture();
        put_on(&game, &mut state, &mut ctx, "kate", "bra").unwrap();
        put_on(&game, &mut state, &mut ctx, "kate", "dress").unwrap();
        set_item_state(&game, &mut state, &mut ctx, "kate", "dress", ClothingState::Opened)
            .unwrap();
        take_off(&game, &mut state, &mut ctx, "kate", "bra").unwrap();
        assert!(!state.character("kate").unwrap().worn.contains_key("underwear_top"));
    }

    #[test]
    fn invalid_transition_is_refused() {
        let (game, mut state, mut ctx) = fixture();
        put_on(&game, &mut state, &mut ctx, "kate", "dress").unwrap();
        set_item_state(&game, &mut state, &mut ctx, "kate", "dress", ClothingState::Opened)
            .unwrap();
        // opened → displaced is not in the state machine.
        assert!(set_item_state(
            &game,
            &mut state,
            &mut ctx,
            "kate",
            "dress",
            ClothingState::Displaced
        )
        .is_err());
        // opened → intact is.
        set_item_state(&game, &mut state, &mut ctx, "kate", "dress", ClothingState::Intact)
            .unwrap();
    }

    #[test]
    fn cannot_open_what_does_not_open() {
        let (game, mut state, mut ctx) = fixture();
        put_on(&game, &mut state, &mut ctx, "kate", "heels").unwrap();
        assert!(set_item_state(
            &game,
            &mut state,
            &mut ctx,
            "kate",
            "heels",
            ClothingState::Opened
        )
        .is_err());
    }

    #[test]
    fn unowned_clothing_refuses_put_on() {
        let (game, mut state, mut ctx) = fixture();
        assert!(put_on(&game, &mut state, &mut ctx, "kate", "cursed_belt").is_err());
    }

    #[test]
    fn outfit_take_off_keeps_ownership() {
        let (game, mut state, mut ctx) = fixture();
        outfit_put_on(&game, &mut state, &mut ctx, "kate", "evening").unwrap();
        outfit_take_off(&mut state, "kate");
        let kate = state.character("kate").unwrap();
        assert!(kate.worn.is_empty());
        assert!(kate.owned_outfits.contains("evening"));
        assert!(kate.owns_clothing("dress"));
    }
}
