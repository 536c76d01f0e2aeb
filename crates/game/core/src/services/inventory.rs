//! Inventory operations: items, clothing items, outfits, trade.
//!
//! Outfit and clothing ids share the `inventory_add`/`inventory_remove`
//! surface: adding an outfit grants membership (and, with `grant_items`,
//! any missing member items, recorded so removal returns exactly what was
//! granted); adding a clothing id lands in the separate clothing
//! inventory, capped at one of each.

use tracing::warn;

use crate::defs::{Game, PLAYER_ID};
use crate::effects::apply_batch;
use crate::state::GameState;
use crate::turn::TurnContext;

/// A user-visible reason an operation did not happen.
pub type Refusal = String;

pub fn add(game: &Game, state: &mut GameState, ctx: &mut TurnContext, owner: &str, item: &str, count: u32) {
    if count == 0 {
        return;
    }
    if game.outfit(item).is_some() {
        add_outfit(game, state, owner, item);
        return;
    }
    if game.clothing_item(item).is_some() {
        add_clothing(state, owner, item);
        return;
    }
    let Some(def) = game.item(item) else {
        warn!(target: "inventory", item, "unknown item id, skipping add");
        return;
    };

    let Some(cs) = state.character_mut(owner) else {
        warn!(target: "inventory", owner, "unknown character, skipping add");
        return;
    };
    let before = cs.inventory.get(item).copied().unwrap_or(0);
    let added = if def.stackable { count } else { count.min(1u32.saturating_sub(before)) };
    if added == 0 {
        return;
    }
    *cs.inventory.entry(item.to_string()).or_insert(0) += added;

    if before == 0 && !def.on_get.is_empty() && ctx.hook_not_yet_fired(owner, item, "on_get") {
        let hook = def.on_get.clone();
        apply_batch(game, state, ctx, &hook);
    }
}

pub fn remove(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    owner: &str,
    item: &str,
    count: u32,
) {
    if count == 0 {
        return;
    }
    if game.outfit(item).is_some() {
        remove_outfit(state, owner, item);
        return;
    }
    if game.clothing_item(item).is_some() {
        remove_clothing(state, owner, item);
        return;
    }
    let Some(cs) = state.character_mut(owner) else {
        return;
    };
    let before = cs.inventory.get(item).copied().unwrap_or(0);
    if before == 0 {
        return;
    }
    let after = before.saturating_sub(count);
    if after == 0 {
        cs.inventory.remove(item);
    } else {
        cs.inventory.insert(item.to_string(), after);
    }

    if after == 0
        && let Some(def) = game.item(item)
        && !def.on_lost.is_empty()
        && ctx.hook_not_yet_fired(owner, item, "on_lost")
    {
        let hook = def.on_lost.clone();
        apply_batch(game, state, ctx, &hook);
    }
}

fn add_outfit(game: &Game, state: &mut GameState, owner: &str, outfit_id: &str) {
    let Some(outfit) = game.outfit(outfit_id) else {
        return;
    };
    let Some(cs) = state.character_mut(owner) else {
        return;
    };
    if !cs.owned_outfits.insert(outfit_id.to_string()) {
        return;
    }
    if outfit.grant_items {
        let mut granted = std::collections::BTreeSet::new();
        for item in &outfit.items {
            if !cs.owns_clothing(item) {
                cs.clothing_inventory.insert(item.clone(), 1);
                granted.insert(item.clone());
            }
        }
        if !granted.is_empty() {
            cs.granted_outfit_items.insert(outfit_id.to_string(), granted);
        }
    }
}

fn remove_outfit(state: &mut GameState, owner: &str, outfit_id: &str) {
    let Some(cs) = state.character_mut(owner) else {
        return;
    };
    if !cs.owned_outfits.remove(outfit_id) {
        return;
    }
    if cs.active_outfit.as_deref() == Some(outfit_id) {
        cs.active_outfit = None;
    }
    // Return exactly the items this outfit granted, not independently
    // owned copies.
    if let Some(granted) = cs.granted_outfit_items.remove(outfit_id) {
        for item in granted {
            cs.clothing_inventory.remove(&item);
            cs.worn.retain(|_, worn| worn.item != item);
        }
    }
}

fn add_clothing(state: &mut GameState, owner: &str, item: &str) {
    if let Some(cs) = state.character_mut(owner) {
        cs.clothing_inventory.insert(item.to_string(), 1);
    }
}

fn remove_clothing(state: &mut GameState, owner: &str, item: &str) {
    if let Some(cs) = state.character_mut(owner) {
        cs.clothing_inventory.remove(item);
        cs.worn.retain(|_, worn| worn.item != item);
    }
}

/// Move stock from the current location to the player.
pub fn take(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    item: &str,
    count: u32,
) -> Result<(), Refusal> {
    let here = state.location.id.clone();
    let stock = state.location_stock(&here, item);
    if stock < count {
        return Err(format!("There isn't {count} of that here to take."));
    }
    if let Some(inv) = state.location_inventory.get_mut(&here) {
        let after = stock - count;
        if after == 0 {
            inv.remove(item);
        } else {
            inv.insert(item.to_string(), after);
        }
    }
    add(game, state, ctx, PLAYER_ID, item, count);
    Ok(())
}

/// Move items from the player to the current location floor.
pub fn drop(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    item: &str,
    count: u32,
) -> Result<(), Refusal> {
    let have = state.player().item_count(item);
    if have < count {
        return Err("You don't have that many to drop.".to_string());
    }
    if let Some(def) = game.item(item)
        && !def.droppable
    {
        return Err(format!("You can't just leave the {} behind.", def.name));
    }
    remove(game, state, ctx, PLAYER_ID, item, count);
    let here = state.location.id.clone();
    *state
        .location_inventory
        .entry(here)
        .or_default()
        .entry(item.to_string())
        .or_insert(0) += count;
    Ok(())
}

/// Hand an item from one present character to another.
pub fn give(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    from: &str,
    to: &str,
    item: &str,
    count: u32,
) -> Result<(), Refusal> {
    let both_present = ctx.present.iter().any(|p| p == from) && ctx.present.iter().any(|p| p == to);
    if !both_present {
        return Err("They aren't here.".to_string());
    }
    let Some(def) = game.item(item) else {
        return Err("Nothing happens.".to_string());
    };
    if !def.can_give {
        return Err(format!("The {} can't be handed over.", def.name));
    }
    let have = state
        .character(from)
        .map(|c| c.item_count(item))
        .unwrap_or(0);
    if have < count {
        return Err("You don't have that to give.".to_string());
    }

    remove(game, state, ctx, from, item, count);
    add(game, state, ctx, to, item, count);

    if !def.on_give.is_empty() && ctx.hook_not_yet_fired(from, item, "on_give") {
        let hook = def.on_give.clone();
        apply_batch(game, state, ctx, &hook);
    }
    Ok(())
}

/// Purchase: buyer pays `price` per unit to seller, item moves the other
/// way. Validates funds, seller stock, and the money meter's cap.
pub fn purchase(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    buyer: &str,
    seller: &str,
    item: &str,
    count: u32,
    price: f64,
) -> Result<(), Refusal> {
    let money_meter = game.economy.money_meter.as_str();
    let total = price * f64::from(count);

    let stock = state
        .character(seller)
        .map(|c| c.item_count(item))
        .unwrap_or(0);
    if stock < count {
        return Err("It's out of stock.".to_string());
    }
    let funds = state
        .character(buyer)
        .map(|c| c.meter(money_meter))
        .unwrap_or(0.0);
    if funds < total {
        return Err("You can't afford that.".to_string());
    }

    transfer_money(game, state, buyer, seller, total);
    remove(game, state, ctx, seller, item, count);
    add(game, state, ctx, buyer, item, count);
    Ok(())
}

/// Sell is the inverse of purchase: seller hands the item over, buyer pays.
pub fn sell(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    seller: &str,
    buyer: &str,
    item: &str,
    count: u32,
    price: f64,
) -> Result<(), Refusal> {
    let money_meter = game.economy.money_meter.as_str();
    let total = price * f64::from(count);

    let stock = state
        .character(seller)
        .map(|c| c.item_count(item))
        .unwrap_or(0);
    if stock < count {
        return Err("You don't have that to sell.".to_string());
    }
    let funds = state
        .character(buyer)
        .map(|c| c.meter(money_meter))
        .unwrap_or(0.0);
    if funds < total {
        return Err("They can't afford that.".to_string());
    }

    transfer_money(game, state, buyer, seller, total);
    remove(game, state, ctx, seller, item, count);
    add(game, state, ctx, buyer, item, count);
    Ok(())
}

/// Move money from payer to payee, clamping both ends to the meter range.
fn transfer_money(game: &Game, state: &mut GameState, payer: &str, payee: &str, amount: f64) {
    let meter = game.economy.money_meter.clone();
    for (who, delta) in [(payer, -amount), (payee, amount)] {
        let Some(def) = game.meter(who, &meter) else {
            continue;
        };
        if let Some(cs) = state.character_mut(who)
            && let Some(value) = cs.meters.get_mut(&meter)
        {
            *value = def.clamp(*value + delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::new_session_state;

    fn game() -> Game {
        serde_json::from_value(serde_json::json!({
            "meta": {"id": "t", "title": "t"},
            "start": {"location": "shop", "node": "start"},
            "meters": {"money": {"min": 0.0, "max": 100.0, "default": 20.0}},
            "zones": [{"id": "z", "name": "Z"}],
            "locations": [{"id": "shop", "zone": "z", "name": "Shop",
                           "items": {"apple": 2}}],
            "nodes": [{"id": "start", "type": "hub", "title": "Start"}],
            "characters": [{"id": "clerk", "name": "Clerk",
                            "inventory": {"apple": 5}}],
            "items": [
                {"id": "apple", "name": "Apple", "value": 3.0},
                {"id": "keepsake", "name": "Keepsake", "droppable": false,
                 "can_give": false},
                {"id": "charm_bead", "name": "Charm Bead",
                 "on_get": [{"type": "flag_set", "key": "found_bead", "value": true}]}
            ],
            "flags": {"found_bead": {"default": false}},
            "outfits": [{"id": "uniform", "name": "Uniform", "items": ["apron", "clogs"]}],
            "clothing_items": [
                {"id": "apron", "name": "Apron", "occupies": ["top"]},
                {"id": "clogs", "name": "Clogs", "occupies": ["feet"]}
            ],
            "wardrobe": {"slot_order": ["top", "feet"]}
        }))
        .unwrap()
    }

    fn fixture() -> (Game, crate::state::GameState, crate::turn::TurnContext) {
        let game = game();
        let state = new_session_state(&game, 1);
        let ctx = crate::turn::TurnContext::new(1, 1);
        (game, state, ctx)
    }

    #[test]
    fn take_and_drop_move_location_stock() {
        let (game, mut state, mut ctx) = fixture();
        take(&game, &mut state, &mut ctx, "apple", 1).unwrap();
        assert_eq!(state.player().item_count("apple"), 1);
        assert_eq!(state.location_stock("shop", "apple"), 1);

        drop(&game, &mut state, &mut ctx, "apple", 1).unwrap();
        assert_eq!(state.player().item_count("apple"), 0);
        assert_eq!(state.location_stock("shop", "apple"), 2);

        assert!(take(&game, &mut state, &mut ctx, "apple", 5).is_err());
    }

    #[test]
    fn undroppable_items_stay_put() {
        let (game, mut state, mut ctx) = fixture();
        add(&game, &mut state, &mut ctx, PLAYER_ID, "keepsake", 1);
        assert!(drop(&game, &mut state, &mut ctx, "keepsake", 1).is_err());
        assert_eq!(state.player().item_count("keepsake"), 1);
    }

    #[test]
    fn on_get_fires_once_per_turn() {
        let (game, mut state, mut ctx) = fixture();
        add(&game, &mut state, &mut ctx, PLAYER_ID, "charm_bead", 1);
        assert_eq!(
            state.flags.get("found_bead"),
            Some(&crate::defs::FlagValue::Bool(true))
        );
        // Losing and regaining within the same turn does not refire.
        state.flags.insert("found_bead".into(), false.into());
        remove(&game, &mut state, &mut ctx, PLAYER_ID, "charm_bead", 1);
        add(&game, &mut state, &mut ctx, PLAYER_ID, "charm_bead", 1);
        assert_eq!(
            state.flags.get("found_bead"),
            Some(&crate::defs::FlagValue::Bool(false))
        );
    }

    #[test]
    fn give_requires_colocation_and_permission() {
        let (game, mut state, mut ctx) = fixture();
        add(&game, &mut state, &mut ctx, PLAYER_ID, "keepsake", 1);
        ctx.present = vec![PLAYER_ID.to_string(), "clerk".to_string()];
        assert!(give(&game, &mut state, &mut ctx, PLAYER_ID, "clerk", "keepsake", 1).is_err());

        add(&game, &mut state, &mut ctx, PLAYER_ID, "apple", 1);
        give(&game, &mut state, &mut ctx, PLAYER_ID, "clerk", "apple", 1).unwrap();
        assert_eq!(state.character("clerk").unwrap().item_count("apple"), 6);

        ctx.present = vec![PLAYER_ID.to_string()];
        add(&game, &mut state, &mut ctx, PLAYER_ID, "apple", 1);
        assert!(give(&game, &mut state, &mut ctx, PLAYER_ID, "clerk", "apple", 1).is_err());
    }

    #[test]
    fn purchase_validates_funds_and_stock() {
        let (game, mut state, mut ctx) = fixture();
        purchase(&game, &mut state, &mut ctx, PLAYER_ID, "clerk", "apple", 2, 3.0).unwrap();
        assert_eq!(state.player().item_count("apple"), 2);
        assert_eq!(state.player().meter("money"), 14.0);
        assert_eq!(state.character("clerk").unwrap().meter("money"), 26.0);

        // 14 left, 5 apples at 3 each is 15.
        assert!(
            purchase(&game, &mut state, &mut ctx, PLAYER_ID, "clerk", "apple", 5, 3.0).is_err()
        );
        assert!(
            purchase(&game, &mut state, &mut ctx, PLAYER_ID, "clerk", "apple", 4, 3.0).is_err()
        );
    }

    #[test]
    fn outfit_acquisition_grants_and_returns_members() {
        let (game, mut state, mut ctx) = fixture();
        add(&game, &mut state, &mut ctx, PLAYER_ID, "uniform", 1);
        let player = state.player();
        assert!(player.owned_outfits.contains("uniform"));
        assert!(player.owns_clothing("apron"));
        assert!(player.owns_clothing("clogs"));

        // Removal returns exactly what was granted.
        remove(&game, &mut state, &mut ctx, PLAYER_ID, "uniform", 1);
        let player = state.player();
        assert!(!player.owned_outfits.contains("uniform"));
        assert!(!player.owns_clothing("apron"));
        assert!(!player.owns_clothing("clogs"));
    }

    #[test]
    fn independently_owned_clothing_survives_outfit_removal() {
        let (game, mut state, mut ctx) = fixture();
        add(&game, &mut state, &mut ctx, PLAYER_ID, "apron", 1);
        add(&game, &mut state, &mut ctx, PLAYER_ID, "uniform", 1);
        remove(&game, &mut state, &mut ctx, PLAYER_ID, "uniform", 1);
        let player = state.player();
        assert!(player.owns_clothing("apron"));
        assert!(!player.owns_clothing("clogs"));
    }
}
