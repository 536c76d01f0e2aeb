//! The effect resolver: ordered application of authored effect batches.
//!
//! Effects execute in the order supplied; `conditional` and `random`
//! expand in place; a failing effect is logged (or surfaced as a refusal
//! line) and skipped, never aborting the batch. A `goto` queues a pending
//! node transition for phase 15 rather than interrupting the batch.

use tracing::warn;

use crate::defs::{Effect, EffectKind, Game, MeterOp, UnlockCategory};
use crate::services::{clothing, inventory, modifiers, movement, time};
use crate::state::GameState;
use crate::turn::{TurnContext, MAX_EFFECT_DEPTH};

/// Apply a batch of effects in order.
pub fn apply_batch(game: &Game, state: &mut GameState, ctx: &mut TurnContext, effects: &[Effect]) {
    if effects.is_empty() {
        return;
    }
    if ctx.effect_depth >= MAX_EFFECT_DEPTH {
        warn!(target: "effects", "effect recursion exceeds depth cap, batch dropped");
        return;
    }
    ctx.effect_depth += 1;
    for effect in effects {
        apply_one(game, state, ctx, effect);
    }
    ctx.effect_depth -= 1;
}

fn apply_one(game: &Game, state: &mut GameState, ctx: &mut TurnContext, effect: &Effect) {
    // `conditional` consumes the guard itself: it selects the branch.
    if let EffectKind::Conditional { then, otherwise } = &effect.kind {
        let branch = match &effect.when {
            Some(expr) => ctx.check(game, state, expr),
            None => true,
        };
        let chosen = if branch { then } else { otherwise };
        let chosen = chosen.clone();
        apply_batch(game, state, ctx, &chosen);
        return;
    }

    if let Some(expr) = &effect.when
        && !ctx.check(game, state, expr)
    {
        return;
    }

    match &effect.kind {
        EffectKind::Conditional { .. } => unreachable!("handled above"),

        EffectKind::MeterChange {
            target,
            meter,
            op,
            value,
            respect_caps,
            cap_per_turn,
        } => meter_change(
            game,
            state,
            ctx,
            target,
            meter,
            *op,
            *value,
            *respect_caps,
            *cap_per_turn,
        ),

        EffectKind::FlagSet { key, value } => {
            if let Some(def) = game.flags.get(key) {
                if !def.accepts(value) {
                    warn!(
                        target: "effects",
                        flag = key.as_str(),
                        "flag value rejected by definition, skipping"
                    );
                    return;
                }
            }
            state.flags.insert(key.clone(), value.clone());
        }

        EffectKind::InventoryAdd { owner, item, count } => {
            inventory::add(game, state, ctx, owner, item, *count);
        }
        EffectKind::InventoryRemove { owner, item, count } => {
            inventory::remove(game, state, ctx, owner, item, *count);
        }
        EffectKind::InventoryTake { item, count } => {
            if let Err(refusal) = inventory::take(game, state, ctx, item, *count) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::InventoryDrop { item, count } => {
            if let Err(refusal) = inventory::drop(game, state, ctx, item, *count) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::InventoryGive {
            from,
            to,
            item,
            count,
        } => {
            if let Err(refusal) = inventory::give(game, state, ctx, from, to, item, *count) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::InventoryPurchase {
            buyer,
            seller,
            item,
            count,
            price,
        } => {
            if let Err(refusal) =
                inventory::purchase(game, state, ctx, buyer, seller, item, *count, *price)
            {
                ctx.refuse(refusal);
            }
        }
        EffectKind::InventorySell {
            seller,
            buyer,
            item,
            count,
            price,
        } => {
            if let Err(refusal) =
                inventory::sell(game, state, ctx, seller, buyer, item, *count, *price)
            {
                ctx.refuse(refusal);
            }
        }

        EffectKind::ClothingPutOn { owner, item } => {
            if let Err(refusal) = clothing::put_on(game, state, ctx, owner, item) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::ClothingTakeOff { owner, item } => {
            if let Err(refusal) = clothing::take_off(game, state, ctx, owner, item) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::ClothingState {
            owner,
            item,
            state: target_state,
        } => {
            if let Err(refusal) =
                clothing::set_item_state(game, state, ctx, owner, item, *target_state)
            {
                ctx.refuse(refusal);
            }
        }
        EffectKind::ClothingSlotState {
            owner,
            slot,
            state: target_state,
        } => {
            if let Err(refusal) =
                clothing::set_slot_state(game, state, ctx, owner, slot, *target_state)
            {
                ctx.refuse(refusal);
            }
        }
        EffectKind::OutfitPutOn { owner, outfit } => {
            if let Err(refusal) = clothing::outfit_put_on(game, state, ctx, owner, outfit) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::OutfitTakeOff { owner } => {
            clothing::outfit_take_off(state, owner);
        }

        EffectKind::Move { direction } => {
            if let Err(refusal) = movement::move_direction(game, state, ctx, direction, &[]) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::MoveTo { location } => {
            if let Err(refusal) = movement::goto_location(game, state, ctx, location, &[]) {
                ctx.refuse(refusal);
            }
        }
        EffectKind::TravelTo { location, method } => {
            if let Err(refusal) =
                movement::travel(game, state, ctx, location, method.as_deref(), &[])
            {
                ctx.refuse(refusal);
            }
        }

        EffectKind::AdvanceTime { minutes } => {
            time::advance(game, state, ctx, *minutes);
        }
        EffectKind::AdvanceTimeSlot { slots } => {
            time::advance_slots(game, state, ctx, *slots);
        }

        EffectKind::ApplyModifier {
            target,
            modifier,
            duration_min,
        } => {
            modifiers::apply(game, state, ctx, target, modifier, *duration_min, false);
        }
        EffectKind::RemoveModifier { target, modifier } => {
            modifiers::remove(game, state, ctx, target, modifier);
        }

        EffectKind::Unlock { category, ids } => unlock(state, *category, ids, true),
        EffectKind::Lock { category, ids } => unlock(state, *category, ids, false),

        EffectKind::Goto { node } => {
            if game.node(node).is_none() {
                warn!(target: "effects", node = node.as_str(), "goto to unknown node, skipping");
                return;
            }
            ctx.pending_goto = Some(node.clone());
        }

        EffectKind::Random { choices } => {
            let weights: Vec<f64> = choices.iter().map(|c| c.weight).collect();
            if let Some(idx) = ctx.rng.weighted_index(&weights) {
                let arm = choices[idx].effects.clone();
                apply_batch(game, state, ctx, &arm);
            }
        }

        EffectKind::Unknown => {
            warn!(target: "effects", "unknown effect kind, skipping");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn meter_change(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    target: &str,
    meter: &str,
    op: MeterOp,
    value: f64,
    respect_caps: bool,
    cap_per_turn: bool,
) {
    let Some(def) = game.meter(target, meter) else {
        warn!(target: "effects", owner = target, meter, "unknown meter, skipping");
        return;
    };
    let current = match state.character(target) {
        Some(cs) => cs.meter(meter),
        None => {
            warn!(target: "effects", owner = target, "unknown character, skipping");
            return;
        }
    };

    let mut next = match op {
        MeterOp::Add => current + value,
        MeterOp::Subtract => current - value,
        MeterOp::Set => value,
        MeterOp::Multiply => current * value,
        MeterOp::Divide => {
            if value == 0.0 {
                warn!(target: "effects", meter, "meter division by zero, no-op");
                return;
            }
            current / value
        }
    };

    if respect_caps {
        next = def.clamp(next);
        let (lo, hi) = modifiers::clamp_range(game, state, target, meter);
        next = next.clamp(lo.max(def.min), hi.min(def.max));
    }

    if cap_per_turn && let Some(cap) = def.delta_cap_per_turn {
        let key = format!("{target}:{meter}");
        let prior = ctx.meter_deltas.get(&key).copied().unwrap_or(0.0);
        let proposed = next - current;
        let capped_total = (prior + proposed).clamp(-cap, cap);
        next = current + (capped_total - prior);
        if respect_caps {
            next = def.clamp(next);
        }
        ctx.meter_deltas.insert(key, prior + (next - current));
    }

    if let Some(cs) = state.character_mut(target) {
        cs.meters.insert(meter.to_string(), next);
    }
}

fn unlock(state: &mut GameState, category: UnlockCategory, ids: &[String], unlocking: bool) {
    for id in ids {
        if unlocking {
            state.locked.set_for(category).remove(id);
            match category {
                UnlockCategory::Actions => {
                    state.unlocked_actions.insert(id.clone());
                }
                UnlockCategory::Endings => {
                    state.unlocked_endings.insert(id.clone());
                }
                _ => {}
            }
        } else {
            state.locked.set_for(category).insert(id.clone());
        }
    }
}
