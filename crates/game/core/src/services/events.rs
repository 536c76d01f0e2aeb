//! Event pipeline: eligibility, cooldowns, random sampling, firing.

use tracing::debug;

use crate::defs::{EventDef, EventTrigger, Game};
use crate::effects::apply_batch;
use crate::state::GameState;
use crate::turn::TurnContext;

/// Phase 8: fire every eligible scheduled/conditional event and at most
/// one random event. A fired event's `forced_transition` queues a goto
/// and short-circuits the rest of the turn to finalization.
pub fn run(game: &Game, state: &mut GameState, ctx: &mut TurnContext) {
    let mut to_fire: Vec<usize> = Vec::new();
    let mut random_pool: Vec<(usize, f64)> = Vec::new();

    for (idx, event) in game.events.iter().enumerate() {
        if !eligible(state, event) {
            continue;
        }
        match &event.trigger {
            EventTrigger::Conditional { when } => {
                if ctx.check(game, state, when) {
                    to_fire.push(idx);
                }
            }
            EventTrigger::Scheduled { slot, weekday, when } => {
                let slot_ok = slot.as_ref().is_none_or(|wanted| {
                    game.time.slot_at(state.time.minutes).map(|w| &w.id) == Some(wanted)
                });
                let weekday_ok = weekday
                    .as_ref()
                    .is_none_or(|wanted| wanted == game.time.weekday_for(state.time.day));
                let when_ok = when.as_ref().is_none_or(|expr| ctx.check(game, state, expr));
                if slot_ok && weekday_ok && when_ok {
                    to_fire.push(idx);
                }
            }
            EventTrigger::Random { weight, when } => {
                let when_ok = when.as_ref().is_none_or(|expr| ctx.check(game, state, expr));
                if when_ok && ctx.rng.chance(weight / 100.0) {
                    random_pool.push((idx, *weight));
                }
            }
        }
    }

    // Several random events surviving their Bernoulli roll: one fires,
    // chosen by weight.
    if !random_pool.is_empty() {
        let weights: Vec<f64> = random_pool.iter().map(|(_, w)| *w).collect();
        if let Some(winner) = ctx.rng.weighted_index(&weights) {
            to_fire.push(random_pool[winner].0);
        }
    }

    to_fire.sort_unstable();
    for idx in to_fire {
        fire(game, state, ctx, idx);
        if ctx.forced_finalize {
            break;
        }
    }
}

fn eligible(state: &GameState, event: &EventDef) -> bool {
    if state.events_once.contains(&event.id) {
        return false;
    }
    if state.event_cooldowns.get(&event.id).copied().unwrap_or(0) > 0 {
        return false;
    }
    if let Some(location) = &event.location
        && location != &state.location.id
    {
        return false;
    }
    true
}

fn fire(game: &Game, state: &mut GameState, ctx: &mut TurnContext, idx: usize) {
    let event = &game.events[idx];
    debug!(target: "events", event = event.id.as_str(), "event fires");

    let effects = event.effects.clone();
    apply_batch(game, state, ctx, &effects);

    for beat in &event.beats {
        ctx.narrative_parts.push(beat.clone());
    }
    ctx.event_choices.extend(event.choices.iter().cloned());
    ctx.events_fired.push(event.id.clone());

    if event.cooldown_min > 0 {
        state
            .event_cooldowns
            .insert(event.id.clone(), i64::from(event.cooldown_min));
    }
    if event.once_per_game {
        state.events_once.insert(event.id.clone());
    }
    if let Some(node) = &event.forced_transition {
        ctx.pending_goto = Some(node.clone());
        ctx.forced_finalize = true;
    }
}
