//! Minute-accurate clock advancement and time-cost resolution.

use crate::defs::{Game, NodeDef, MINUTES_PER_DAY};
use crate::state::GameState;
use crate::turn::TurnContext;

/// Outcome of a clock advance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeAdvance {
    pub day_advanced: bool,
    pub slot_advanced: bool,
    pub minutes_passed: u32,
}

/// Count absolute minutes `t` in `(old, new]` with `t ≡ boundary (mod 1440)`.
fn boundaries_crossed(old_abs: i64, new_abs: i64, boundary: i64) -> i64 {
    ((new_abs - boundary).div_euclid(i64::from(MINUTES_PER_DAY)))
        - ((old_abs - boundary).div_euclid(i64::from(MINUTES_PER_DAY)))
}

/// Advance the clock, apply meter decay on rollovers, and tick event
/// cooldowns. Modifier durations are NOT ticked here; the orchestrator
/// ticks them once per turn with the accumulated minutes.
pub fn advance(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    minutes: u32,
) -> TimeAdvance {
    if minutes == 0 {
        return TimeAdvance::default();
    }

    let old_abs =
        i64::from(state.time.day) * i64::from(MINUTES_PER_DAY) + i64::from(state.time.minutes);
    let days = state.time.advance(minutes);
    let new_abs = old_abs + i64::from(minutes);

    // Slot boundaries are the window starts.
    let mut slot_crossings: i64 = 0;
    for window in &game.time.slot_windows {
        slot_crossings += boundaries_crossed(old_abs, new_abs, i64::from(window.start));
    }

    apply_decay(game, state, i64::from(days), slot_crossings);

    for remaining in state.event_cooldowns.values_mut() {
        *remaining = (*remaining - i64::from(minutes)).max(0);
    }

    ctx.minutes_elapsed += minutes;

    TimeAdvance {
        day_advanced: days > 0,
        slot_advanced: slot_crossings > 0,
        minutes_passed: minutes,
    }
}

fn apply_decay(game: &Game, state: &mut GameState, days: i64, slots: i64) {
    if days == 0 && slots == 0 {
        return;
    }
    let char_ids: Vec<String> = state.characters.keys().cloned().collect();
    for char_id in char_ids {
        let meter_ids: Vec<String> = state.characters[&char_id].meters.keys().cloned().collect();
        for meter_id in meter_ids {
            let Some(def) = game.meter(&char_id, &meter_id) else {
                continue;
            };
            let delta = def.decay_per_day * days as f64 + def.decay_per_slot * slots as f64;
            if delta == 0.0 {
                continue;
            }
            if let Some(cs) = state.characters.get_mut(&char_id)
                && let Some(value) = cs.meters.get_mut(&meter_id)
            {
                *value = def.clamp(*value + delta);
            }
        }
    }
}

/// Advance to the end of the current slot, then `slots - 1` further slot
/// lengths. With no slot windows configured this is a no-op.
pub fn advance_slots(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    slots: u32,
) -> TimeAdvance {
    if slots == 0 || game.time.slot_windows.is_empty() {
        return TimeAdvance::default();
    }
    let mut total = match game.time.slot_at(state.time.minutes) {
        Some(w) => w.minutes_until_end(state.time.minutes),
        None => return TimeAdvance::default(),
    };
    // Walk forward through subsequent windows for the remaining slots.
    let mut cursor = (state.time.minutes + total) % MINUTES_PER_DAY;
    for _ in 1..slots {
        let Some(w) = game.time.slot_at(cursor) else {
            break;
        };
        let step = w.minutes_until_end(cursor);
        total += step;
        cursor = (cursor + step) % MINUTES_PER_DAY;
    }
    advance(game, state, ctx, total)
}

/// Resolve the time cost of the turn's action (spec §4.7 ordering) and
/// record it on the context for phase 18.
///
/// `kind` is the action-type name; `explicit_minutes`/`category` come from
/// the selected choice or unlocked action. Explicit minutes bypass the
/// per-visit cap; conversation-kind defaults are capped cumulatively per
/// node visit.
pub fn resolve_action_cost(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    node: Option<&NodeDef>,
    kind: &str,
    explicit_minutes: Option<u32>,
    category: Option<&str>,
) {
    if let Some(minutes) = explicit_minutes {
        ctx.time_advance_minutes = minutes;
        return;
    }

    let from_category = |name: &str| game.time.categories.get(name).copied();

    let mut minutes = None;
    if let Some(name) = category {
        minutes = from_category(name);
        ctx.resolved_time_category = Some(name.to_string());
    }
    if minutes.is_none()
        && let Some(behavior) = node.and_then(|n| n.time_behavior.as_ref())
        && let Some(name) = behavior.kinds.get(kind)
    {
        minutes = from_category(name);
        ctx.resolved_time_category = Some(name.clone());
    }
    if minutes.is_none() {
        minutes = game.time.defaults.kinds.get(kind).copied();
    }
    let mut minutes = minutes.unwrap_or(game.time.defaults.default);

    // Conversation-style kinds share a cumulative cap per node visit so
    // that idling in a scene cannot burn unbounded clock.
    let capped_kind = matches!(kind, "say" | "do" | "choice");
    if capped_kind {
        let cap = node
            .and_then(|n| n.time_behavior.as_ref())
            .and_then(|b| b.cap_per_visit)
            .or(game.time.defaults.cap_per_visit);
        if let Some(cap) = cap {
            let allowed = cap.saturating_sub(state.time_in_node);
            minutes = minutes.min(allowed);
        }
        state.time_in_node += minutes;
    }

    ctx.time_advance_minutes = minutes;
}
