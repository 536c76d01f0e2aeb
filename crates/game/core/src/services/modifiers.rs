//! Modifier lifecycle: activation, stacking, duration, clamps.

use tracing::{debug, warn};

use crate::defs::Game;
use crate::effects::apply_batch;
use crate::state::{GameState, ModifierState};
use crate::turn::TurnContext;

/// Apply a modifier to a character and run its entry effects.
///
/// Respects group exclusions: if an already-active modifier excludes this
/// one (or vice versa), the application is skipped with a warning.
pub fn apply(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    target: &str,
    modifier_id: &str,
    duration_min: Option<u32>,
    auto: bool,
) {
    let Some(def) = game.modifier(modifier_id) else {
        warn!(target: "modifiers", modifier = modifier_id, "unknown modifier, skipping");
        return;
    };
    let Some(cs) = state.character(target) else {
        warn!(target: "modifiers", character = target, "unknown character, skipping");
        return;
    };

    if cs.modifiers.contains_key(modifier_id) {
        // Re-application refreshes the duration but not entry effects.
        let remaining = i64::from(duration_min.or(def.duration_default_min).unwrap_or(0));
        if let Some(ms) = state
            .character_mut(target)
            .and_then(|c| c.modifiers.get_mut(modifier_id))
        {
            ms.remaining_min = ms.remaining_min.max(remaining);
        }
        return;
    }

    // Exclusion check within the group.
    for active_id in cs.modifiers.keys() {
        let excluded = def.exclusions.iter().any(|e| e == active_id)
            || game
                .modifier(active_id)
                .map(|other| other.exclusions.iter().any(|e| e == modifier_id))
                .unwrap_or(false);
        if excluded {
            debug!(
                target: "modifiers",
                modifier = modifier_id,
                conflicting = active_id.as_str(),
                "excluded by active modifier"
            );
            return;
        }
    }

    let remaining = i64::from(duration_min.or(def.duration_default_min).unwrap_or(0));
    if let Some(c) = state.character_mut(target) {
        c.modifiers.insert(
            modifier_id.to_string(),
            ModifierState {
                remaining_min: remaining,
                auto,
            },
        );
    }

    let entry = def.entry_effects.clone();
    apply_batch(game, state, ctx, &entry);
}

/// Remove a modifier, running its exit effects first.
pub fn remove(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    target: &str,
    modifier_id: &str,
) {
    let present = state
        .character(target)
        .map(|c| c.modifiers.contains_key(modifier_id))
        .unwrap_or(false);
    if !present {
        return;
    }

    if let Some(def) = game.modifier(modifier_id) {
        let exit = def.exit_effects.clone();
        apply_batch(game, state, ctx, &exit);
    }
    if let Some(c) = state.character_mut(target) {
        c.modifiers.remove(modifier_id);
    }
}

/// Phase 16: evaluate every `when`-bearing modifier for every character.
/// True and inactive → apply; false and auto-applied → remove.
pub fn auto_activate(game: &Game, state: &mut GameState, ctx: &mut TurnContext) {
    let char_ids: Vec<String> = state.characters.keys().cloned().collect();
    for char_id in &char_ids {
        for def in &game.modifiers {
            let Some(when) = &def.when else { continue };
            let holds = ctx.check(game, state, when);
            let active = state
                .character(char_id)
                .map(|c| c.modifiers.contains_key(&def.id))
                .unwrap_or(false);
            if holds && !active {
                apply(game, state, ctx, char_id, &def.id, None, true);
            } else if !holds && active {
                let auto = state
                    .character(char_id)
                    .and_then(|c| c.modifiers.get(&def.id))
                    .map(|m| m.auto)
                    .unwrap_or(false);
                if auto {
                    remove(game, state, ctx, char_id, &def.id);
                }
            }
        }
    }
}

/// Phase 18: tick durations by the minutes that passed this turn. Timed
/// modifiers reaching zero run their exit effects and drop off. A zero
/// recorded duration means "indefinite" and never expires.
pub fn tick(game: &Game, state: &mut GameState, ctx: &mut TurnContext, minutes: u32) {
    if minutes == 0 {
        return;
    }
    let char_ids: Vec<String> = state.characters.keys().cloned().collect();
    for char_id in char_ids {
        let mut expired = Vec::new();
        if let Some(cs) = state.character_mut(&char_id) {
            for (id, ms) in cs.modifiers.iter_mut() {
                if ms.remaining_min <= 0 {
                    continue; // indefinite
                }
                ms.remaining_min -= i64::from(minutes);
                if ms.remaining_min <= 0 {
                    ms.remaining_min = 0;
                    expired.push(id.clone());
                }
            }
        }
        for id in expired {
            remove(game, state, ctx, &char_id, &id);
        }
    }
}

/// Extra clamp range on a meter from the owner's active modifiers.
pub fn clamp_range(game: &Game, state: &GameState, owner: &str, meter: &str) -> (f64, f64) {
    let mut lo = f64::NEG_INFINITY;
    let mut hi = f64::INFINITY;
    if let Some(cs) = state.character(owner) {
        for id in cs.modifiers.keys() {
            if let Some(def) = game.modifier(id)
                && let Some(clamp) = def.clamp_meters.get(meter)
            {
                if let Some(min) = clamp.min {
                    lo = lo.max(min);
                }
                if let Some(max) = clamp.max {
                    hi = hi.min(max);
                }
            }
        }
    }
    (lo, hi)
}

/// Active modifiers as the behavior/appearance layer sees them.
///
/// Within each group the stacking policy decides what is visible: under
/// `highest` only the top-priority member, under `all` every active
/// member. A group containing any `all`-stacking member combines.
/// Ungrouped modifiers always contribute.
pub fn dominant_in_groups<'g>(game: &'g Game, state: &GameState, owner: &str) -> Vec<&'g str> {
    use std::collections::BTreeMap;

    use crate::defs::{ModifierDef, StackingPolicy};

    let Some(cs) = state.character(owner) else {
        return Vec::new();
    };
    let mut groups: BTreeMap<&str, Vec<&'g ModifierDef>> = BTreeMap::new();
    let mut ungrouped = Vec::new();
    for id in cs.modifiers.keys() {
        let Some(def) = game.modifier(id) else { continue };
        match def.group.as_deref() {
            Some(group) => groups.entry(group).or_default().push(def),
            None => ungrouped.push(def.id.as_str()),
        }
    }

    let mut visible = Vec::new();
    for members in groups.values() {
        if members.iter().any(|d| d.stacking == StackingPolicy::All) {
            visible.extend(members.iter().map(|d| d.id.as_str()));
        } else {
            let mut best = members[0];
            for member in &members[1..] {
                if member.priority > best.priority {
                    best = member;
                }
            }
            visible.push(best.id.as_str());
        }
    }
    visible.extend(ungrouped);
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{new_session_state, ModifierState};

    fn game() -> Game {
        serde_json::from_value(serde_json::json!({
            "meta": {"id": "t", "title": "t"},
            "start": {"location": "here", "node": "start"},
            "zones": [{"id": "z", "name": "Z"}],
            "locations": [{"id": "here", "zone": "z", "name": "Here"}],
            "nodes": [{"id": "start", "type": "hub", "title": "Start"}],
            "characters": [{"id": "kate", "name": "Kate"}],
            "modifiers": [
                {"id": "soaked", "group": "weather", "priority": 2},
                {"id": "chilled", "group": "weather", "priority": 1},
                {"id": "glitter", "group": "party", "stacking": "all"},
                {"id": "confetti", "group": "party", "priority": 5},
                {"id": "limping"}
            ]
        }))
        .unwrap()
    }

    fn activate(state: &mut crate::state::GameState, ids: &[&str]) {
        let kate = state.character_mut("kate").unwrap();
        for id in ids {
            kate.modifiers.insert(
                (*id).to_string(),
                ModifierState {
                    remaining_min: 0,
                    auto: false,
                },
            );
        }
    }

    #[test]
    fn highest_policy_keeps_top_priority_per_group() {
        let game = game();
        let mut state = new_session_state(&game, 1);
        activate(&mut state, &["soaked", "chilled", "limping"]);
        let visible = dominant_in_groups(&game, &state, "kate");
        assert!(visible.contains(&"soaked"));
        assert!(!visible.contains(&"chilled"));
        assert!(visible.contains(&"limping"));
    }

    #[test]
    fn all_policy_combines_the_whole_group() {
        let game = game();
        let mut state = new_session_state(&game, 1);
        activate(&mut state, &["glitter", "confetti"]);
        let visible = dominant_in_groups(&game, &state, "kate");
        assert!(visible.contains(&"glitter"));
        assert!(visible.contains(&"confetti"));
    }
}
