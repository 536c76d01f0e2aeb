//! Phase 20: compose the next turn's choice list.

use crate::defs::{ChoiceDef, Game};
use crate::state::GameState;
use crate::turn::{ChoiceItem, ChoiceSource, TurnContext};

/// Build the deterministic choice list: node choices, dynamic choices,
/// unlocked actions, movement buttons, then event-injected choices.
/// Duplicate ids keep their first (highest-precedence) occurrence.
pub fn build(game: &Game, state: &GameState, ctx: &mut TurnContext) {
    let mut items: Vec<ChoiceItem> = Vec::new();

    if let Some(node) = game.node(&state.current_node) {
        for choice in &node.choices {
            push_choice(game, state, ctx, &mut items, choice, ChoiceSource::Node);
        }
        for choice in &node.dynamic_choices {
            push_choice(game, state, ctx, &mut items, choice, ChoiceSource::Dynamic);
        }
    }

    for action_id in &state.unlocked_actions {
        let Some(action) = game.action(action_id) else {
            continue;
        };
        if state.locked.actions.contains(action_id) {
            continue;
        }
        let enabled = action
            .conditions
            .as_ref()
            .is_none_or(|expr| ctx.check(game, state, expr));
        if enabled {
            items.push(ChoiceItem {
                id: action.id.clone(),
                prompt: action.prompt.clone(),
                enabled: true,
                disabled_reason: None,
                source: ChoiceSource::Action,
            });
        }
    }

    movement_buttons(game, state, &mut items);

    let event_choices: Vec<ChoiceDef> = ctx.event_choices.clone();
    for choice in &event_choices {
        push_choice(game, state, ctx, &mut items, choice, ChoiceSource::Event);
    }

    // First occurrence wins; precedence is the insertion order above.
    let mut seen = std::collections::BTreeSet::new();
    items.retain(|item| seen.insert(item.id.clone()));

    ctx.choices = items;
}

fn push_choice(
    game: &Game,
    state: &GameState,
    ctx: &TurnContext,
    items: &mut Vec<ChoiceItem>,
    choice: &ChoiceDef,
    source: ChoiceSource,
) {
    let passes = choice
        .conditions
        .as_ref()
        .is_none_or(|expr| ctx.check(game, state, expr));
    if passes {
        items.push(ChoiceItem {
            id: choice.id.clone(),
            prompt: choice.prompt.clone(),
            enabled: true,
            disabled_reason: None,
            source,
        });
    } else if let Some(reason) = &choice.disabled_reason {
        items.push(ChoiceItem {
            id: choice.id.clone(),
            prompt: choice.prompt.clone(),
            enabled: false,
            disabled_reason: Some(reason.clone()),
            source,
        });
    }
}

fn movement_buttons(game: &Game, state: &GameState, items: &mut Vec<ChoiceItem>) {
    let Some(here) = game.location(&state.location.id) else {
        return;
    };

    for conn in &here.connections {
        let Some(dest) = game.location(&conn.to) else {
            continue;
        };
        if !state.discovered_locations.contains(&conn.to) && dest.discovery_conditions.is_none() {
            continue;
        }
        items.push(ChoiceItem {
            id: format!("move_{}", conn.direction),
            prompt: format!("Go {} to {}", conn.direction, dest.name),
            enabled: !state.locked.locations.contains(&conn.to),
            disabled_reason: state
                .locked
                .locations
                .contains(&conn.to)
                .then(|| "That way is closed.".to_string()),
            source: ChoiceSource::Movement,
        });
    }

    // Zone travel buttons to discovered zones with a usable link.
    for link in &game.movement.travel.connections {
        let other = if link.from == state.location.zone {
            Some(&link.to)
        } else if link.to == state.location.zone {
            Some(&link.from)
        } else {
            None
        };
        let Some(other) = other else { continue };
        if !state.discovered_zones.contains(other) || state.locked.zones.contains(other) {
            continue;
        }
        if let Some(zone) = game.zone(other) {
            items.push(ChoiceItem {
                id: format!("travel_{other}"),
                prompt: format!("Travel to {}", zone.name),
                enabled: true,
                disabled_reason: None,
                source: ChoiceSource::Movement,
            });
        }
    }
}
