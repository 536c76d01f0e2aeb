//! Node transitions and entry/exit effect sequencing.

use tracing::{debug, warn};

use crate::defs::Game;
use crate::effects::apply_batch;
use crate::state::GameState;
use crate::turn::TurnContext;

/// Phase 6: run the current node's entry effects if this visit hasn't run
/// them yet (covers the session's start node, which is never "entered"
/// through a transition).
pub fn run_pending_entry_effects(game: &Game, state: &mut GameState, ctx: &mut TurnContext) {
    if state.node_entered {
        return;
    }
    let node_id = state.current_node.clone();
    let Some(node) = game.node(&node_id) else {
        return;
    };
    let first_visit = state.visited_nodes.insert(node_id.clone());
    state.node_entered = true;
    if node.once && !first_visit {
        return;
    }
    let entry = node.entry_effects.clone();
    apply_batch(game, state, ctx, &entry);
}

/// Phase 15: resolve the turn's node transition.
///
/// A queued goto wins; otherwise the current node's authored transitions
/// are scanned top to bottom for the first true `when`. Changing nodes
/// runs old exit effects then new entry effects (unless suppressed for
/// deterministic actions) and resets the visit clock.
pub fn resolve_transitions(game: &Game, state: &mut GameState, ctx: &mut TurnContext) {
    let target = match ctx.pending_goto.take() {
        Some(node) => Some(node),
        None => authored_transition(game, state, ctx),
    };

    let Some(target) = target else {
        return;
    };
    if target == state.current_node {
        return;
    }
    let Some(node) = game.node(&target) else {
        warn!(target: "nodes", node = target.as_str(), "transition to unknown node dropped");
        return;
    };
    if let Some(preconditions) = &node.preconditions
        && !ctx.check(game, state, preconditions)
    {
        warn!(target: "nodes", node = target.as_str(), "transition blocked by preconditions");
        return;
    }

    change_node(game, state, ctx, &target);
}

fn authored_transition(game: &Game, state: &GameState, ctx: &TurnContext) -> Option<String> {
    let node = game.node(&state.current_node)?;
    node.transitions
        .iter()
        .find(|t| ctx.check(game, state, &t.when))
        .map(|t| t.to.clone())
}

pub fn change_node(game: &Game, state: &mut GameState, ctx: &mut TurnContext, target: &str) {
    debug!(
        target: "nodes",
        from = state.current_node.as_str(),
        to = target,
        "node transition"
    );

    if !ctx.skip_node_effects
        && let Some(old) = game.node(&state.current_node)
    {
        let exit = old.exit_effects.clone();
        apply_batch(game, state, ctx, &exit);
    }

    state.current_node = target.to_string();
    state.time_in_node = 0;
    state.node_entered = true;

    let Some(new) = game.node(target) else {
        return;
    };
    let first_visit = state.visited_nodes.insert(target.to_string());
    if ctx.skip_node_effects || (new.once && !first_visit) {
        return;
    }
    let entry = new.entry_effects.clone();
    apply_batch(game, state, ctx, &entry);
}
