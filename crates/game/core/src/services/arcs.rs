//! Arc stage advancement.

use tracing::debug;

use crate::defs::Game;
use crate::effects::apply_batch;
use crate::state::GameState;
use crate::turn::TurnContext;

/// Chained advancements allowed for one arc in one turn.
const MAX_HOPS: usize = 4;

/// Phase 19: for each arc, advance while the next stage's condition holds
/// (bounded), running `on_advance` of the stage being left and `on_enter`
/// of the stage being entered. Milestones are reported as `arc:stage`.
pub fn process(game: &Game, state: &mut GameState, ctx: &mut TurnContext) {
    for arc in &game.arcs {
        for _ in 0..MAX_HOPS {
            let current_idx = state.arc_progress.get(&arc.id).copied().unwrap_or(0);
            let Some(next) = arc.stage(current_idx + 1) else {
                break;
            };
            let Some(condition) = &next.advance_when else {
                break;
            };
            if !ctx.check(game, state, condition) {
                break;
            }

            debug!(target: "arcs", arc = arc.id.as_str(), stage = next.id.as_str(), "arc advances");

            if let Some(current) = arc.stage(current_idx) {
                let on_advance = current.on_advance.clone();
                apply_batch(game, state, ctx, &on_advance);
            }
            let on_enter = next.on_enter.clone();
            apply_batch(game, state, ctx, &on_enter);

            state.arc_progress.insert(arc.id.clone(), current_idx + 1);
            state
                .arc_history
                .entry(arc.id.clone())
                .or_default()
                .push(next.id.clone());
            ctx.milestones_reached
                .push(format!("{}:{}", arc.id, next.id));
        }
    }
}
