//! Per-character gate truth table, recomputed every turn.

use std::collections::BTreeMap;

use crate::defs::Game;
use crate::expr::ActiveGates;
use crate::state::GameState;
use crate::turn::TurnContext;

/// Evaluate every defined gate into `ctx.active_gates`, then apply
/// modifier safety clamps. Gates are evaluated against an empty gate
/// table: a gate expression must not read another gate's fresh value
/// mid-evaluation (no stale reads, no ordering dependence).
pub fn evaluate(game: &Game, state: &GameState, ctx: &mut TurnContext) {
    let mut table = ActiveGates::new();

    {
        let blank = ActiveGates::new();
        let scratch = TurnContextGateView {
            ctx: &*ctx,
            gates: &blank,
        };
        for character in &game.characters {
            if character.gates.is_empty() {
                continue;
            }
            let mut row = BTreeMap::new();
            for gate in &character.gates {
                let mut open = false;
                if let Some(when) = &gate.when {
                    open = scratch.check(game, state, when);
                }
                if !open && !gate.when_any.is_empty() {
                    open = gate
                        .when_any
                        .iter()
                        .any(|expr| scratch.check(game, state, expr));
                }
                if !open && !gate.when_all.is_empty() {
                    open = gate
                        .when_all
                        .iter()
                        .all(|expr| scratch.check(game, state, expr));
                }
                row.insert(gate.id.clone(), open);
            }
            table.insert(character.id.clone(), row);
        }
    }

    // Modifier safety clamps override evaluation results. All allows are
    // applied before any disallow so that disallow wins regardless of
    // which modifier contributed it.
    for (char_id, cs) in &state.characters {
        let defs: Vec<_> = cs
            .modifiers
            .keys()
            .filter_map(|id| game.modifier(id))
            .collect();
        if defs.is_empty() {
            continue;
        }
        let row = table.entry(char_id.clone()).or_default();
        for def in &defs {
            for gate in &def.safety.allow_gates {
                row.insert(gate.clone(), true);
            }
        }
        for def in &defs {
            for gate in &def.safety.disallow_gates {
                row.insert(gate.clone(), false);
            }
        }
    }

    ctx.active_gates = table;
}

/// Evaluation view that substitutes an empty gate table while gates are
/// being recomputed.
struct TurnContextGateView<'a> {
    ctx: &'a TurnContext,
    gates: &'a ActiveGates,
}

impl TurnContextGateView<'_> {
    fn check(&self, game: &Game, state: &GameState, expr: &str) -> bool {
        let eval_ctx = crate::expr::EvalContext {
            game,
            state,
            gates: self.gates,
            present: &self.ctx.present,
            rng: &self.ctx.rng,
            warned: &self.ctx.warned,
        };
        crate::expr::eval_condition(expr, &eval_ctx)
    }
}
