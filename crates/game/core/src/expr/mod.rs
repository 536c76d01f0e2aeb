//! The condition DSL: a safe evaluator over typed game state.
//!
//! No statements, no assignment, no I/O, no user-defined functions. The
//! grammar is LL(1); hard caps bound source length, parse depth, and call
//! arity so authored content cannot blow the evaluator up.
//!
//! Failure policy: unknown paths resolve to a falsey null sentinel;
//! type errors and division by zero make the expression evaluate false;
//! everything is warned once per expression per turn.

mod context;
mod eval;
mod lexer;
mod parser;
mod value;

pub use context::{ActiveGates, EvalContext};
pub use eval::{eval_condition, eval_value};
pub use parser::{parse, Expr, MAX_ARGS, MAX_DEPTH, MAX_SOURCE_LEN};
pub use value::Value;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("syntax error near position {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("expression too long ({len} chars, max {max})")]
    TooLong { len: usize, max: usize },

    #[error("expression too deeply nested (max depth {max})")]
    TooDeep { max: usize },

    #[error("too many call arguments (max {max})")]
    TooManyArgs { max: usize },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("division by zero")]
    DivisionByZero,
}

impl ExprError {
    pub(crate) fn syntax(pos: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            pos,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: String) -> Self {
        Self::TypeError(message)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeSet;

    use super::*;
    use crate::defs::{FlagValue, Game};
    use crate::rng::TurnRng;
    use crate::state::new_session_state;

    fn minimal_game() -> Game {
        serde_json::from_value(serde_json::json!({
            "meta": {"id": "t", "title": "t"},
            "start": {"location": "here", "node": "start"},
            "meters": {"trust": {"min": 0.0, "max": 100.0, "default": 30.0}},
            "flags": {"met": {"default": false}},
            "locations": [{"id": "here", "zone": "z", "name": "Here"}],
            "zones": [{"id": "z", "name": "Z"}],
            "nodes": [{"id": "start", "type": "hub", "title": "Start"}],
            "characters": [{"id": "emma", "name": "Emma"}]
        }))
        .unwrap()
    }

    struct Fixture {
        game: Game,
        state: crate::state::GameState,
        gates: ActiveGates,
        present: Vec<String>,
        rng: TurnRng,
        warned: RefCell<BTreeSet<String>>,
    }

    impl Fixture {
        fn new() -> Self {
            let game = minimal_game();
            let state = new_session_state(&game, 1);
            Self {
                game,
                state,
                gates: ActiveGates::new(),
                present: vec!["emma".into()],
                rng: TurnRng::new(7),
                warned: RefCell::new(BTreeSet::new()),
            }
        }

        fn ctx(&self) -> EvalContext<'_> {
            EvalContext {
                game: &self.game,
                state: &self.state,
                gates: &self.gates,
                present: &self.present,
                rng: &self.rng,
                warned: &self.warned,
            }
        }
    }

    #[test]
    fn resolves_meters_and_flags() {
        let fx = Fixture::new();
        assert_eq!(eval_value("meters.emma.trust", &fx.ctx()), Value::Num(30.0));
        assert_eq!(eval_value("flags.met", &fx.ctx()), Value::Bool(false));
        assert!(eval_condition("meters.emma.trust >= 30", &fx.ctx()));
    }

    #[test]
    fn unknown_path_is_falsey_null() {
        let fx = Fixture::new();
        assert_eq!(eval_value("meters.emma.nope", &fx.ctx()), Value::Null);
        assert!(!eval_condition("meters.emma.nope", &fx.ctx()));
        // Ordering against null is false rather than an error.
        assert!(!eval_condition("meters.emma.nope > 5", &fx.ctx()));
    }

    #[test]
    fn get_supplies_default() {
        let fx = Fixture::new();
        assert_eq!(
            eval_value("get(meters.emma.nope, 12)", &fx.ctx()),
            Value::Num(12.0)
        );
        assert_eq!(
            eval_value("get(\"meters.emma.trust\", 0)", &fx.ctx()),
            Value::Num(30.0)
        );
    }

    #[test]
    fn division_by_zero_is_false() {
        let fx = Fixture::new();
        assert!(!eval_condition("10 / 0", &fx.ctx()));
        assert_eq!(eval_value("10 / 0", &fx.ctx()), Value::Null);
    }

    #[test]
    fn in_and_npc_present() {
        let fx = Fixture::new();
        assert!(eval_condition("\"emma\" in present", &fx.ctx()));
        assert!(eval_condition("npc_present(\"emma\")", &fx.ctx()));
        assert!(!eval_condition("npc_present(\"kate\")", &fx.ctx()));
    }

    #[test]
    fn rand_is_deterministic_within_turn() {
        let a = Fixture::new();
        let b = Fixture::new();
        let seq_a: Vec<bool> = (0..16)
            .map(|_| eval_condition("rand(0.5)", &a.ctx()))
            .collect();
        let seq_b: Vec<bool> = (0..16)
            .map(|_| eval_condition("rand(0.5)", &b.ctx()))
            .collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn short_circuit_skips_rhs() {
        let fx = Fixture::new();
        // rhs would be a type error; short-circuit avoids evaluating it.
        assert!(!eval_condition("false and (1 / 0)", &fx.ctx()));
        assert!(eval_condition("true or (1 / 0)", &fx.ctx()));
    }

    #[test]
    fn builtins() {
        let fx = Fixture::new();
        assert_eq!(eval_value("min(3, 5)", &fx.ctx()), Value::Num(3.0));
        assert_eq!(eval_value("max(3, 5)", &fx.ctx()), Value::Num(5.0));
        assert_eq!(eval_value("abs(0 - 4)", &fx.ctx()), Value::Num(4.0));
        assert_eq!(eval_value("clamp(12, 0, 10)", &fx.ctx()), Value::Num(10.0));
    }

    #[test]
    fn flag_value_conversion() {
        assert_eq!(Value::from(&FlagValue::Bool(true)), Value::Bool(true));
        assert_eq!(Value::from(&FlagValue::Number(2.0)), Value::Num(2.0));
    }
}
