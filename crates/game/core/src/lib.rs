//! PlotPlay core: the deterministic heart of the turn pipeline.
//!
//! This crate is pure and synchronous: definitions, mutable state, the
//! condition DSL, the effect resolver, and every deterministic service
//! (inventory, clothing, movement, time, modifiers, presence, gates,
//! events, arcs, nodes, choices, summaries). The async runtime crate
//! layers session workers and the Writer/Checker AI contract on top.

pub mod action;
pub mod defs;
pub mod effects;
pub mod error;
pub mod expr;
pub mod rng;
pub mod services;
pub mod state;
pub mod turn;

pub use action::{ActionType, PlayerAction};
pub use defs::{Effect, EffectKind, Game, PLAYER_ID};
pub use error::StateError;
pub use expr::{ActiveGates, EvalContext, Value};
pub use rng::TurnRng;
pub use services::summary::StateSummary;
pub use state::{new_session_state, CharacterMemory, CharacterState, GameState};
pub use turn::{ChoiceItem, ChoiceSource, TurnContext};
