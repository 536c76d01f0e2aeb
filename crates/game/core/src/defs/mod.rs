//! Immutable game-package definitions.
//!
//! Everything in this module is authored content: loaded once (by the
//! external package loader), validated, and then shared read-only across
//! the session. Mutable per-session data lives in [`crate::state`].

mod actions;
mod arcs;
mod character;
mod effects;
mod events;
mod game;
mod items;
mod meters;
mod modifiers;
mod nodes;
mod time;
mod wardrobe;
mod world;

pub use actions::ActionDef;
pub use arcs::{ArcDef, StageDef};
pub use character::{CharacterDef, GateDef, ScheduleRule};
pub use effects::{Effect, EffectKind, MeterOp, RandomArm, UnlockCategory};
pub use events::{EventDef, EventTrigger};
pub use game::{EconomyConfig, Game, GameMeta, NarrationConfig, StartConfig};
pub use items::ItemDef;
pub use meters::{FlagDef, FlagValue, MeterDef};
pub use modifiers::{MeterClamp, ModifierDef, ModifierSafety, StackingPolicy};
pub use nodes::{ChoiceDef, NodeDef, NodeType, TimeBehavior, TransitionDef};
pub use time::{SlotWindow, TimeConfig, TimeDefaults, MINUTES_PER_DAY};
pub use wardrobe::{ClothingItemDef, ClothingState, OutfitDef, WardrobeConfig};
pub use world::{
    ConnectionDef, LocalMovement, LocationDef, MovementConfig, Privacy, TravelConfig,
    TravelMethodDef, ZoneConnectionDef, ZoneDef,
};

/// Character id of the player. The player is an ordinary character with a
/// reserved id.
pub const PLAYER_ID: &str = "player";
