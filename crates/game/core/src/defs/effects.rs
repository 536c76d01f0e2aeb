//! The tagged effect variant: one atomic unit of authored state change.
//!
//! An effect batch is an ordered list of [`Effect`]s. Each effect carries an
//! optional `when` guard; `conditional` and `random` are recursive variants
//! expanded in place by the resolver.

use serde::{Deserialize, Serialize};

use super::wardrobe::ClothingState;

/// Arithmetic applied by `meter_change`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterOp {
    Add,
    Subtract,
    Set,
    Multiply,
    Divide,
}

/// Namespaces addressable by `unlock` / `lock`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockCategory {
    Locations,
    Zones,
    Items,
    Clothing,
    Outfits,
    Actions,
    Endings,
}

/// One weighted branch of a `random` effect.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomArm {
    pub weight: f64,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// An authored effect: optional guard plus the concrete kind.
///
/// For `conditional` the guard doubles as the branch selector (`then` on
/// true, `otherwise` on false); every other kind is skipped silently when
/// the guard is false.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Effect {
    #[serde(default)]
    pub when: Option<String>,
    #[serde(flatten)]
    pub kind: EffectKind,
}

impl Effect {
    /// Unguarded effect, mostly for tests and generated batches.
    pub fn of(kind: EffectKind) -> Self {
        Self { when: None, kind }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    MeterChange {
        target: String,
        meter: String,
        op: MeterOp,
        value: f64,
        #[serde(default = "default_true")]
        respect_caps: bool,
        #[serde(default = "default_true")]
        cap_per_turn: bool,
    },
    FlagSet {
        key: String,
        value: super::FlagValue,
    },
    InventoryAdd {
        owner: String,
        item: String,
        #[serde(default = "default_count")]
        count: u32,
    },
    InventoryRemove {
        owner: String,
        item: String,
        #[serde(default = "default_count")]
        count: u32,
    },
    InventoryTake {
        item: String,
        #[serde(default = "default_count")]
        count: u32,
    },
    InventoryDrop {
        item: String,
        #[serde(default = "default_count")]
        count: u32,
    },
    InventoryGive {
        from: String,
        to: String,
        item: String,
        #[serde(default = "default_count")]
        count: u32,
    },
    InventoryPurchase {
        buyer: String,
        seller: String,
        item: String,
        #[serde(default = "default_count")]
        count: u32,
        price: f64,
    },
    InventorySell {
        seller: String,
        buyer: String,
        item: String,
        #[serde(default = "default_count")]
        count: u32,
        price: f64,
    },
    ClothingPutOn {
        owner: String,
        item: String,
    },
    ClothingTakeOff {
        owner: String,
        item: String,
    },
    ClothingState {
        owner: String,
        item: String,
        state: ClothingState,
    },
    ClothingSlotState {
        owner: String,
        slot: String,
        state: ClothingState,
    },
    OutfitPutOn {
        owner: String,
        outfit: String,
    },
    OutfitTakeOff {
        owner: String,
    },
    Move {
        direction: String,
    },
    MoveTo {
        location: String,
    },
    TravelTo {
        location: String,
        #[serde(default)]
        method: Option<String>,
    },
    AdvanceTime {
        minutes: u32,
    },
    AdvanceTimeSlot {
        #[serde(default = "default_count")]
        slots: u32,
    },
    ApplyModifier {
        target: String,
        modifier: String,
        #[serde(default)]
        duration_min: Option<u32>,
    },
    RemoveModifier {
        target: String,
        modifier: String,
    },
    Unlock {
        category: UnlockCategory,
        ids: Vec<String>,
    },
    Lock {
        category: UnlockCategory,
        ids: Vec<String>,
    },
    Goto {
        node: String,
    },
    Conditional {
        #[serde(default)]
        then: Vec<Effect>,
        #[serde(default)]
        otherwise: Vec<Effect>,
    },
    Random {
        choices: Vec<RandomArm>,
    },
    /// Fallback for an unrecognized `type` tag. Content still loads; the
    /// resolver warns and skips the effect without aborting its batch.
    #[serde(other)]
    Unknown,
}

fn default_true() -> bool {
    true
}

fn default_count() -> u32 {
    1
}
