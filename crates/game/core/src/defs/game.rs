//! The validated game package and its id→definition indexes.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::{
    ActionDef, ArcDef, CharacterDef, ClothingItemDef, EventDef, FlagDef, ItemDef, LocationDef,
    MeterDef, ModifierDef, MovementConfig, NodeDef, OutfitDef, TimeConfig, WardrobeConfig, ZoneDef,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GameMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// Narrative voice configuration handed to the Writer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default = "default_pov")]
    pub pov: String,
    #[serde(default = "default_tense")]
    pub tense: String,
    /// Paragraph budget per turn.
    #[serde(default = "default_paragraphs")]
    pub paragraphs: u32,
}

fn default_pov() -> String {
    "second".into()
}

fn default_tense() -> String {
    "present".into()
}

fn default_paragraphs() -> u32 {
    2
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            pov: default_pov(),
            tense: default_tense(),
            paragraphs: default_paragraphs(),
        }
    }
}

/// Where and when a session begins.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StartConfig {
    pub location: String,
    pub node: String,
    #[serde(default = "default_day")]
    pub day: u32,
    /// Minutes of day at session start.
    #[serde(default)]
    pub minutes: u32,
}

fn default_day() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EconomyConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Player meter used as the money balance.
    #[serde(default = "default_money_meter")]
    pub money_meter: String,
}

fn default_currency() -> String {
    "coins".into()
}

fn default_money_meter() -> String {
    "money".into()
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            money_meter: default_money_meter(),
        }
    }
}

/// Lazily-built id→index maps over the definition vectors.
#[derive(Debug, Default)]
struct GameIndex {
    characters: BTreeMap<String, usize>,
    zones: BTreeMap<String, usize>,
    locations: BTreeMap<String, usize>,
    items: BTreeMap<String, usize>,
    clothing: BTreeMap<String, usize>,
    outfits: BTreeMap<String, usize>,
    modifiers: BTreeMap<String, usize>,
    nodes: BTreeMap<String, usize>,
    events: BTreeMap<String, usize>,
    arcs: BTreeMap<String, usize>,
    actions: BTreeMap<String, usize>,
}

fn index_of<T>(defs: &[T], id_of: impl Fn(&T) -> &str) -> BTreeMap<String, usize> {
    defs.iter()
        .enumerate()
        .map(|(i, d)| (id_of(d).to_string(), i))
        .collect()
}

/// A complete, validated game definition.
///
/// Cross-reference integrity is the validator's job; lookups here return
/// `Option` so the runtime can log and skip unknown ids defensively.
#[derive(Debug, Serialize, Deserialize)]
pub struct Game {
    pub meta: GameMeta,
    #[serde(default)]
    pub narration: NarrationConfig,
    pub start: StartConfig,
    #[serde(default)]
    pub meters: BTreeMap<String, MeterDef>,
    #[serde(default)]
    pub flags: BTreeMap<String, FlagDef>,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub wardrobe: WardrobeConfig,
    #[serde(default)]
    pub characters: Vec<CharacterDef>,
    #[serde(default)]
    pub zones: Vec<ZoneDef>,
    #[serde(default)]
    pub locations: Vec<LocationDef>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub outfits: Vec<OutfitDef>,
    #[serde(default)]
    pub clothing_items: Vec<ClothingItemDef>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub events: Vec<EventDef>,
    #[serde(default)]
    pub arcs: Vec<ArcDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(skip)]
    index: OnceLock<GameIndex>,
}

impl Game {
    fn idx(&self) -> &GameIndex {
        self.index.get_or_init(|| GameIndex {
            characters: index_of(&self.characters, |d| &d.id),
            zones: index_of(&self.zones, |d| &d.id),
            locations: index_of(&self.locations, |d| &d.id),
            items: index_of(&self.items, |d| &d.id),
            clothing: index_of(&self.clothing_items, |d| &d.id),
            outfits: index_of(&self.outfits, |d| &d.id),
            modifiers: index_of(&self.modifiers, |d| &d.id),
            nodes: index_of(&self.nodes, |d| &d.id),
            events: index_of(&self.events, |d| &d.id),
            arcs: index_of(&self.arcs, |d| &d.id),
            actions: index_of(&self.actions, |d| &d.id),
        })
    }

    pub fn character(&self, id: &str) -> Option<&CharacterDef> {
        self.idx().characters.get(id).map(|&i| &self.characters[i])
    }

    pub fn zone(&self, id: &str) -> Option<&ZoneDef> {
        self.idx().zones.get(id).map(|&i| &self.zones[i])
    }

    pub fn location(&self, id: &str) -> Option<&LocationDef> {
        self.idx().locations.get(id).map(|&i| &self.locations[i])
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.idx().items.get(id).map(|&i| &self.items[i])
    }

    pub fn clothing_item(&self, id: &str) -> Option<&ClothingItemDef> {
        self.idx().clothing.get(id).map(|&i| &self.clothing_items[i])
    }

    pub fn outfit(&self, id: &str) -> Option<&OutfitDef> {
        self.idx().outfits.get(id).map(|&i| &self.outfits[i])
    }

    pub fn modifier(&self, id: &str) -> Option<&ModifierDef> {
        self.idx().modifiers.get(id).map(|&i| &self.modifiers[i])
    }

    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.idx().nodes.get(id).map(|&i| &self.nodes[i])
    }

    pub fn event(&self, id: &str) -> Option<&EventDef> {
        self.idx().events.get(id).map(|&i| &self.events[i])
    }

    pub fn arc(&self, id: &str) -> Option<&ArcDef> {
        self.idx().arcs.get(id).map(|&i| &self.arcs[i])
    }

    pub fn action(&self, id: &str) -> Option<&ActionDef> {
        self.idx().actions.get(id).map(|&i| &self.actions[i])
    }

    /// Meter definition for `owner`, preferring a character override.
    pub fn meter(&self, owner: &str, meter: &str) -> Option<&MeterDef> {
        self.character(owner)
            .and_then(|c| c.meters.get(meter))
            .or_else(|| self.meters.get(meter))
    }
}
