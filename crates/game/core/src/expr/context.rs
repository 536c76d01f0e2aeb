//! Read-only condition context: the DSL's view over game state.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::defs::{Game, PLAYER_ID};
use crate::rng::TurnRng;
use crate::state::GameState;

use super::Value;

/// Per-turn gate truth table: character id → gate id → open.
pub type ActiveGates = BTreeMap<String, BTreeMap<String, bool>>;

/// Bindings available to expressions for one evaluation.
///
/// Cheap to construct; the resolver builds a fresh one before every guard
/// evaluation so that it never outlives a mutable borrow of the state.
pub struct EvalContext<'a> {
    pub game: &'a Game,
    pub state: &'a GameState,
    pub gates: &'a ActiveGates,
    pub present: &'a [String],
    pub rng: &'a TurnRng,
    /// Keys already warned about this turn (warn-once discipline).
    pub warned: &'a RefCell<BTreeSet<String>>,
}

impl<'a> EvalContext<'a> {
    pub fn warn_once(&self, key: &str, msg: impl FnOnce() -> String) {
        let mut warned = self.warned.borrow_mut();
        if warned.insert(key.to_string()) {
            tracing::warn!(target: "expr", "{}", msg());
        }
    }

    /// Resolve a dotted path against the bindings. Unknown paths resolve
    /// to [`Value::Null`] with a warn-once, never an error.
    pub fn resolve_path(&self, segments: &[String]) -> Value {
        let resolved = self.try_resolve(segments);
        if resolved.is_none() {
            let path = segments.join(".");
            self.warn_once(&path, || format!("unknown path '{path}' resolves to null"));
        }
        resolved.unwrap_or(Value::Null)
    }

    /// Path resolution without the unknown-path warning, for `get()`.
    pub fn resolve_quiet(&self, segments: &[String]) -> Value {
        self.try_resolve(segments).unwrap_or(Value::Null)
    }

    fn try_resolve(&self, segments: &[String]) -> Option<Value> {
        let mut it = segments.iter().map(String::as_str);
        let root = it.next()?;
        match root {
            "null" => Some(Value::Null),
            "time" => match it.next()? {
                "day" => Some(Value::Num(f64::from(self.state.time.day))),
                "slot" => Some(
                    self.game
                        .time
                        .slot_at(self.state.time.minutes)
                        .map(|w| Value::Str(w.id.clone()))
                        .unwrap_or(Value::Null),
                ),
                "time_hhmm" => Some(Value::Str(self.state.time.hhmm())),
                "weekday" => Some(Value::Str(
                    self.game.time.weekday_for(self.state.time.day).to_string(),
                )),
                _ => None,
            },
            "location" => match it.next()? {
                "zone" => Some(Value::Str(self.state.location.zone.clone())),
                "id" => Some(Value::Str(self.state.location.id.clone())),
                "privacy" => Some(Value::Str(
                    self.game
                        .location(&self.state.location.id)
                        .map(|l| l.privacy.to_string())
                        .unwrap_or_default(),
                )),
                _ => None,
            },
            "present" => Some(Value::List(
                self.present
                    .iter()
                    .map(|id| Value::Str(id.clone()))
                    .collect(),
            )),
            "meters" => {
                let owner = it.next()?;
                let meter = it.next()?;
                let cs = self.state.character(owner)?;
                Some(
                    cs.meters
                        .get(meter)
                        .map(|v| Value::Num(*v))
                        .unwrap_or(Value::Null),
                )
            }
            "flags" => {
                let key = it.next()?;
                Some(
                    self.state
                        .flags
                        .get(key)
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                )
            }
            "modifiers" => {
                let owner = it.next()?;
                let cs = self.state.character(owner)?;
                Some(Value::List(
                    cs.modifiers.keys().map(|k| Value::Str(k.clone())).collect(),
                ))
            }
            "inventory" => {
                let owner = it.next()?;
                let cs = self.state.character(owner)?;
                // Accept both `inventory.<owner>.<item>` and the longer
                // `inventory.<owner>.items.<item>` / `...clothing.<item>`.
                let next = it.next()?;
                match next {
                    "items" => {
                        let item = it.next()?;
                        Some(Value::Num(f64::from(cs.item_count(item))))
                    }
                    "clothing" => {
                        let item = it.next()?;
                        Some(Value::Num(f64::from(
                            cs.clothing_inventory.get(item).copied().unwrap_or(0),
                        )))
                    }
                    item => Some(Value::Num(f64::from(cs.item_count(item)))),
                }
            }
            "clothing" => {
                let owner = it.next()?;
                let cs = self.state.character(owner)?;
                match it.next()? {
                    "outfit" => Some(
                        cs.active_outfit
                            .as_ref()
                            .map(|o| Value::Str(o.clone()))
                            .unwrap_or(Value::Null),
                    ),
                    "layers" => {
                        let slot = it.next()?;
                        Some(
                            cs.worn
                                .get(slot)
                                .map(|w| Value::Str(w.state.to_string()))
                                .unwrap_or(Value::Null),
                        )
                    }
                    _ => None,
                }
            }
            "gates" => {
                let owner = it.next()?;
                let gate = it.next()?;
                Some(
                    self.gates
                        .get(owner)
                        .and_then(|g| g.get(gate))
                        .map(|b| Value::Bool(*b))
                        .unwrap_or(Value::Null),
                )
            }
            "arcs" => {
                let arc_id = it.next()?;
                let arc = self.game.arc(arc_id)?;
                match it.next()? {
                    "stage" => {
                        let idx = self.state.arc_progress.get(arc_id).copied().unwrap_or(0);
                        Some(
                            arc.stage(idx)
                                .map(|s| Value::Str(s.id.clone()))
                                .unwrap_or(Value::Null),
                        )
                    }
                    "history" => Some(Value::List(
                        self.state
                            .arc_history
                            .get(arc_id)
                            .map(|h| h.iter().map(|s| Value::Str(s.clone())).collect())
                            .unwrap_or_default(),
                    )),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// `has(item)`: player owns at least one.
    pub fn player_has(&self, item: &str) -> bool {
        self.state
            .character(PLAYER_ID)
            .map(|p| p.item_count(item) > 0)
            .unwrap_or(false)
    }

    pub fn npc_present(&self, id: &str) -> bool {
        self.present.iter().any(|p| p == id)
    }

    pub fn knows_outfit(&self, owner: &str, outfit: &str) -> bool {
        self.state
            .character(owner)
            .map(|c| c.owned_outfits.contains(outfit))
            .unwrap_or(false)
    }

    /// Owner owns the outfit and every member clothing item.
    pub fn can_wear_outfit(&self, owner: &str, outfit: &str) -> bool {
        let Some(cs) = self.state.character(owner) else {
            return false;
        };
        if !cs.owned_outfits.contains(outfit) {
            return false;
        }
        match self.game.outfit(outfit) {
            Some(def) => def.items.iter().all(|i| cs.owns_clothing(i)),
            None => false,
        }
    }
}
