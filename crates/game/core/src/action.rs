//! Player actions: the per-turn input, its summary line, and the
//! deterministic phase-7 dispatch.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::defs::{ChoiceDef, Game, PLAYER_ID};
use crate::effects::apply_batch;
use crate::error::StateError;
use crate::services::{inventory, movement, time};
use crate::state::GameState;
use crate::turn::TurnContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    Say,
    Do,
    Choice,
    Use,
    Give,
    Move,
    Goto,
    Travel,
    Purchase,
    Sell,
}

/// One player submission. Field relevance depends on `action_type`; the
/// dispatcher validates what it needs and rejects the rest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerAction {
    pub action_type: ActionType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub choice_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub with_characters: Vec<String>,
    #[serde(default)]
    pub skip_ai: bool,
    /// Suppress node entry/exit effects for this turn (silent moves).
    #[serde(default)]
    pub skip_node_effects: bool,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl PlayerAction {
    pub fn say(text: impl Into<String>) -> Self {
        Self::bare(ActionType::Say).with_text(text)
    }

    pub fn bare(action_type: ActionType) -> Self {
        Self {
            action_type,
            text: None,
            choice_id: None,
            item_id: None,
            target: None,
            direction: None,
            location: None,
            with_characters: Vec::new(),
            skip_ai: false,
            skip_node_effects: false,
            price: None,
            count: 1,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Phase 5: the human-readable line echoed back and logged.
pub fn format_summary(game: &Game, action: &PlayerAction) -> String {
    let item_name = |id: &Option<String>| -> String {
        id.as_deref()
            .map(|id| {
                game.item(id)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .unwrap_or_else(|| "something".to_string())
    };
    match action.action_type {
        ActionType::Say => format!("Say: \"{}\"", action.text.as_deref().unwrap_or("")),
        ActionType::Do => format!("Do: {}", action.text.as_deref().unwrap_or("")),
        ActionType::Choice => format!(
            "Choose: {}",
            action.choice_id.as_deref().unwrap_or("(nothing)")
        ),
        ActionType::Use => format!("Use {}", item_name(&action.item_id)),
        ActionType::Give => {
            let to = action
                .target
                .as_deref()
                .and_then(|id| game.character(id))
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "someone".to_string());
            format!("Give {} to {}", item_name(&action.item_id), to)
        }
        ActionType::Move => format!(
            "Head {}",
            action.direction.as_deref().unwrap_or("somewhere")
        ),
        ActionType::Goto => format!(
            "Go to {}",
            action
                .location
                .as_deref()
                .and_then(|id| game.location(id))
                .map(|l| l.name.clone())
                .unwrap_or_else(|| "somewhere".to_string())
        ),
        ActionType::Travel => format!(
            "Travel to {}",
            action
                .location
                .as_deref()
                .and_then(|id| game.location(id))
                .map(|l| l.name.clone())
                .unwrap_or_else(|| "somewhere".to_string())
        ),
        ActionType::Purchase => format!(
            "Buy {} {} for {} {}",
            action.count,
            item_name(&action.item_id),
            action.price.unwrap_or(0.0),
            game.economy.currency
        ),
        ActionType::Sell => format!(
            "Sell {} {} for {} {}",
            action.count,
            item_name(&action.item_id),
            action.price.unwrap_or(0.0),
            game.economy.currency
        ),
    }
}

/// Phase 7: execute the deterministic part of the action and resolve its
/// time cost.
///
/// Gate/lock/precondition failures become refusal narrative and the turn
/// commits; only malformed requests (missing fields, unknown choice ids)
/// are hard errors back to the client.
pub fn execute(
    game: &Game,
    state: &mut GameState,
    ctx: &mut TurnContext,
    action: &PlayerAction,
) -> Result<(), StateError> {
    let node = game.node(&state.current_node);
    let kind = action.action_type.to_string();

    match action.action_type {
        ActionType::Say | ActionType::Do => {
            time::resolve_action_cost(game, state, ctx, node, &kind, None, None);
        }

        ActionType::Choice => {
            let choice_id = action
                .choice_id
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("choice_id is required".into()))?;
            let choice = find_choice(game, state, choice_id)
                .ok_or_else(|| StateError::InvalidAction(format!("unknown choice '{choice_id}'")))?;

            if let Some(conditions) = &choice.conditions
                && !ctx.check(game, state, conditions)
            {
                return Err(StateError::InvalidAction(format!(
                    "choice '{choice_id}' is not available"
                )));
            }

            let effects = choice.effects.clone();
            apply_batch(game, state, ctx, &effects);
            if let Some(goto) = &choice.goto {
                ctx.pending_goto = Some(goto.clone());
            }
            time::resolve_action_cost(
                game,
                state,
                ctx,
                node,
                "choice",
                choice.time_cost,
                choice.time_category.as_deref(),
            );
        }

        ActionType::Use => {
            let item_id = action
                .item_id
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("item_id is required".into()))?;
            let def = game
                .item(item_id)
                .ok_or_else(|| StateError::unknown("item", item_id))?;
            if state.player().item_count(item_id) == 0 {
                return Err(StateError::InvalidAction(format!(
                    "player does not have '{item_id}'"
                )));
            }
            let on_use = def.on_use.clone();
            apply_batch(game, state, ctx, &on_use);
            if def.consumable {
                inventory::remove(game, state, ctx, PLAYER_ID, item_id, 1);
            }
            time::resolve_action_cost(game, state, ctx, node, "use", None, None);
        }

        ActionType::Give => {
            let item_id = action
                .item_id
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("item_id is required".into()))?;
            let target = action
                .target
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("target is required".into()))?;
            if let Err(refusal) =
                inventory::give(game, state, ctx, PLAYER_ID, target, item_id, action.count)
            {
                ctx.refuse(refusal);
            }
            time::resolve_action_cost(game, state, ctx, node, "give", None, None);
        }

        ActionType::Move => {
            let direction = action
                .direction
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("direction is required".into()))?;
            if let Err(refusal) =
                movement::move_direction(game, state, ctx, direction, &action.with_characters)
            {
                ctx.refuse(refusal);
            }
        }

        ActionType::Goto => {
            let location = action
                .location
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("location is required".into()))?;
            if let Err(refusal) =
                movement::goto_location(game, state, ctx, location, &action.with_characters)
            {
                ctx.refuse(refusal);
            }
        }

        ActionType::Travel => {
            let location = action
                .location
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("location is required".into()))?;
            if let Err(refusal) = movement::travel(
                game,
                state,
                ctx,
                location,
                action.target.as_deref(),
                &action.with_characters,
            ) {
                ctx.refuse(refusal);
            }
        }

        ActionType::Purchase => {
            let item_id = action
                .item_id
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("item_id is required".into()))?;
            let price = action
                .price
                .ok_or_else(|| StateError::InvalidAction("price is required".into()))?;
            let seller = trade_partner(state, ctx, action, item_id, action.count)
                .ok_or_else(|| StateError::InvalidAction("no seller is present".into()))?;
            if let Err(refusal) = inventory::purchase(
                game,
                state,
                ctx,
                PLAYER_ID,
                &seller,
                item_id,
                action.count,
                price,
            ) {
                ctx.refuse(refusal);
            }
            time::resolve_action_cost(game, state, ctx, node, "purchase", None, None);
        }

        ActionType::Sell => {
            let item_id = action
                .item_id
                .as_deref()
                .ok_or_else(|| StateError::InvalidAction("item_id is required".into()))?;
            let price = action
                .price
                .ok_or_else(|| StateError::InvalidAction("price is required".into()))?;
            let buyer = action
                .target
                .clone()
                .or_else(|| first_other_present(ctx))
                .ok_or_else(|| StateError::InvalidAction("no buyer is present".into()))?;
            if let Err(refusal) = inventory::sell(
                game,
                state,
                ctx,
                PLAYER_ID,
                &buyer,
                item_id,
                action.count,
                price,
            ) {
                ctx.refuse(refusal);
            }
            time::resolve_action_cost(game, state, ctx, node, "sell", None, None);
        }
    }

    Ok(())
}

/// Find the selected choice: node choices, dynamic choices, the previous
/// turn's event-injected choices, then unlocked actions (promoted to a
/// choice shape).
fn find_choice(game: &Game, state: &GameState, choice_id: &str) -> Option<ChoiceDef> {
    if let Some(node) = game.node(&state.current_node) {
        if let Some(c) = node.choices.iter().find(|c| c.id == choice_id) {
            return Some(c.clone());
        }
        if let Some(c) = node.dynamic_choices.iter().find(|c| c.id == choice_id) {
            return Some(c.clone());
        }
    }
    if let Some(c) = state.event_choices.iter().find(|c| c.id == choice_id) {
        return Some(c.clone());
    }
    if state.unlocked_actions.contains(choice_id)
        && let Some(action) = game.action(choice_id)
    {
        return Some(ChoiceDef {
            id: action.id.clone(),
            prompt: action.prompt.clone(),
            conditions: action.conditions.clone(),
            disabled_reason: None,
            effects: action.effects.clone(),
            goto: action.goto.clone(),
            time_cost: action.time_cost,
            time_category: action.time_category.clone(),
        });
    }
    None
}

/// The explicit target, or the first present character able to trade.
fn trade_partner(
    state: &GameState,
    ctx: &TurnContext,
    action: &PlayerAction,
    item: &str,
    count: u32,
) -> Option<String> {
    if let Some(target) = &action.target {
        return Some(target.clone());
    }
    ctx.present
        .iter()
        .find(|id| {
            id.as_str() != PLAYER_ID
                && state
                    .character(id)
                    .map(|c| c.item_count(item) >= count)
                    .unwrap_or(false)
        })
        .cloned()
}

fn first_other_present(ctx: &TurnContext) -> Option<String> {
    ctx.present
        .iter()
        .find(|id| id.as_str() != PLAYER_ID)
        .cloned()
}
