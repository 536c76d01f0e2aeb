//! End-to-end turns over the café fixture, deterministic path.

use plotplay_content::cafe_game;
use plotplay_core::defs::{ClothingState, Game};
use plotplay_core::services::clothing;
use plotplay_core::state::{GameState, ModifierState};
use plotplay_core::turn::TurnContext;
use plotplay_core::{ActionType, PlayerAction};
use plotplay_runtime::{AiSettings, ScriptedClient, TurnError, TurnResult, TurnRunner};

struct Session {
    game: Game,
    state: GameState,
    ai: ScriptedClient,
    settings: AiSettings,
}

impl Session {
    fn new(seed: u64) -> Self {
        let game = cafe_game();
        let state = plotplay_core::new_session_state(&game, seed);
        Self {
            game,
            state,
            ai: ScriptedClient::new(),
            settings: AiSettings::default(),
        }
    }

    async fn run(&mut self, action: PlayerAction) -> Result<TurnResult, TurnError> {
        let mut runner = TurnRunner {
            game: &self.game,
            state: &mut self.state,
            ai: &self.ai,
            settings: &self.settings,
        };
        runner.run(action).await
    }
}

fn move_dir(direction: &str) -> PlayerAction {
    let mut action = PlayerAction::bare(ActionType::Move);
    action.direction = Some(direction.to_string());
    action.skip_ai = true;
    action
}

fn purchase(item: &str, price: f64) -> PlayerAction {
    let mut action = PlayerAction::bare(ActionType::Purchase);
    action.item_id = Some(item.to_string());
    action.price = Some(price);
    action.skip_ai = true;
    action
}

/// E1: movement advances time, fires the morning-rush event, and lands in
/// the inside-café node with its choices.
#[tokio::test]
async fn movement_advances_time_and_fires_events() {
    let mut s = Session::new(7);
    assert_eq!(s.state.time.hhmm(), "08:00");

    let result = s.run(move_dir("n")).await.unwrap();

    assert_eq!(s.state.location.id, "cafe_interior");
    assert_eq!(s.state.time.hhmm(), "08:01");
    assert!(result.events_fired.contains(&"cafe_morning_rush".to_string()));
    assert_eq!(s.state.current_node, "cafe_inside");
    assert!(result.choices.iter().any(|c| c.id == "order_coffee"));
    // Deterministic path: no model calls at all.
    assert!(s.ai.seen_prompts().is_empty());
    assert!(!result.ai_failed);
}

/// E2: purchases move money and stock, and funds are enforced.
#[tokio::test]
async fn purchase_decrements_money_and_enforces_funds() {
    let mut s = Session::new(7);
    s.run(move_dir("n")).await.unwrap();

    let result = s.run(purchase("coffee", 4.0)).await.unwrap();
    assert_eq!(s.state.player().item_count("coffee"), 1);
    assert_eq!(s.state.player().meter("money"), 6.0);
    assert!(result.narrative.is_empty());

    s.run(purchase("coffee", 4.0)).await.unwrap();
    let third = s.run(purchase("coffee", 4.0)).await.unwrap();

    assert!(third.narrative.contains("afford"));
    assert_eq!(s.state.player().item_count("coffee"), 2);
    assert_eq!(s.state.player().meter("money"), 2.0);
    // Marco got paid for exactly two.
    assert_eq!(s.state.character("vendor").unwrap().meter("money"), 208.0);
}

/// Using a consumable applies on_use and burns the unit.
#[tokio::test]
async fn use_consumes_and_applies_on_use() {
    let mut s = Session::new(7);
    s.run(move_dir("n")).await.unwrap();
    s.run(purchase("coffee", 4.0)).await.unwrap();

    let mut action = PlayerAction::bare(ActionType::Use);
    action.item_id = Some("coffee".to_string());
    action.skip_ai = true;
    s.run(action).await.unwrap();

    assert_eq!(s.state.player().item_count("coffee"), 0);
    assert_eq!(s.state.player().meter("energy"), 75.0);
}

/// E4: a timed modifier expires once enough minutes pass, running its
/// exit effects.
#[tokio::test]
async fn modifier_expires_after_duration() {
    let mut s = Session::new(7);
    s.state.player_mut().modifiers.insert(
        "drunk".to_string(),
        ModifierState {
            remaining_min: 30,
            auto: false,
        },
    );
    // Entry effects would have raised charm; set it as if they had run.
    s.state.player_mut().meters.insert("charm".to_string(), 60.0);

    s.run(move_dir("e")).await.unwrap(); // patio → park, 10 min
    assert!(s.state.player().modifiers.contains_key("drunk"));
    s.run(move_dir("w")).await.unwrap(); // park → patio, 10 min
    assert!(s.state.player().modifiers.contains_key("drunk"));
    s.run(move_dir("e")).await.unwrap(); // 30 min total

    assert!(!s.state.player().modifiers.contains_key("drunk"));
    assert_eq!(s.state.player().meter("charm"), 50.0);
    assert_eq!(s.state.time.hhmm(), "08:30");
}

/// E5: outfit composition and per-slot state changes.
#[test]
fn outfit_composition_and_slot_states() {
    let game = cafe_game();
    let mut state = plotplay_core::new_session_state(&game, 1);
    let mut ctx = TurnContext::new(1, 1);

    clothing::outfit_put_on(&game, &mut state, &mut ctx, "emma", "date_out").unwrap();
    let emma = state.character("emma").unwrap();
    assert_eq!(emma.worn["top"].item, "red_dress");
    assert_eq!(emma.worn["top"].state, ClothingState::Intact);
    assert_eq!(emma.worn["bottom"].item, "red_dress");
    assert_eq!(emma.worn["feet"].item, "heels");

    clothing::set_slot_state(&game, &mut state, &mut ctx, "emma", "top", ClothingState::Displaced)
        .unwrap();
    clothing::set_slot_state(
        &game,
        &mut state,
        &mut ctx,
        "emma",
        "bottom",
        ClothingState::Displaced,
    )
    .unwrap();
    let err = clothing::set_slot_state(
        &game,
        &mut state,
        &mut ctx,
        "emma",
        "underwear_top",
        ClothingState::Removed,
    )
    .unwrap_err();
    assert!(err.contains("underwear_top"));
}

/// E6: a deterministic purchase satisfies an arc condition the same turn.
#[tokio::test]
async fn arc_advances_on_deterministic_action() {
    let mut s = Session::new(7);
    s.state
        .character_mut("emma")
        .unwrap()
        .meters
        .insert("trust".to_string(), 60.0);
    s.state.player_mut().meters.insert("money".to_string(), 30.0);

    s.run(move_dir("n")).await.unwrap();
    let result = s.run(purchase("flowers", 20.0)).await.unwrap();

    assert!(result
        .milestones_reached
        .contains(&"emma_romance:ready_for_date".to_string()));
    assert!(s.state.unlocked_endings.contains("emma_good_ending"));
    assert!(s.state.unlocked_actions.contains("ask_emma_out"));
    assert_eq!(s.state.arc_progress["emma_romance"], 1);
    assert_eq!(
        s.state.arc_history["emma_romance"],
        vec!["strangers".to_string(), "ready_for_date".to_string()]
    );
}

/// Giving flowers fires the item's on_give hook.
#[tokio::test]
async fn give_runs_hooks_and_requires_colocation() {
    let mut s = Session::new(7);
    s.state
        .player_mut()
        .inventory
        .insert("flowers".to_string(), 1);

    // Emma is on the patio in the morning; the vendor is not.
    let mut to_vendor = PlayerAction::bare(ActionType::Give);
    to_vendor.item_id = Some("flowers".to_string());
    to_vendor.target = Some("vendor".to_string());
    to_vendor.skip_ai = true;
    let refused = s.run(to_vendor).await.unwrap();
    assert!(refused.narrative.contains("aren't here"));
    assert_eq!(s.state.player().item_count("flowers"), 1);

    let mut to_emma = PlayerAction::bare(ActionType::Give);
    to_emma.item_id = Some("flowers".to_string());
    to_emma.target = Some("emma".to_string());
    to_emma.skip_ai = true;
    s.run(to_emma).await.unwrap();

    assert_eq!(s.state.player().item_count("flowers"), 0);
    let emma = s.state.character("emma").unwrap();
    assert_eq!(emma.item_count("flowers"), 1);
    // 30 base + 10 from on_give.
    assert_eq!(emma.meter("trust"), 40.0);
}

/// Companions must be present and willing.
#[tokio::test]
async fn unwilling_companion_blocks_the_move() {
    let mut s = Session::new(7);
    s.state
        .character_mut("emma")
        .unwrap()
        .meters
        .insert("trust".to_string(), 10.0);

    let mut action = move_dir("n");
    action.with_characters = vec!["emma".to_string()];
    let result = s.run(action).await.unwrap();

    assert!(result.narrative.contains("Emma"));
    assert_eq!(s.state.location.id, "cafe_patio");
    assert_eq!(s.state.time.hhmm(), "08:00");
}

/// A willing companion arrives pinned to the destination.
#[tokio::test]
async fn willing_companion_comes_along() {
    let mut s = Session::new(7);
    let mut action = move_dir("n");
    action.with_characters = vec!["emma".to_string()];
    s.run(action).await.unwrap();

    assert_eq!(s.state.location.id, "cafe_interior");
    assert_eq!(
        s.state.character("emma").unwrap().location_pin.as_deref(),
        Some("cafe_interior")
    );
}

/// Cross-zone travel: entry/exit rules, method costs, and the active-
/// method modifier multiplier.
#[tokio::test]
async fn travel_costs_depend_on_method_and_modifiers() {
    // Walking while drunk takes twice as long.
    let mut s = Session::new(7);
    s.state.player_mut().modifiers.insert(
        "drunk".to_string(),
        ModifierState {
            remaining_min: 120,
            auto: false,
        },
    );
    let mut walk = PlayerAction::bare(ActionType::Travel);
    walk.location = Some("river_walk".to_string());
    walk.target = Some("walk".to_string());
    walk.skip_ai = true;
    s.run(walk).await.unwrap();
    assert_eq!(s.state.location.id, "river_walk");
    assert_eq!(s.state.time.hhmm(), "08:30");

    // A rideshare ignores the modifier.
    let mut s = Session::new(7);
    s.state.player_mut().modifiers.insert(
        "drunk".to_string(),
        ModifierState {
            remaining_min: 120,
            auto: false,
        },
    );
    let mut ride = PlayerAction::bare(ActionType::Travel);
    ride.location = Some("river_walk".to_string());
    ride.target = Some("rideshare".to_string());
    ride.skip_ai = true;
    s.run(ride).await.unwrap();
    assert_eq!(s.state.time.hhmm(), "08:05");

    // Travel must depart from a zone exit.
    let mut s = Session::new(7);
    s.run(move_dir("e")).await.unwrap(); // park is not an exit
    let mut blocked = PlayerAction::bare(ActionType::Travel);
    blocked.location = Some("river_walk".to_string());
    blocked.skip_ai = true;
    let result = s.run(blocked).await.unwrap();
    assert!(result.narrative.contains("way out"));
    assert_eq!(s.state.location.id, "park");
}

/// Event cooldowns tick down by minutes passed and never climb on their
/// own.
#[tokio::test]
async fn event_cooldown_is_monotonic() {
    let mut s = Session::new(7);
    s.run(move_dir("n")).await.unwrap();
    // Set to 240 when it fired, then the same turn's minute ticked it.
    assert_eq!(s.state.event_cooldowns["cafe_morning_rush"], 239);

    s.run(move_dir("s")).await.unwrap();
    assert_eq!(s.state.event_cooldowns["cafe_morning_rush"], 238);

    s.run(move_dir("n")).await.unwrap();
    // Still cooling down: the event does not fire again.
    assert_eq!(s.state.event_cooldowns["cafe_morning_rush"], 237);
}

/// The per-visit conversation cap stops default-cost time.
#[tokio::test]
async fn conversation_time_caps_per_node_visit() {
    let mut s = Session::new(7);
    let mut say = PlayerAction::say("just chatting");
    say.skip_ai = true;

    for _ in 0..12 {
        s.run(say.clone()).await.unwrap();
    }
    assert_eq!(s.state.time.hhmm(), "09:00");

    // The thirteenth idle line costs nothing.
    s.run(say.clone()).await.unwrap();
    assert_eq!(s.state.time.hhmm(), "09:00");
}

/// Goto respects discovery: an unknown room refuses until its discovery
/// condition holds, then the move both succeeds and discovers it.
#[tokio::test]
async fn goto_respects_discovery() {
    let mut s = Session::new(7);
    let mut goto = PlayerAction::bare(ActionType::Goto);
    goto.location = Some("back_room".to_string());
    goto.skip_ai = true;

    let refused = s.run(goto.clone()).await.unwrap();
    assert!(refused.narrative.contains("don't know the way"));
    assert_eq!(s.state.location.id, "cafe_patio");

    s.state
        .flags
        .insert("met_emma".to_string(), true.into());
    s.run(goto).await.unwrap();
    assert_eq!(s.state.location.id, "back_room");
    assert!(s.state.discovered_locations.contains("back_room"));
    // Non-adjacent goto inside the zone pays the zone default.
    assert_eq!(s.state.time.hhmm(), "08:05");
}

/// Selling is the inverse trade, with the buyer's funds enforced.
#[tokio::test]
async fn sell_moves_item_and_money_back() {
    let mut s = Session::new(7);
    s.run(move_dir("n")).await.unwrap();
    s.run(purchase("coffee", 4.0)).await.unwrap();

    let mut sell = PlayerAction::bare(ActionType::Sell);
    sell.item_id = Some("coffee".to_string());
    sell.target = Some("vendor".to_string());
    sell.price = Some(2.0);
    sell.skip_ai = true;
    s.run(sell).await.unwrap();

    assert_eq!(s.state.player().item_count("coffee"), 0);
    assert_eq!(s.state.player().meter("money"), 8.0);
    assert_eq!(s.state.character("vendor").unwrap().item_count("coffee"), 10);
}

/// `do` runs the same deterministic pipeline as `say`.
#[tokio::test]
async fn do_action_advances_default_time() {
    let mut s = Session::new(7);
    let mut act = PlayerAction::bare(ActionType::Do);
    act.text = Some("stretch in the sun".to_string());
    act.skip_ai = true;
    s.run(act).await.unwrap();
    assert_eq!(s.state.time.hhmm(), "08:05");
    assert_eq!(s.state.turn, 1);
}

/// Malformed actions reject cleanly; state does not move.
#[tokio::test]
async fn invalid_actions_roll_back() {
    let mut s = Session::new(7);
    let before_turn = s.state.turn;

    let mut bogus = PlayerAction::bare(ActionType::Choice);
    bogus.choice_id = Some("no_such_choice".to_string());
    bogus.skip_ai = true;
    let err = s.run(bogus).await.unwrap_err();
    assert!(matches!(err, TurnError::InvalidAction(_)));
    assert_eq!(s.state.turn, before_turn);

    let mut missing = PlayerAction::bare(ActionType::Use);
    missing.skip_ai = true;
    assert!(matches!(
        s.run(missing).await.unwrap_err(),
        TurnError::InvalidAction(_)
    ));
}

/// An ending node refuses all further actions.
#[tokio::test]
async fn endings_are_terminal() {
    let mut s = Session::new(7);
    s.state.unlocked_actions.insert("ask_emma_out".to_string());

    let mut ask = PlayerAction::bare(ActionType::Choice);
    ask.choice_id = Some("ask_emma_out".to_string());
    ask.skip_ai = true;
    s.run(ask).await.unwrap();
    assert_eq!(s.state.current_node, "good_ending");

    let err = s.run(move_dir("n")).await.unwrap_err();
    assert!(matches!(err, TurnError::SessionEnded));
}

/// Invariants hold after every committed turn of a varied sequence.
#[tokio::test]
async fn invariants_hold_at_turn_boundaries() {
    let mut s = Session::new(11);
    let actions = vec![
        move_dir("n"),
        purchase("coffee", 4.0),
        move_dir("s"),
        move_dir("e"),
        move_dir("w"),
    ];
    for action in actions {
        s.run(action).await.unwrap();
        s.state.check_invariants(&s.game).unwrap();
    }
}
