//! The Writer/Checker contract: gating, safety, retries, cadence.

use plotplay_content::cafe_game;
use plotplay_core::defs::{ClothingState, FlagValue, Game};
use plotplay_core::state::GameState;
use plotplay_core::{ActionType, PlayerAction};
use plotplay_runtime::{AiSettings, ScriptedClient, TurnResult, TurnRunner};

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

    async fn run(&mut self, action: PlayerAction) -> TurnResult {
        let mut runner = TurnRunner {
            game: &self.game,
            state: &mut self.state,
            ai: &self.ai,
            settings: &self.settings,
        };
        runner.run(action).await.unwrap()
    }
}

const KISS_PROSE: &str =
    "You lean across the little table. Emma laughs, surprised, and puts a hand on your chest.";

/// E3: a closed gate drops the Checker deltas it guards and surfaces its
/// refusal line, while the Writer prose is preserved.
#[tokio::test]
async fn closed_gate_blocks_checker_deltas() {
    let mut s = Session::new(7);
    assert_eq!(s.state.character("emma").unwrap().meter("trust"), 30.0);

    s.ai.push_writer(KISS_PROSE);
    s.ai
        .push_checker(r#"{"meters": {"emma": {"trust": "+10"}}, "flags": {"first_kiss": true}}"#);

    let result = s.run(PlayerAction::say("Kiss Emma")).await;

    assert_eq!(
        s.state.flags.get("first_kiss"),
        Some(&FlagValue::Bool(false))
    );
    assert_eq!(s.state.character("emma").unwrap().meter("trust"), 30.0);
    assert!(result.narrative.contains(KISS_PROSE));
    assert!(result.narrative.contains("Emma steps back, not ready for that."));
    assert!(!result.ai_failed);
}

/// With the gate open, the same deltas land (clamped and capped).
#[tokio::test]
async fn open_gate_lets_deltas_through() {
    let mut s = Session::new(7);
    s.state
        .character_mut("emma")
        .unwrap()
        .meters
        .insert("trust".to_string(), 60.0);

    s.ai.push_writer(KISS_PROSE);
    s.ai
        .push_checker(r#"{"meters": {"emma": {"trust": "+10"}}, "flags": {"first_kiss": true}}"#);

    s.run(PlayerAction::say("Kiss Emma")).await;

    assert_eq!(s.state.character("emma").unwrap().meter("trust"), 70.0);
    assert_eq!(s.state.flags.get("first_kiss"), Some(&FlagValue::Bool(true)));
}

/// The gate clamp from an active modifier overrides an otherwise-open
/// gate.
#[tokio::test]
async fn modifier_clamp_forces_gate_closed() {
    let mut s = Session::new(7);
    s.state
        .character_mut("emma")
        .unwrap()
        .meters
        .insert("trust".to_string(), 60.0);
    s.state.character_mut("emma").unwrap().modifiers.insert(
        "drunk".to_string(),
        plotplay_core::state::ModifierState {
            remaining_min: 60,
            auto: false,
        },
    );

    s.ai.push_writer(KISS_PROSE);
    s.ai
        .push_checker(r#"{"flags": {"first_kiss": true}}"#);

    s.run(PlayerAction::say("Kiss Emma")).await;

    assert_eq!(
        s.state.flags.get("first_kiss"),
        Some(&FlagValue::Bool(false))
    );
}

/// A safety violation drops every state delta but keeps the violation
/// text as refusal narrative.
#[tokio::test]
async fn safety_violation_drops_all_deltas() {
    let mut s = Session::new(7);
    s.ai.push_writer("Something the policy rejects.");
    s.ai.push_checker(
        r#"{"safety": {"ok": false, "violations": ["content outside the game's bounds"]},
            "meters": {"emma": {"trust": "+50"}},
            "flags": {"met_emma": true}}"#,
    );

    let result = s.run(PlayerAction::say("...")).await;

    assert_eq!(s.state.character("emma").unwrap().meter("trust"), 30.0);
    assert_eq!(s.state.flags.get("met_emma"), Some(&FlagValue::Bool(false)));
    assert!(result.narrative.contains("content outside the game's bounds"));
}

/// Malformed Checker JSON gets exactly one retry with a JSON-only
/// directive; a second failure drops the deltas and keeps the prose.
#[tokio::test]
async fn malformed_checker_json_retries_once() {
    let mut s = Session::new(7);
    s.ai.push_writer("A quiet beat.");
    s.ai.push_checker("this is not json");
    s.ai.push_checker(r#"{"meters": {"emma": {"trust": "+5"}}}"#);

    let result = s.run(PlayerAction::say("hello")).await;

    assert_eq!(s.state.character("emma").unwrap().meter("trust"), 35.0);
    assert!(!result.ai_failed);
    let prompts = s.ai.seen_prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[2].prompt.contains("Emit JSON only"));

    // Both attempts malformed: prose survives, deltas do not.
    let mut s = Session::new(7);
    s.ai.push_writer("Still here.");
    s.ai.push_checker("garbage");
    s.ai.push_checker("more garbage");
    let result = s.run(PlayerAction::say("hello")).await;
    assert!(result.ai_failed);
    assert!(result.narrative.contains("Still here."));
    assert_eq!(s.state.character("emma").unwrap().meter("trust"), 30.0);
}

/// Per-turn meter caps bound Checker deltas like any other effect.
#[tokio::test]
async fn checker_deltas_respect_per_turn_cap() {
    let mut s = Session::new(7);
    s.state
        .character_mut("emma")
        .unwrap()
        .meters
        .insert("trust".to_string(), 60.0);
    s.ai.push_writer("An extraordinary gesture.");
    s.ai.push_checker(r#"{"meters": {"emma": {"trust": "+40"}}}"#);

    s.run(PlayerAction::say("grand gesture")).await;

    // delta_cap_per_turn on trust is 25.
    assert_eq!(s.state.character("emma").unwrap().meter("trust"), 85.0);
}

/// Clothing deltas route through the service: legal ones land, illegal
/// ones are discarded.
#[tokio::test]
async fn checker_clothing_deltas_are_validated() {
    let mut s = Session::new(7);
    s.ai.push_writer("Emma shrugs her dress askew.");
    s.ai.push_checker(
        r#"{"clothing": {"emma": {"top": "displaced", "underwear_top": "removed"}}}"#,
    );

    s.run(PlayerAction::say("...")).await;

    let emma = s.state.character("emma").unwrap();
    assert_eq!(emma.worn["top"].state, ClothingState::Displaced);
    // Nothing was worn in underwear_top; the delta was discarded.
    assert!(!emma.worn.contains_key("underwear_top"));
    assert_eq!(emma.worn["bottom"].state, ClothingState::Intact);
}

/// Node transitions from the Checker are honored only along the node's
/// own transition rules.
#[tokio::test]
async fn checker_node_transitions_respect_reachability() {
    let mut s = Session::new(7);
    s.ai.push_writer("You drift inside.");
    s.ai.push_checker(r#"{"node_transition": "cafe_inside"}"#);
    s.run(PlayerAction::say("heading in")).await;
    assert_eq!(s.state.current_node, "cafe_inside");

    let mut s = Session::new(7);
    s.ai.push_writer("Cut to black.");
    s.ai.push_checker(r#"{"node_transition": "good_ending"}"#);
    s.run(PlayerAction::say("the end?")).await;
    assert_eq!(s.state.current_node, "day_hub");
}

/// A Writer-narrated relocation is applied with zero time cost.
#[tokio::test]
async fn checker_location_delta_is_free() {
    let mut s = Session::new(7);
    s.ai.push_writer("You wander into the café without thinking about it.");
    s.ai
        .push_checker(r#"{"location": {"zone": "downtown", "id": "cafe_interior"}}"#);

    s.run(PlayerAction::say("wander in")).await;

    assert_eq!(s.state.location.id, "cafe_interior");
    // Only the say cost was charged; the move itself was free.
    assert_eq!(s.state.time.hhmm(), "08:05");
}

/// Character memories accumulate with day stamps and power the
/// story-events feed.
#[tokio::test]
async fn character_memories_are_recorded() {
    let mut s = Session::new(7);
    s.ai.push_writer("You talk about nothing in particular; it is easy.");
    s.ai.push_checker(r#"{"character_memories": {"emma": "Talked on the patio; it was easy."}}"#);

    s.run(PlayerAction::say("small talk")).await;

    assert_eq!(s.state.memory_log.len(), 1);
    let memory = &s.state.memory_log[0];
    assert_eq!(memory.day, 1);
    assert!(memory.characters.contains(&"emma".to_string()));

    let feed = plotplay_runtime::api::story_events(&s.state);
    assert_eq!(feed.memories.len(), 1);
}

/// The summary cadence: every Nth AI turn requests a rolling summary and
/// applies it.
#[tokio::test]
async fn summary_cadence_requests_and_applies() {
    let mut s = Session::new(7);
    s.settings.summary_interval = 2;

    s.ai.push_writer("One.");
    s.ai.push_checker("{}");
    s.run(PlayerAction::say("one")).await;
    assert_eq!(s.state.ai_turns_since_summary, 1);

    s.ai.push_writer("Two.");
    s.ai.push_checker(r#"{"narrative_summary": "Two quiet mornings at the cafe."}"#);
    s.run(PlayerAction::say("two")).await;

    assert_eq!(s.state.narrative_summary, "Two quiet mornings at the cafe.");
    assert_eq!(s.state.ai_turns_since_summary, 0);

    let prompts = s.ai.seen_prompts();
    // Second checker prompt carried the summary request.
    assert!(prompts[3].prompt.contains("narrative_summary"));
}

/// A total transport outage degrades to the deterministic pipeline and
/// still commits a valid turn.
#[tokio::test]
async fn transport_outage_degrades_gracefully() {
    let mut s = Session::new(7);
    // Nothing queued: every call errors.
    let result = s.run(PlayerAction::say("anyone there?")).await;

    assert!(result.ai_failed);
    assert_eq!(s.state.turn, 1);
    assert_eq!(s.state.time.hhmm(), "08:05");
    s.state.check_invariants(&s.game).unwrap();
}
