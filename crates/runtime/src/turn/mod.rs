//! The 22-phase turn orchestrator.
//!
//! One entry point drives every action type through the same pipeline.
//! Deterministic phases call straight into the core services; the AI
//! phases (6, 9–14) are skipped for `skip_ai` actions and degrade to the
//! deterministic pipeline on transport failure. Streaming and one-shot
//! execution share this implementation, so both produce identical final
//! state for the same inputs and seed.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use plotplay_core::action::{self, PlayerAction};
use plotplay_core::defs::Game;
use plotplay_core::error::StateError;
use plotplay_core::services::{
    arcs, choices, discovery, events, gates, modifiers, nodes, presence, summary, time,
};
use plotplay_core::state::GameState;
use plotplay_core::turn::{ChoiceItem, TurnContext};
use plotplay_core::StateSummary;

use crate::ai::{
    apply_checker_output, build_envelope, checker_prompt, parse_checker_output, writer_prompt,
    GenerateRequest, ModelClient, PromptKind,
};
use crate::config::AiSettings;
use crate::error::TurnError;

/// The per-turn result returned to the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnResult {
    pub narrative: String,
    pub state_summary: StateSummary,
    pub choices: Vec<ChoiceItem>,
    pub action_summary: String,
    pub events_fired: Vec<String>,
    pub milestones_reached: Vec<String>,
    /// Set when the Writer or Checker failed and the turn degraded.
    pub ai_failed: bool,
}

/// Events yielded by the streaming variant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ActionSummary { text: String },
    NarrativeChunk { text: String },
    CheckerStatus { status: String },
    Complete { result: TurnResult },
}

/// Drives one turn against borrowed session state.
pub struct TurnRunner<'a> {
    pub game: &'a Game,
    pub state: &'a mut GameState,
    pub ai: &'a dyn ModelClient,
    pub settings: &'a AiSettings,
}

impl TurnRunner<'_> {
    /// Run a turn to completion and return the result.
    pub async fn run(&mut self, action: PlayerAction) -> Result<TurnResult, TurnError> {
        self.run_inner(action, None).await
    }

    /// Run a turn, yielding stream events as phases progress. The final
    /// state equals what [`TurnRunner::run`] produces for the same inputs
    /// and seed.
    pub async fn run_streaming(
        &mut self,
        action: PlayerAction,
        sink: mpsc::Sender<StreamEvent>,
    ) -> Result<TurnResult, TurnError> {
        self.run_inner(action, Some(sink)).await
    }

    async fn run_inner(
        &mut self,
        action: PlayerAction,
        sink: Option<mpsc::Sender<StreamEvent>>,
    ) -> Result<TurnResult, TurnError> {
        let game = self.game;

        // Phase 1: snapshot, turn counter, per-turn RNG.
        let snapshot = self.state.clone();
        self.state.turn += 1;
        let mut ctx = TurnContext::new(self.state.turn, self.state.base_seed);
        ctx.skip_node_effects = action.skip_node_effects;

        let outcome = self
            .drive_phases(&action, &mut ctx, sink.as_ref())
            .await;

        match outcome {
            Ok(result) => {
                // Commit-side invariant check; breakage rolls back.
                if let Err(err) = self.state.check_invariants(game) {
                    *self.state = snapshot;
                    return Err(TurnError::Internal(err.to_string()));
                }
                if let Some(sink) = &sink {
                    let complete = StreamEvent::Complete {
                        result: result.clone(),
                    };
                    if sink.send(complete).await.is_err() {
                        *self.state = snapshot;
                        return Err(TurnError::Cancelled);
                    }
                }
                Ok(result)
            }
            Err(err) => {
                *self.state = snapshot;
                Err(err)
            }
        }
    }

    async fn drive_phases(
        &mut self,
        action: &PlayerAction,
        ctx: &mut TurnContext,
        sink: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<TurnResult, TurnError> {
        let game = self.game;
        let state = &mut *self.state;
        let skip_ai = action.skip_ai;
        let mut ai_failed = false;

        // Phase 2: endings accept no further actions.
        if game
            .node(&state.current_node)
            .map(|n| n.is_ending())
            .unwrap_or(false)
        {
            return Err(TurnError::SessionEnded);
        }

        // Phase 3: who is here.
        presence::refresh(game, state, ctx);

        // Phase 4: gate truth table.
        gates::evaluate(game, state, ctx);

        // Phase 5: action summary.
        ctx.action_summary = action::format_summary(game, action);
        emit(
            sink,
            StreamEvent::ActionSummary {
                text: ctx.action_summary.clone(),
            },
        )
        .await?;

        // Phase 6 (AI path only): node entry effects for a fresh visit.
        if !skip_ai && !ctx.skip_node_effects {
            nodes::run_pending_entry_effects(game, state, ctx);
        }

        // Phase 7: the deterministic action itself.
        match action::execute(game, state, ctx, action) {
            Ok(()) => {}
            Err(StateError::InvalidAction(reason)) => {
                return Err(TurnError::InvalidAction(reason));
            }
            Err(StateError::UnknownId { namespace, id }) => {
                return Err(TurnError::InvalidAction(format!(
                    "unknown {namespace} '{id}'"
                )));
            }
            Err(err) => return Err(TurnError::Internal(err.to_string())),
        }

        // Phase 8: world events react to the action.
        events::run(game, state, ctx);

        // Phases 9–14: the Writer/Checker pair.
        if !skip_ai && !ctx.forced_finalize {
            ai_failed = self.ai_phases(ctx, sink).await?;
        }

        let state = &mut *self.state;

        // Phase 15: node transitions (queued goto first, then authored).
        nodes::resolve_transitions(game, state, ctx);

        // Phase 16: modifier auto-activation (pre-time).
        modifiers::auto_activate(game, state, ctx);

        // Phase 17: discovery.
        discovery::update(game, state, ctx);

        // Phase 18: clock, decay, cooldowns, then modifier durations over
        // everything the turn advanced.
        let action_minutes = ctx.time_advance_minutes;
        time::advance(game, state, ctx, action_minutes);
        let elapsed = ctx.minutes_elapsed;
        modifiers::tick(game, state, ctx, elapsed);

        // Phase 19: arcs.
        arcs::process(game, state, ctx);

        // Phase 20: next choice list; event-injected choices persist so a
        // later `choice` action can still resolve them.
        choices::build(game, state, ctx);
        state.event_choices = ctx.event_choices.clone();

        // Phase 21: stable snapshot envelope.
        let state_summary = summary::build(game, state, ctx);

        // Phase 22: record narrative; persistence happens at the session
        // layer once the turn has committed.
        let narrative = ctx.narrative_parts.join("\n\n");
        state.push_narrative(narrative.clone());

        debug!(
            target: "turn",
            turn = ctx.turn,
            minutes = ctx.minutes_elapsed,
            events = ctx.events_fired.len(),
            "turn complete"
        );

        Ok(TurnResult {
            narrative,
            state_summary,
            choices: ctx.choices.clone(),
            action_summary: ctx.action_summary.clone(),
            events_fired: ctx.events_fired.clone(),
            milestones_reached: ctx.milestones_reached.clone(),
            ai_failed,
        })
    }

    /// Phases 9–14. Returns whether the AI path degraded.
    async fn ai_phases(
        &mut self,
        ctx: &mut TurnContext,
        sink: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<bool, TurnError> {
        let game = self.game;
        let mut ai_failed = false;

        // Phase 9: envelope assembly. The summary cadence is decided here
        // so Writer and Checker see the same request.
        self.state.ai_turns_since_summary += 1;
        let request_summary = self.state.ai_turns_since_summary >= self.settings.summary_interval;
        choices::build(game, self.state, ctx);
        let envelope = build_envelope(game, self.state, ctx, self.settings, request_summary);

        // Phase 10: Writer.
        let writer_text = match self.call_writer(&envelope, sink).await? {
            Some(text) => text,
            None => {
                ai_failed = true;
                String::new()
            }
        };

        // Phase 11: Checker (skipped when the Writer produced nothing).
        let checker_output = if writer_text.is_empty() {
            None
        } else {
            emit(
                sink,
                StreamEvent::CheckerStatus {
                    status: "checking".into(),
                },
            )
            .await?;
            let output = self.call_checker(&envelope, &writer_text).await;
            if output.is_none() {
                ai_failed = true;
            }
            emit(
                sink,
                StreamEvent::CheckerStatus {
                    status: if output.is_some() {
                        "applied".into()
                    } else {
                        "failed".into()
                    },
                },
            )
            .await?;
            output
        };

        // Phase 12: reconcile — keep prose, strip state language.
        let prose = reconcile_narrative(&writer_text);
        if !prose.is_empty() {
            ctx.narrative_parts.push(prose);
        }

        // Phase 13: Checker deltas as an effect batch.
        if let Some(output) = &checker_output {
            apply_checker_output(game, self.state, ctx, output, request_summary);
        }

        // Phase 14: post-AI hooks. The summary cadence self-heals: the
        // counter only resets when a summary actually landed, so a missed
        // request repeats next AI turn.

        Ok(ai_failed)
    }

    /// Phase 10 with deadline and optional streaming. `None` = degraded.
    async fn call_writer(
        &mut self,
        envelope: &crate::ai::TurnEnvelope,
        sink: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<Option<String>, TurnError> {
        let request = GenerateRequest {
            kind: PromptKind::Writer,
            model: self.settings.writer_model.clone(),
            prompt: writer_prompt(envelope),
            json_mode: false,
        };

        match sink {
            Some(sink) => {
                let stream = tokio::time::timeout(
                    self.settings.deadline,
                    self.ai.generate_stream(request),
                )
                .await;
                let mut rx = match stream {
                    Ok(Ok(rx)) => rx,
                    Ok(Err(err)) => {
                        warn!(target: "ai", error = %err, "writer stream failed, degrading");
                        return Ok(None);
                    }
                    Err(_) => {
                        warn!(target: "ai", "writer stream timed out, degrading");
                        return Ok(None);
                    }
                };
                let mut text = String::new();
                loop {
                    let chunk = tokio::time::timeout(self.settings.deadline, rx.recv()).await;
                    match chunk {
                        Ok(Some(chunk)) => {
                            text.push_str(&chunk);
                            emit(Some(sink), StreamEvent::NarrativeChunk { text: chunk }).await?;
                        }
                        Ok(None) => break,
                        Err(_) => {
                            warn!(target: "ai", "writer stream stalled, degrading");
                            return Ok(None);
                        }
                    }
                }
                Ok(Some(text))
            }
            None => {
                match tokio::time::timeout(self.settings.deadline, self.ai.generate(request)).await
                {
                    Ok(Ok(text)) => Ok(Some(text)),
                    Ok(Err(err)) => {
                        warn!(target: "ai", error = %err, "writer failed, degrading");
                        Ok(None)
                    }
                    Err(_) => {
                        warn!(target: "ai", "writer timed out, degrading");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Phase 11: one retry with a JSON-only directive, then give up.
    async fn call_checker(
        &mut self,
        envelope: &crate::ai::TurnEnvelope,
        writer_text: &str,
    ) -> Option<crate::ai::CheckerOutput> {
        let base_prompt = checker_prompt(envelope, writer_text);
        for attempt in 0..2 {
            let prompt = if attempt == 0 {
                base_prompt.clone()
            } else {
                format!("{base_prompt}\nEmit JSON only. No prose, no code fences.")
            };
            let request = GenerateRequest {
                kind: PromptKind::Checker,
                model: self.settings.checker_model.clone(),
                prompt,
                json_mode: true,
            };
            match tokio::time::timeout(self.settings.deadline, self.ai.generate(request)).await {
                Ok(Ok(raw)) => {
                    if let Some(output) = parse_checker_output(&raw) {
                        return Some(output);
                    }
                    warn!(target: "ai", attempt, "checker returned malformed JSON");
                }
                Ok(Err(err)) => {
                    warn!(target: "ai", error = %err, "checker failed");
                    return None;
                }
                Err(_) => {
                    warn!(target: "ai", "checker timed out");
                    return None;
                }
            }
        }
        None
    }
}

/// Phase 12: strip state-language tokens the Writer should not emit.
///
/// Code fences, bracketed stat tags, and trailing JSON objects are
/// dropped; the prose itself is preserved verbatim.
fn reconcile_narrative(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    if text.starts_with("```") {
        text = text
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string();
    }
    // A trailing JSON object is Checker-speak in the wrong channel.
    if let Some(idx) = text.rfind("\n{")
        && text.trim_end().ends_with('}')
    {
        text.truncate(idx);
    }
    text.lines()
        .filter(|line| {
            let l = line.trim_start();
            !(l.starts_with("STATE:") || l.starts_with("[meter") || l.starts_with("[state"))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

async fn emit(
    sink: Option<&mpsc::Sender<StreamEvent>>,
    event: StreamEvent,
) -> Result<(), TurnError> {
    if let Some(sink) = sink
        && sink.send(event).await.is_err()
    {
        // Receiver went away: cooperative cancellation.
        return Err(TurnError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_strips_fences_and_state_lines() {
        let raw = "```\nShe smiles.\nSTATE: trust +5\n```";
        assert_eq!(reconcile_narrative(raw), "She smiles.");
    }

    #[test]
    fn reconcile_drops_trailing_json() {
        let raw = "A quiet moment passes.\n{\"meters\": {}}";
        assert_eq!(reconcile_narrative(raw), "A quiet moment passes.");
    }

    #[test]
    fn reconcile_keeps_plain_prose() {
        let raw = "The café hums around you.";
        assert_eq!(reconcile_narrative(raw), raw);
    }
}
