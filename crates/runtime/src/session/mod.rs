//! Per-session workers and the cloneable session handle.
//!
//! One background task owns each session's [`GameState`]; clients reach
//! it through a FIFO command channel, which makes the turn the unit of
//! mutual exclusion without explicit locks. Sessions are independent and
//! run concurrently.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use plotplay_core::defs::Game;
use plotplay_core::state::{new_session_state, GameState};
use plotplay_core::PlayerAction;

use crate::config::{AiSettings, PersistenceSettings, RuntimeConfig};
use crate::error::{Result, RuntimeError, TurnError};
use crate::repository::{FileRepository, NullRepository, StateRepository};
use crate::turn::{StreamEvent, TurnResult, TurnRunner};
use crate::ai::ModelClient;

/// Session lifecycle notifications for observers.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    TurnCompleted { turn: u64, events_fired: Vec<String> },
    TurnFailed { reason: String },
    SessionEnded,
}

enum Command {
    ExecuteTurn {
        action: PlayerAction,
        reply: oneshot::Sender<std::result::Result<TurnResult, TurnError>>,
    },
    ExecuteTurnStream {
        action: PlayerAction,
        events: mpsc::Sender<StreamEvent>,
    },
    QueryState {
        reply: oneshot::Sender<GameState>,
    },
}

/// Background task that owns one session's state.
struct SessionWorker {
    session_id: String,
    game: Arc<Game>,
    state: GameState,
    ai: Arc<dyn ModelClient>,
    settings: AiSettings,
    repository: Arc<dyn StateRepository>,
    command_rx: mpsc::Receiver<Command>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionWorker {
    async fn run(mut self) {
        while let Some(command) = self.command_rx.recv().await {
            match command {
                Command::ExecuteTurn { action, reply } => {
                    let result = self.execute(action, None).await;
                    let _ = reply.send(result);
                }
                Command::ExecuteTurnStream { action, events } => {
                    // The Complete event carries the result; failures are
                    // broadcast and the stream simply ends.
                    let _ = self.execute(action, Some(events)).await;
                }
                Command::QueryState { reply } => {
                    let _ = reply.send(self.state.clone());
                }
            }
        }
        let _ = self.event_tx.send(SessionEvent::SessionEnded);
        info!(target: "session", session = self.session_id.as_str(), "session worker stopped");
    }

    async fn execute(
        &mut self,
        action: PlayerAction,
        sink: Option<mpsc::Sender<StreamEvent>>,
    ) -> std::result::Result<TurnResult, TurnError> {
        let mut runner = TurnRunner {
            game: self.game.as_ref(),
            state: &mut self.state,
            ai: self.ai.as_ref(),
            settings: &self.settings,
        };
        let outcome = match sink {
            Some(sink) => runner.run_streaming(action, sink).await,
            None => runner.run(action).await,
        };

        match &outcome {
            Ok(result) => {
                if let Err(err) = self.repository.save(&self.session_id, &self.state) {
                    warn!(target: "session", error = %err, "snapshot save failed");
                }
                let _ = self.event_tx.send(SessionEvent::TurnCompleted {
                    turn: self.state.turn,
                    events_fired: result.events_fired.clone(),
                });
            }
            Err(err) => {
                let _ = self.event_tx.send(SessionEvent::TurnFailed {
                    reason: err.to_string(),
                });
            }
        }
        outcome
    }
}

/// Client-facing handle to one session.
///
/// Cloneable and cheap; commands funnel into the worker's FIFO channel,
/// so two actions from the same session are totally ordered by arrival.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    game: Arc<Game>,
    command_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn game(&self) -> &Arc<Game> {
        &self.game
    }

    /// Run one turn to completion.
    pub async fn execute(&self, action: PlayerAction) -> Result<TurnResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::ExecuteTurn {
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        let outcome = reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?;
        outcome.map_err(RuntimeError::Turn)
    }

    /// Run one turn, receiving stream events as it progresses. Dropping
    /// the receiver cancels the turn; the cancelled turn is not committed.
    pub async fn execute_stream(
        &self,
        action: PlayerAction,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let (events_tx, events_rx) = mpsc::channel(32);
        self.command_tx
            .send(Command::ExecuteTurnStream {
                action,
                events: events_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        Ok(events_rx)
    }

    /// Read-only snapshot of the session state.
    pub async fn query_state(&self) -> Result<GameState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::QueryState { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }
}

/// Owns every live session in the process.
pub struct SessionManager {
    config: RuntimeConfig,
    settings: AiSettings,
    ai: Arc<dyn ModelClient>,
    repository: Arc<dyn StateRepository>,
    sessions: RwLock<BTreeMap<String, SessionHandle>>,
    counter: AtomicU64,
}

impl SessionManager {
    pub fn new(
        config: RuntimeConfig,
        settings: AiSettings,
        ai: Arc<dyn ModelClient>,
        repository: Arc<dyn StateRepository>,
    ) -> Self {
        Self {
            config,
            settings,
            ai,
            repository,
            sessions: RwLock::new(BTreeMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Build a manager whose repository follows the persistence settings:
    /// a file repository under the configured data dir, or none at all.
    pub fn with_persistence(
        config: RuntimeConfig,
        settings: AiSettings,
        ai: Arc<dyn ModelClient>,
        persistence: &PersistenceSettings,
    ) -> Result<Self> {
        let repository: Arc<dyn StateRepository> = if persistence.enabled {
            Arc::new(
                FileRepository::new(&persistence.base_dir)
                    .map_err(|e| RuntimeError::Repository(e.to_string()))?,
            )
        } else {
            Arc::new(NullRepository)
        };
        Ok(Self::new(config, settings, ai, repository))
    }

    /// Start a session for a validated game. `seed` pins determinism;
    /// absent, one is derived from the clock.
    pub fn start_session(&self, game: Arc<Game>, seed: Option<u64>) -> Result<SessionHandle> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let session_id = format!("session_{stamp}_{n}");
        let base_seed = seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
                .unwrap_or(n)
        });

        let state = new_session_state(&game, base_seed);
        self.spawn(session_id, game, state)
    }

    /// Resume a persisted session.
    pub fn resume_session(&self, game: Arc<Game>, session_id: String) -> Result<SessionHandle> {
        let state = self
            .repository
            .load(&session_id)
            .map_err(|e| RuntimeError::Repository(e.to_string()))?
            .ok_or_else(|| RuntimeError::UnknownSession(session_id.clone()))?;
        self.spawn(session_id, game, state)
    }

    fn spawn(
        &self,
        session_id: String,
        game: Arc<Game>,
        state: GameState,
    ) -> Result<SessionHandle> {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let (event_tx, _) = broadcast::channel(self.config.event_buffer_size);

        let worker = SessionWorker {
            session_id: session_id.clone(),
            game: game.clone(),
            state,
            ai: self.ai.clone(),
            settings: self.settings.clone(),
            repository: self.repository.clone(),
            command_rx,
            event_tx: event_tx.clone(),
        };
        tokio::spawn(worker.run());

        let handle = SessionHandle {
            session_id: session_id.clone(),
            game,
            command_tx,
            event_tx,
        };
        self.sessions
            .write()
            .map_err(|_| RuntimeError::InvalidConfig("session registry poisoned".into()))?
            .insert(session_id, handle.clone());

        info!(target: "session", session = handle.session_id.as_str(), "session started");
        Ok(handle)
    }

    pub fn get(&self, session_id: &str) -> Result<SessionHandle> {
        self.sessions
            .read()
            .map_err(|_| RuntimeError::InvalidConfig("session registry poisoned".into()))?
            .get(session_id)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownSession(session_id.to_string()))
    }

    /// Drop a session; its worker stops once in-flight commands drain.
    pub fn end(&self, session_id: &str) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| RuntimeError::InvalidConfig("session registry poisoned".into()))?
            .remove(session_id);
        match removed {
            Some(_) => Ok(()),
            None => Err(RuntimeError::UnknownSession(session_id.to_string())),
        }
    }
}
