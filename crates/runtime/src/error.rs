//! Unified error types surfaced by the runtime API.

use thiserror::Error;
use tokio::sync::oneshot;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Why a turn did not commit.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The session's current node is an ending; no further actions.
    #[error("session has ended")]
    SessionEnded,

    /// Malformed or unavailable action; the client gets the reason.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// The client went away mid-stream; the turn was rolled back.
    #[error("turn cancelled by client")]
    Cancelled,

    /// Invariant breakage; state was rolled back to the turn snapshot.
    #[error("internal error, turn rolled back: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error("unknown session '{0}'")]
    UnknownSession(String),

    #[error("session worker command channel closed")]
    CommandChannelClosed,

    #[error("session worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("repository failure: {0}")]
    Repository(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
