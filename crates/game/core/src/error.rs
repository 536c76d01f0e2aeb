//! Core error types.
//!
//! Soft failures the player should see (lock refusals, unwilling
//! companions) are not errors; they are [`crate::turn::Refusal`] values
//! folded into the narrative. Errors here are contract violations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("unknown {namespace} id '{id}'")]
    UnknownId { namespace: &'static str, id: String },

    #[error("state invariant violated: {0}")]
    Invariant(String),

    #[error("session has ended (current node is an ending)")]
    SessionEnded,

    #[error("invalid action: {0}")]
    InvalidAction(String),
}

impl StateError {
    pub fn unknown(namespace: &'static str, id: impl Into<String>) -> Self {
        Self::UnknownId {
            namespace,
            id: id.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}
