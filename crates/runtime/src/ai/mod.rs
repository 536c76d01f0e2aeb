//! The AI contract: Writer/Checker transport and prompt assembly.
//!
//! The core never talks to a model directly; it consumes this trait. A
//! production transport lives outside the runtime; the in-tree
//! [`ScriptedClient`] pins responses for tests and degraded operation.

mod checker;
mod envelope;
mod scripted;

pub use checker::{apply_checker_output, parse_checker_output, CheckerOutput};
pub use envelope::{build_envelope, checker_prompt, writer_prompt, TurnEnvelope};
pub use scripted::ScriptedClient;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Which half of the model pair a request is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
    Writer,
    Checker,
}

/// One generation request.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub kind: PromptKind,
    pub model: String,
    pub prompt: String,
    /// Ask the transport for strict-JSON output (Checker calls).
    pub json_mode: bool,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("generation timed out")]
    Timeout,

    #[error("no scripted response queued")]
    Exhausted,
}

/// An LLM transport able to serve both Writer and Checker calls.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One-shot generation (Checker, or Writer when not streaming).
    async fn generate(&self, request: GenerateRequest) -> std::result::Result<String, AiError>;

    /// Streaming generation for the Writer. The default implementation
    /// degrades to a single chunk so non-streaming transports still work.
    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<mpsc::Receiver<String>, AiError> {
        let text = self.generate(request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(text).await;
        Ok(rx)
    }
}
