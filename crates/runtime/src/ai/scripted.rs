//! Scripted transport: queued responses for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{AiError, GenerateRequest, ModelClient, PromptKind};

/// One scripted reply.
#[derive(Clone, Debug)]
pub struct ScriptedReply {
    pub kind: PromptKind,
    pub text: String,
}

/// A [`ModelClient`] that replays queued responses in order, recording
/// every prompt it is given. Writer replies stream word by word so the
/// stream/no-stream equivalence property gets a real multi-chunk path.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_writer(&self, text: impl Into<String>) {
        self.replies.lock().unwrap().push_back(ScriptedReply {
            kind: PromptKind::Writer,
            text: text.into(),
        });
    }

    pub fn push_checker(&self, json: impl Into<String>) {
        self.replies.lock().unwrap().push_back(ScriptedReply {
            kind: PromptKind::Checker,
            text: json.into(),
        });
    }

    /// Prompts seen so far, for assertions.
    pub fn seen_prompts(&self) -> Vec<GenerateRequest> {
        self.prompts.lock().unwrap().clone()
    }

    fn pop_for(&self, kind: PromptKind) -> Result<String, AiError> {
        let mut replies = self.replies.lock().unwrap();
        match replies.front() {
            Some(front) if front.kind == kind => Ok(replies.pop_front().unwrap().text),
            _ => Err(AiError::Exhausted),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, AiError> {
        let kind = request.kind;
        self.prompts.lock().unwrap().push(request);
        self.pop_for(kind)
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<mpsc::Receiver<String>, AiError> {
        let kind = request.kind;
        self.prompts.lock().unwrap().push(request);
        let text = self.pop_for(kind)?;
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for word in text.split_inclusive(' ') {
                if tx.send(word.to_string()).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
