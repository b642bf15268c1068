//! Language model interface
//!
//! The orchestrator talks to the model only through `ChatModel`, so the
//! Gemini client can be swapped for a scripted model in tests.

use crate::error::AgentError;
use crate::tools::{ActionCall, ActionDeclaration};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text(String),
    ActionCall(ActionCall),
    ActionResult { name: String, result: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub parts: Vec<MessagePart>,
}

impl ModelMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            parts: vec![MessagePart::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Model,
            parts: vec![MessagePart::Text(text.into())],
        }
    }
}

/// Everything one model invocation sees
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub system_instruction: &'a str,
    pub messages: &'a [ModelMessage],
    pub actions: &'a [ActionDeclaration],
}

/// The model's content for one invocation, parts in emitted order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub parts: Vec<MessagePart>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![MessagePart::Text(text.into())],
        }
    }

    pub fn calls(calls: Vec<ActionCall>) -> Self {
        Self {
            parts: calls.into_iter().map(MessagePart::ActionCall).collect(),
        }
    }

    /// Concatenated text parts
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn action_calls(&self) -> Vec<&ActionCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::ActionCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn into_message(self) -> ModelMessage {
        ModelMessage {
            role: ModelRole::Model,
            parts: self.parts,
        }
    }
}

/// Trait for model invocation (one request, one reply, no retries)
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply>;
}

/// Captured copy of a request seen by `ScriptedModel`
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_instruction: String,
    pub messages: Vec<ModelMessage>,
    pub action_names: Vec<&'static str>,
}

/// Replays queued replies in order and records every request.
/// Keeps the pipeline testable without a live model.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(replies: Vec<Result<ModelReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system_instruction: request.system_instruction.to_string(),
                messages: request.messages.to_vec(),
                action_names: request.actions.iter().map(|a| a.name).collect(),
            });
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| AgentError::LlmError("scripted model poisoned".into()))?
            .pop_front();

        next.unwrap_or_else(|| Err(AgentError::LlmError("scripted model has no replies left".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_helpers() {
        let reply = ModelReply {
            parts: vec![
                MessagePart::Text("Sure, ".into()),
                MessagePart::ActionCall(ActionCall::new("add_income", json!({}))),
                MessagePart::Text("done.".into()),
            ],
        };

        assert_eq!(reply.joined_text(), "Sure, done.");
        assert_eq!(reply.action_calls().len(), 1);
        assert_eq!(reply.into_message().role, ModelRole::Model);
    }

    #[tokio::test]
    async fn test_scripted_model_runs_dry() {
        let model = ScriptedModel::new(vec![ModelReply::text("hi")]);
        let messages = vec![ModelMessage::user_text("hello")];
        let request = ModelRequest {
            system_instruction: "sys",
            messages: &messages,
            actions: &[],
        };

        assert_eq!(model.generate(request.clone()).await.unwrap().joined_text(), "hi");
        assert!(model.generate(request).await.is_err());
        assert_eq!(model.requests().len(), 2);
    }
}
