//! Chat orchestrator - drives one chat turn end to end
//!
//! VALIDATE → SNAPSHOT → DRAFT (pass 1) → EXECUTE → FINALIZE (pass 2) → RECORD
//!
//! Pass 2 only happens when pass 1 asked for actions. Actions run one at a
//! time, in the order the model emitted them.

use crate::audit::AuditLog;
use crate::context::{assemble_snapshot, Clock};
use crate::error::AgentError;
use crate::execution::{ActionExecutor, ActionOutcome};
use crate::llm::{ChatModel, MessagePart, ModelMessage, ModelRequest, ModelRole};
use crate::models::{ChatRole, ConversationTurn, HistoryEntry};
use crate::prompt::build_system_prompt;
use crate::state::FinanceStore;
use crate::tools::limits::MAX_ACTIONS_PER_MESSAGE;
use crate::tools::{catalog, ActionCall, ActionDeclaration};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 1000;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, I could not generate a response.";

/// One executed action and what came of it
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedAction {
    pub name: String,
    pub outcome: ActionOutcome,
}

/// Final result of a chat turn
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub message: String,
    pub actions: Vec<ExecutedAction>,
}

pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    store: Arc<dyn FinanceStore>,
    executor: ActionExecutor,
    audit_log: AuditLog,
    clock: Arc<dyn Clock>,
    actions: Vec<ActionDeclaration>,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<dyn FinanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            model,
            executor: ActionExecutor::new(store.clone()),
            audit_log: AuditLog::new(store.clone()),
            store,
            clock,
            actions: catalog(),
        }
    }

    /// Run one chat turn for an authenticated user
    pub async fn handle_message(
        &self,
        user_id: Uuid,
        message: &str,
        history: &[HistoryEntry],
    ) -> Result<ChatReply> {
        let start_time = Instant::now();
        let received_at = Utc::now();

        validate_message(message)?;

        info!(
            user_id = %user_id,
            message_chars = message.chars().count(),
            history_len = history.len(),
            "Orchestrator: chat turn started"
        );

        // === SNAPSHOT ===
        let today = self.clock.today();
        let snapshot = assemble_snapshot(self.store.as_ref(), user_id, today).await?;
        let system_prompt = build_system_prompt(&snapshot);

        let mut messages: Vec<ModelMessage> = history.iter().map(history_message).collect();
        messages.push(ModelMessage::user_text(message));

        // === DRAFT ===
        debug!(phase = "Drafting", "Pass 1");
        let draft = self
            .model
            .generate(ModelRequest {
                system_instruction: &system_prompt,
                messages: &messages,
                actions: &self.actions,
            })
            .await?;

        let calls: Vec<ActionCall> = draft.action_calls().into_iter().cloned().collect();

        let (reply_text, actions) = if calls.is_empty() {
            (draft.joined_text(), Vec::new())
        } else {
            if calls.len() > MAX_ACTIONS_PER_MESSAGE {
                warn!(
                    user_id = %user_id,
                    requested = calls.len(),
                    "Too many actions requested; nothing executed"
                );
                return Err(AgentError::TooManyActions {
                    requested: calls.len(),
                    max: MAX_ACTIONS_PER_MESSAGE,
                });
            }

            // === EXECUTE ===
            debug!(phase = "Executing", call_count = calls.len(), "Running actions");
            let mut actions = Vec::with_capacity(calls.len());
            for call in &calls {
                let outcome = self.executor.execute(user_id, call, today).await;
                actions.push(ExecutedAction {
                    name: call.name.clone(),
                    outcome,
                });
            }

            // === FINALIZE ===
            debug!(phase = "Finalizing", "Pass 2");
            messages.push(draft.into_message());
            messages.push(ModelMessage {
                role: ModelRole::User,
                parts: actions
                    .iter()
                    .map(|action| MessagePart::ActionResult {
                        name: action.name.clone(),
                        result: action.outcome.to_string(),
                    })
                    .collect(),
            });

            let finalized = self
                .model
                .generate(ModelRequest {
                    system_instruction: &system_prompt,
                    messages: &messages,
                    actions: &self.actions,
                })
                .await?;

            if !finalized.action_calls().is_empty() {
                warn!("Model requested actions in pass 2; ignoring them");
            }

            (finalized.joined_text(), actions)
        };

        let reply = if reply_text.trim().is_empty() {
            EMPTY_REPLY_FALLBACK.to_string()
        } else {
            reply_text
        };

        // === RECORD ===
        self.audit_log
            .record_exchange(user_id, message, &reply, received_at)
            .await?;

        debug!(phase = "Done", "Exchange recorded");
        info!(
            user_id = %user_id,
            actions = actions.len(),
            succeeded = actions.iter().filter(|a| a.outcome.is_success()).count(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Orchestrator: chat turn completed"
        );

        Ok(ChatReply {
            message: reply,
            actions,
        })
    }

    /// Stored conversation for a user, oldest first
    pub async fn history(&self, user_id: Uuid, limit: usize) -> Result<Vec<ConversationTurn>> {
        self.audit_log.recent(user_id, limit).await
    }
}

fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(AgentError::InvalidRequest("Message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AgentError::InvalidRequest(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

fn history_message(entry: &HistoryEntry) -> ModelMessage {
    match entry.role {
        ChatRole::User => ModelMessage::user_text(entry.message.clone()),
        ChatRole::Assistant => ModelMessage::model_text(entry.message.clone()),
    }
}
