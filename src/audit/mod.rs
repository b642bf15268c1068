//! Conversation audit trail
//!
//! Every completed exchange is appended as a user turn followed by an
//! assistant turn. Turns are never edited.

use crate::models::{ChatRole, ConversationTurn};
use crate::state::FinanceStore;
use crate::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct AuditLog {
    store: Arc<dyn FinanceStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    /// Append both turns of one exchange in a single store call.
    ///
    /// `received_at` stamps the user turn; the assistant turn is stamped now.
    /// Returns the exchange digest written to the log.
    pub async fn record_exchange(
        &self,
        user_id: Uuid,
        user_message: &str,
        assistant_message: &str,
        received_at: DateTime<Utc>,
    ) -> Result<String> {
        let completed_at = Utc::now().max(received_at);

        let turns = [
            ConversationTurn {
                user_id,
                role: ChatRole::User,
                message: user_message.to_string(),
                timestamp: received_at,
            },
            ConversationTurn {
                user_id,
                role: ChatRole::Assistant,
                message: assistant_message.to_string(),
                timestamp: completed_at,
            },
        ];

        self.store.append_turns(&turns).await?;

        let digest = compute_exchange_hash(&turns);
        info!(user_id = %user_id, digest = %digest, "Exchange recorded");

        Ok(digest)
    }

    /// Most recent turns for a user, oldest first
    pub async fn recent(&self, user_id: Uuid, limit: usize) -> Result<Vec<ConversationTurn>> {
        self.store.recent_turns(user_id, limit).await
    }
}

/// SHA256 over the ordered turns, for correlating log lines with stored rows
pub fn compute_exchange_hash(turns: &[ConversationTurn]) -> String {
    let mut hasher = Sha256::new();

    for turn in turns {
        hasher.update(turn.user_id.as_bytes());
        hasher.update(turn.role.as_str().as_bytes());
        hasher.update(turn.timestamp.to_rfc3339().as_bytes());
        hasher.update((turn.message.len() as u64).to_be_bytes());
        hasher.update(turn.message.as_bytes());
    }

    hex::encode(hasher.finalize())
}
