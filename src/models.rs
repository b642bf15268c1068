//! Core data models for the chat action service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IncomeSource {
    Hackathon,
    Bounty,
    Freelance,
    Crypto,
    Other,
}

impl IncomeSource {
    pub const ALL: [IncomeSource; 5] = [
        IncomeSource::Hackathon,
        IncomeSource::Bounty,
        IncomeSource::Freelance,
        IncomeSource::Crypto,
        IncomeSource::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeSource::Hackathon => "hackathon",
            IncomeSource::Bounty => "bounty",
            IncomeSource::Freelance => "freelance",
            IncomeSource::Crypto => "crypto",
            IncomeSource::Other => "other",
        }
    }
}

impl FromStr for IncomeSource {
    type Err = ();

    /// Exact match only; the catalog tells the model the lowercase names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IncomeSource::ALL
            .iter()
            .copied()
            .find(|source| source.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Paused => "paused",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "paused" => Ok(GoalStatus::Paused),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(()),
        }
    }
}

//
// ================= Income =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomeEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub source: IncomeSource,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated income ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncome {
    pub amount: Decimal,
    pub source: IncomeSource,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

//
// ================= Goal =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub status: GoalStatus,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Fields a guarded progress update is allowed to write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalProgressUpdate {
    pub current_amount: Decimal,
    pub status: GoalStatus,
}

//
// ================= Snapshot =================
//

/// Per-request summary of recent income and active goals. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialSnapshot {
    pub total_income_last_30_days: Decimal,
    pub income_count: usize,
    pub goals: Vec<GoalSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalSnapshot {
    pub name: String,
    pub target: Decimal,
    pub current: Decimal,
    pub progress_percent: i64,
    pub deadline: Option<NaiveDate>,
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub user_id: Uuid,
    pub role: ChatRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A prior turn as supplied by the client, without ownership metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub message: String,
}

impl fmt::Display for IncomeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
