//! State persistence layer
//!
//! Every read and write is scoped to a user id. The in-memory store is used
//! for development and tests; Postgres is selected when a database URL is
//! configured.

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::models::{
    ConversationTurn, Goal, GoalProgressUpdate, GoalStatus, IncomeEntry, NewIncome,
};
use crate::Result;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

pub mod postgres;
pub use postgres::PostgresStore;

/// Trait for the financial store collaborator
#[async_trait::async_trait]
pub trait FinanceStore: Send + Sync {
    /// Income dated within `[from, to]`, newest first.
    async fn income_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IncomeEntry>>;

    /// Goals with the given status, newest first.
    async fn goals_with_status(&self, user_id: Uuid, status: GoalStatus) -> Result<Vec<Goal>>;

    async fn insert_income(&self, user_id: Uuid, income: NewIncome) -> Result<IncomeEntry>;

    /// Conditional update by goal id and owner. Missing rows are an error.
    async fn update_goal_progress(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        update: GoalProgressUpdate,
    ) -> Result<()>;

    async fn append_turns(&self, turns: &[ConversationTurn]) -> Result<()>;

    /// The `limit` most recent turns, oldest first.
    async fn recent_turns(&self, user_id: Uuid, limit: usize) -> Result<Vec<ConversationTurn>>;
}

/// In-memory store for development
pub struct InMemoryStore {
    income: Arc<RwLock<Vec<IncomeEntry>>>,
    goals: Arc<RwLock<HashMap<Uuid, Goal>>>,
    turns: Arc<RwLock<Vec<ConversationTurn>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            income: Arc::new(RwLock::new(Vec::new())),
            goals: Arc::new(RwLock::new(HashMap::new())),
            turns: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed a goal directly (stands in for the goals CRUD path)
    pub async fn insert_goal(&self, goal: Goal) {
        let mut goals = self.goals.write().await;
        goals.insert(goal.id, goal);
    }

    /// Seed an income row directly (stands in for the income CRUD path)
    pub async fn insert_income_entry(&self, entry: IncomeEntry) {
        let mut income = self.income.write().await;
        income.push(entry);
    }

    pub async fn goal(&self, goal_id: Uuid) -> Option<Goal> {
        let goals = self.goals.read().await;
        goals.get(&goal_id).cloned()
    }

    pub async fn income_for(&self, user_id: Uuid) -> Vec<IncomeEntry> {
        let income = self.income.read().await;
        income
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FinanceStore for InMemoryStore {

    async fn income_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IncomeEntry>> {
        let income = self.income.read().await;

        let mut rows: Vec<IncomeEntry> = income
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.date >= from && entry.date <= to)
            .cloned()
            .collect();

        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn goals_with_status(&self, user_id: Uuid, status: GoalStatus) -> Result<Vec<Goal>> {
        let goals = self.goals.read().await;

        let mut rows: Vec<Goal> = goals
            .values()
            .filter(|goal| goal.user_id == user_id && goal.status == status)
            .cloned()
            .collect();

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn insert_income(&self, user_id: Uuid, income: NewIncome) -> Result<IncomeEntry> {
        let entry = IncomeEntry {
            id: Uuid::new_v4(),
            user_id,
            amount: income.amount,
            source: income.source,
            date: income.date,
            notes: income.notes,
            created_at: Utc::now(),
        };

        let mut rows = self.income.write().await;
        rows.push(entry.clone());
        Ok(entry)
    }

    async fn update_goal_progress(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        update: GoalProgressUpdate,
    ) -> Result<()> {
        let mut goals = self.goals.write().await;

        match goals.get_mut(&goal_id) {
            Some(goal) if goal.user_id == user_id => {
                goal.current_amount = update.current_amount;
                goal.status = update.status;
                Ok(())
            }
            _ => Err(AgentError::DatabaseError(format!(
                "goal {} not found for user",
                goal_id
            ))),
        }
    }

    async fn append_turns(&self, turns: &[ConversationTurn]) -> Result<()> {
        let mut rows = self.turns.write().await;
        rows.extend(turns.iter().cloned());
        Ok(())
    }

    async fn recent_turns(&self, user_id: Uuid, limit: usize) -> Result<Vec<ConversationTurn>> {
        let rows = self.turns.read().await;

        // Appends are chronological, so walk backwards and flip.
        let mut recent: Vec<ConversationTurn> = rows
            .iter()
            .rev()
            .filter(|turn| turn.user_id == user_id)
            .take(limit)
            .cloned()
            .collect();

        recent.reverse();
        Ok(recent)
    }
}

/// Pick the store backend from configuration
pub fn build_store(config: &AppConfig) -> Arc<dyn FinanceStore> {
    if let Some(url) = config.database_url.as_deref() {
        match PostgresStore::connect_lazy(url) {
            Ok(store) => {
                info!("Finance store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Finance store backend: in-memory");
    Arc::new(InMemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatRole, IncomeSource};
    use rust_decimal_macros::dec;

    fn goal(user_id: Uuid, name: &str, status: GoalStatus, age_days: i64) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            target_amount: dec!(1000),
            current_amount: dec!(0),
            status,
            deadline: None,
            created_at: Utc::now() - chrono::Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn test_goals_are_scoped_and_newest_first() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        store.insert_goal(goal(user, "Old", GoalStatus::Active, 10)).await;
        store.insert_goal(goal(user, "New", GoalStatus::Active, 1)).await;
        store.insert_goal(goal(user, "Done", GoalStatus::Completed, 2)).await;
        store.insert_goal(goal(other, "Theirs", GoalStatus::Active, 0)).await;

        let active = store.goals_with_status(user, GoalStatus::Active).await.unwrap();
        let names: Vec<&str> = active.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Old"]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_order_by_id() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let created_at = Utc::now();

        for n in 1..=5u128 {
            let mut g = goal(user, &format!("Fund {}", n), GoalStatus::Active, 0);
            g.id = Uuid::from_u128(n);
            g.created_at = created_at;
            store.insert_goal(g).await;
        }

        let active = store.goals_with_status(user, GoalStatus::Active).await.unwrap();
        let names: Vec<&str> = active.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Fund 5", "Fund 4", "Fund 3", "Fund 2", "Fund 1"]);
    }

    #[tokio::test]
    async fn test_update_rejects_foreign_goal() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let g = goal(owner, "Rent", GoalStatus::Active, 0);
        let goal_id = g.id;
        store.insert_goal(g).await;

        let update = GoalProgressUpdate {
            current_amount: dec!(50),
            status: GoalStatus::Active,
        };
        let result = store
            .update_goal_progress(Uuid::new_v4(), goal_id, update)
            .await;
        assert!(result.is_err());
        assert_eq!(store.goal(goal_id).await.unwrap().current_amount, dec!(0));
    }

    #[tokio::test]
    async fn test_income_window_is_inclusive() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();

        for date in [from, to, from.pred_opt().unwrap()] {
            store
                .insert_income(
                    user,
                    NewIncome {
                        amount: dec!(10),
                        source: IncomeSource::Bounty,
                        date,
                        notes: None,
                    },
                )
                .await
                .unwrap();
        }

        let rows = store.income_between(user, from, to).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, to);
    }

    #[tokio::test]
    async fn test_recent_turns_oldest_first() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();

        let turns: Vec<ConversationTurn> = (0..5)
            .map(|i| ConversationTurn {
                user_id: user,
                role: if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant },
                message: format!("turn {}", i),
                timestamp: Utc::now(),
            })
            .collect();
        store.append_turns(&turns).await.unwrap();

        let recent = store.recent_turns(user, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "turn 3");
        assert_eq!(recent[1].message, "turn 4");
    }
}
