//! Postgres-backed finance store
//!
//! Tables are created on first use. Every statement filters on `user_id`
//! in addition to whatever row-level policy the database enforces.

use crate::error::AgentError;
use crate::models::{
    ChatRole, ConversationTurn, Goal, GoalProgressUpdate, GoalStatus, IncomeEntry, IncomeSource,
    NewIncome,
};
use crate::state::FinanceStore;
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS income (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL,
      amount NUMERIC(12, 2) NOT NULL CHECK (amount > 0),
      source TEXT NOT NULL,
      date DATE NOT NULL,
      notes TEXT,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_income_user_date ON income (user_id, date);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS goals (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL,
      name TEXT NOT NULL,
      target_amount NUMERIC(12, 2) NOT NULL CHECK (target_amount > 0),
      current_amount NUMERIC(12, 2) NOT NULL DEFAULT 0 CHECK (current_amount >= 0),
      status TEXT NOT NULL DEFAULT 'active',
      deadline DATE,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_history (
      id BIGSERIAL PRIMARY KEY,
      user_id UUID NOT NULL,
      role TEXT NOT NULL,
      message TEXT NOT NULL,
      timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_chat_history_user_time ON chat_history (user_id, timestamp);
    "#,
];

pub struct PostgresStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(5).connect_lazy(url)?;
        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SCHEMA_STATEMENTS {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::DatabaseError(format!("Failed to initialize schema: {}", e))
            })?;

        Ok(())
    }
}

fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> AgentError + '_ {
    move |e| AgentError::DatabaseError(format!("{}: {}", context, e))
}

fn income_from_row(row: &PgRow) -> Result<IncomeEntry> {
    let source: String = row.try_get("source")?;
    let source = source.parse::<IncomeSource>().map_err(|_| {
        AgentError::DatabaseError(format!("Unknown income source in store: {}", source))
    })?;

    Ok(IncomeEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get::<Decimal, _>("amount")?,
        source,
        date: row.try_get::<NaiveDate, _>("date")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn goal_from_row(row: &PgRow) -> Result<Goal> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<GoalStatus>().map_err(|_| {
        AgentError::DatabaseError(format!("Unknown goal status in store: {}", status))
    })?;

    Ok(Goal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        target_amount: row.try_get::<Decimal, _>("target_amount")?,
        current_amount: row.try_get::<Decimal, _>("current_amount")?,
        status,
        deadline: row.try_get::<Option<NaiveDate>, _>("deadline")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait::async_trait]
impl FinanceStore for PostgresStore {

    async fn income_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IncomeEntry>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount, source, date, notes, created_at
            FROM income
            WHERE user_id = $1 AND date >= $2 AND date <= $3
            ORDER BY date DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load income"))?;

        rows.iter().map(income_from_row).collect()
    }

    async fn goals_with_status(&self, user_id: Uuid, status: GoalStatus) -> Result<Vec<Goal>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, target_amount, current_amount, status, deadline, created_at
            FROM goals
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load goals"))?;

        rows.iter().map(goal_from_row).collect()
    }

    async fn insert_income(&self, user_id: Uuid, income: NewIncome) -> Result<IncomeEntry> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO income (id, user_id, amount, source, date, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, amount, source, date, notes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(income.amount)
        .bind(income.source.as_str())
        .bind(income.date)
        .bind(&income.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to insert income"))?;

        income_from_row(&row)
    }

    async fn update_goal_progress(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        update: GoalProgressUpdate,
    ) -> Result<()> {
        self.ensure_schema().await?;

        let result = sqlx::query(
            "UPDATE goals SET current_amount = $1, status = $2 WHERE id = $3 AND user_id = $4",
        )
        .bind(update.current_amount)
        .bind(update.status.as_str())
        .bind(goal_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update goal"))?;

        if result.rows_affected() == 0 {
            return Err(AgentError::DatabaseError(format!(
                "goal {} not found for user",
                goal_id
            )));
        }

        Ok(())
    }

    async fn append_turns(&self, turns: &[ConversationTurn]) -> Result<()> {
        self.ensure_schema().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin chat history transaction"))?;

        for turn in turns {
            sqlx::query(
                "INSERT INTO chat_history (user_id, role, message, timestamp) VALUES ($1, $2, $3, $4)",
            )
            .bind(turn.user_id)
            .bind(turn.role.as_str())
            .bind(&turn.message)
            .bind(turn.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert chat turn"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit chat history"))?;

        Ok(())
    }

    async fn recent_turns(&self, user_id: Uuid, limit: usize) -> Result<Vec<ConversationTurn>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT user_id, role, message, timestamp
            FROM chat_history
            WHERE user_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load chat history"))?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows.iter().rev() {
            let role: String = row.try_get("role")?;
            let role = role.parse::<ChatRole>().map_err(|_| {
                AgentError::DatabaseError(format!("Unknown chat role in store: {}", role))
            })?;

            turns.push(ConversationTurn {
                user_id: row.try_get("user_id")?,
                role,
                message: row.try_get("message")?,
                timestamp: row.try_get("timestamp")?,
            });
        }

        Ok(turns)
    }
}
