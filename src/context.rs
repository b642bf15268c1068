//! Financial context assembly
//!
//! Reads the user's last 30 days of income and their active goals and
//! condenses them into a `FinancialSnapshot`. Rebuilt on every request so
//! the model always sees current balances.

use crate::models::{FinancialSnapshot, Goal, GoalSnapshot, GoalStatus};
use crate::state::FinanceStore;
use crate::Result;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};
use uuid::Uuid;

pub const SNAPSHOT_WINDOW_DAYS: i64 = 30;

/// Source of "today" for date windows and validation
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Current UTC calendar date
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Pinned date for tests and replays
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Build the snapshot for one user as of `today`
pub async fn assemble_snapshot(
    store: &dyn FinanceStore,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<FinancialSnapshot> {
    let window_start = today - Duration::days(SNAPSHOT_WINDOW_DAYS);

    let income = store.income_between(user_id, window_start, today).await?;
    let goals = store.goals_with_status(user_id, GoalStatus::Active).await?;

    let total_income_last_30_days: Decimal = income.iter().map(|entry| entry.amount).sum();

    let snapshot = FinancialSnapshot {
        total_income_last_30_days,
        income_count: income.len(),
        goals: goals.iter().map(goal_snapshot).collect(),
    };

    debug!(
        user_id = %user_id,
        income_count = snapshot.income_count,
        goal_count = snapshot.goals.len(),
        "Financial snapshot assembled"
    );

    Ok(snapshot)
}

fn goal_snapshot(goal: &Goal) -> GoalSnapshot {
    GoalSnapshot {
        name: goal.name.clone(),
        target: goal.target_amount,
        current: goal.current_amount,
        progress_percent: progress_percent(goal.current_amount, goal.target_amount),
        deadline: goal.deadline,
    }
}

/// `round(current / target * 100)`, half away from zero.
///
/// Targets are positive by construction in the goals CRUD path; a zero
/// target reports 0% instead of dividing.
pub fn progress_percent(current: Decimal, target: Decimal) -> i64 {
    let Some(ratio) = current.checked_div(target) else {
        warn!(target = %target, "Goal has a zero target; reporting 0% progress");
        return 0;
    };

    (ratio * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}
