//! Action execution engine
//!
//! Turns model-requested actions into guarded store mutations.
//! Nothing in here raises: every path ends in an `ActionOutcome` string
//! the model can react to on the second pass.

use crate::context::progress_percent;
use crate::models::{Goal, GoalProgressUpdate, GoalStatus, NewIncome};
use crate::state::FinanceStore;
use crate::tools::limits::OVERSHOOT_FACTOR;
use crate::tools::{round_cents, Action, ActionCall, ActionRejection, GoalAdjustment};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of one action call, always fed back to the model as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Success(String),
    /// Guardrail tripped; nothing was written
    Warning(String),
    /// Validation failed; nothing was written
    Rejected(String),
}

impl ActionOutcome {
    pub fn message(&self) -> &str {
        match self {
            ActionOutcome::Success(m) | ActionOutcome::Warning(m) | ActionOutcome::Rejected(m) => m,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success(_))
    }

    fn kind(&self) -> &'static str {
        match self {
            ActionOutcome::Success(_) => "success",
            ActionOutcome::Warning(_) => "warning",
            ActionOutcome::Rejected(_) => "rejected",
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Success(m) => write!(f, "Success: {}", m),
            ActionOutcome::Warning(m) => write!(f, "Warning: {}", m),
            ActionOutcome::Rejected(m) => write!(f, "Error: {}", m),
        }
    }
}

pub(crate) fn usd(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

/// Executes catalog actions against the store for one user at a time
pub struct ActionExecutor {
    store: Arc<dyn FinanceStore>,
}

impl ActionExecutor {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    /// Validate and apply one call. `today` anchors date validation.
    pub async fn execute(&self, user_id: Uuid, call: &ActionCall, today: NaiveDate) -> ActionOutcome {
        let outcome = match Action::parse(call, today) {
            Err(ActionRejection::Undeclared(name)) => {
                warn!(
                    user_id = %user_id,
                    action = %name,
                    "Security violation: model requested an undeclared action"
                );
                ActionOutcome::Rejected(format!(
                    "Security violation: action \"{}\" is not permitted",
                    name
                ))
            }
            Err(ActionRejection::Invalid(reason)) => ActionOutcome::Rejected(reason),
            Ok(Action::AddIncome(income)) => self.add_income(user_id, income).await,
            Ok(Action::UpdateGoalProgress(adjustment)) => {
                self.update_goal_progress(user_id, adjustment).await
            }
        };

        info!(
            user_id = %user_id,
            action = %call.name,
            outcome = outcome.kind(),
            "Action executed"
        );

        outcome
    }

    async fn add_income(&self, user_id: Uuid, income: NewIncome) -> ActionOutcome {
        match self.store.insert_income(user_id, income).await {
            Ok(entry) => ActionOutcome::Success(format!(
                "Added {} from {} on {}",
                usd(entry.amount),
                entry.source,
                entry.date.format("%Y-%m-%d")
            )),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Income insert failed");
                ActionOutcome::Rejected("Failed to add income: Database error".to_string())
            }
        }
    }

    async fn update_goal_progress(&self, user_id: Uuid, adjustment: GoalAdjustment) -> ActionOutcome {
        let goals = match self.store.goals_with_status(user_id, GoalStatus::Active).await {
            Ok(goals) => goals,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Loading active goals failed");
                return ActionOutcome::Rejected(
                    "Failed to update goal: Database error".to_string(),
                );
            }
        };

        if goals.is_empty() {
            return ActionOutcome::Rejected(
                "You have no active goals yet. Create a goal first".to_string(),
            );
        }

        let Some(goal) = resolve_goal(&goals, &adjustment.goal_name) else {
            let available: Vec<&str> = goals.iter().map(|g| g.name.as_str()).collect();
            return ActionOutcome::Rejected(format!(
                "Could not find goal \"{}\". Your active goals are: {}",
                adjustment.goal_name,
                available.join(", ")
            ));
        };

        let amount = adjustment.amount_to_add;
        let new_amount = goal.current_amount + amount;

        if new_amount < Decimal::ZERO {
            return ActionOutcome::Rejected(format!(
                "Cannot subtract {} from \"{}\" - current balance is only {}",
                usd(amount.abs()),
                goal.name,
                usd(goal.current_amount)
            ));
        }

        let overshoot_limit = goal.target_amount * OVERSHOOT_FACTOR;
        if new_amount > overshoot_limit {
            warn!(
                user_id = %user_id,
                goal_id = %goal.id,
                new_amount = %new_amount,
                limit = %overshoot_limit,
                "Goal update would overshoot target; not applied"
            );
            let movement = if amount.is_sign_negative() {
                format!("Withdrawing {}", usd(amount.abs()))
            } else {
                format!("Adding {}", usd(amount))
            };
            return ActionOutcome::Warning(format!(
                "{} would bring \"{}\" to {}, which is {}% of your target of {} \
                 (more than 50% over). Nothing was changed. Please confirm if this is correct.",
                movement,
                goal.name,
                usd(new_amount),
                progress_percent(new_amount, goal.target_amount),
                usd(goal.target_amount)
            ));
        }

        let new_amount = round_cents(new_amount);
        let completed = new_amount >= goal.target_amount;
        let update = GoalProgressUpdate {
            current_amount: new_amount,
            status: if completed { GoalStatus::Completed } else { goal.status },
        };

        if let Err(e) = self.store.update_goal_progress(user_id, goal.id, update).await {
            error!(user_id = %user_id, goal_id = %goal.id, error = %e, "Goal update failed");
            return ActionOutcome::Rejected("Failed to update goal: Database error".to_string());
        }

        let movement = if amount.is_sign_negative() {
            format!("Withdrew {} from", usd(amount.abs()))
        } else {
            format!("Added {} to", usd(amount))
        };

        ActionOutcome::Success(format!(
            "{} \"{}\". New progress: {}% ({}/{}){}",
            movement,
            goal.name,
            progress_percent(new_amount, goal.target_amount),
            usd(new_amount),
            usd(goal.target_amount),
            if completed { " Goal completed!" } else { "" }
        ))
    }
}

/// Find the goal a (possibly partial) name refers to.
///
/// Exact case-insensitive match wins; otherwise the first goal whose name
/// contains the query, or is contained by it. Ties are not disambiguated.
pub fn resolve_goal<'a>(goals: &'a [Goal], query: &str) -> Option<&'a Goal> {
    let needle = query.to_lowercase();

    goals
        .iter()
        .find(|goal| goal.name.to_lowercase() == needle)
        .or_else(|| {
            goals.iter().find(|goal| {
                let name = goal.name.to_lowercase();
                name.contains(&needle) || needle.contains(&name)
            })
        })
}
