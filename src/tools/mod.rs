//! Action catalog
//!
//! The model may only request the two actions declared here. Calls arrive
//! as an untyped argument bag and are parsed into a typed `Action` before
//! anything else looks at them.

pub mod limits;

use crate::models::NewIncome;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use limits::{
    resolve_income_date, sanitize_goal_name, sanitize_notes, validate_amount, validate_source,
    MAX_GOAL_UPDATE, MAX_INCOME_AMOUNT,
};

pub const ADD_INCOME: &str = "add_income";
pub const UPDATE_GOAL_PROGRESS: &str = "update_goal_progress";

/// An action call exactly as the model emitted it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ActionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }
}

/// Schema-typed declaration handed to the model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActionDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// The fixed catalog, in declaration order
pub fn catalog() -> Vec<ActionDeclaration> {
    vec![
        ActionDeclaration {
            name: ADD_INCOME,
            description: "Add a new income entry for the user. Use this when user reports earning money.",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "amount": {
                        "type": "NUMBER",
                        "description": "The income amount in dollars (must be between 0.01 and 100000)"
                    },
                    "source": {
                        "type": "STRING",
                        "description": "The source of income. Must be one of: hackathon, bounty, freelance, crypto, or other"
                    },
                    "date": {
                        "type": "STRING",
                        "description": "The date of income in YYYY-MM-DD format (defaults to today)"
                    },
                    "notes": {
                        "type": "STRING",
                        "description": "Optional notes about the income"
                    }
                },
                "required": ["amount", "source"]
            }),
        },
        ActionDeclaration {
            name: UPDATE_GOAL_PROGRESS,
            description: "Add or subtract money from a goal's current savings. Use when user allocates money to a goal.",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "goal_name": {
                        "type": "STRING",
                        "description": "The name of the goal to update (must match existing goal name)"
                    },
                    "amount_to_add": {
                        "type": "NUMBER",
                        "description": "The amount to add (positive) or subtract (negative). Must be between -50000 and 50000."
                    }
                },
                "required": ["goal_name", "amount_to_add"]
            }),
        },
    ]
}

pub fn is_declared(name: &str) -> bool {
    name == ADD_INCOME || name == UPDATE_GOAL_PROGRESS
}

/// Signed adjustment to a goal identified by (fuzzy) name
#[derive(Debug, Clone, PartialEq)]
pub struct GoalAdjustment {
    pub goal_name: String,
    pub amount_to_add: Decimal,
}

/// A catalog action with validated, typed arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddIncome(NewIncome),
    UpdateGoalProgress(GoalAdjustment),
}

/// Why a call could not be turned into an `Action`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRejection {
    /// Name outside the catalog; arguments were never inspected
    Undeclared(String),
    Invalid(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddIncome(_) => ADD_INCOME,
            Action::UpdateGoalProgress(_) => UPDATE_GOAL_PROGRESS,
        }
    }

    /// Parse and validate a raw call. `today` anchors the income date window.
    pub fn parse(call: &ActionCall, today: NaiveDate) -> Result<Action, ActionRejection> {
        if !is_declared(&call.name) {
            return Err(ActionRejection::Undeclared(call.name.clone()));
        }

        let parsed = if call.name == ADD_INCOME {
            parse_add_income(call, today).map(Action::AddIncome)
        } else {
            parse_goal_adjustment(call).map(Action::UpdateGoalProgress)
        };

        parsed.map_err(ActionRejection::Invalid)
    }
}

fn parse_add_income(call: &ActionCall, today: NaiveDate) -> Result<NewIncome, String> {
    let amount = validate_amount(call.arg("amount"), MAX_INCOME_AMOUNT, "Income", false)?;
    let source = validate_source(call.arg("source"))?;
    let date = resolve_income_date(call.arg("date"), today)?;
    let notes = sanitize_notes(call.arg("notes"));

    Ok(NewIncome {
        amount: round_cents(amount),
        source,
        date,
        notes,
    })
}

fn parse_goal_adjustment(call: &ActionCall) -> Result<GoalAdjustment, String> {
    let amount_to_add =
        validate_amount(call.arg("amount_to_add"), MAX_GOAL_UPDATE, "Goal update", true)?;
    let goal_name = sanitize_goal_name(call.arg("goal_name"))?;

    Ok(GoalAdjustment {
        goal_name,
        amount_to_add,
    })
}

pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
