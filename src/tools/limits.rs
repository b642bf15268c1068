//! Hard guardrails on action arguments
//!
//! These limits hold regardless of what the model was told in the prompt.

use crate::models::IncomeSource;
use chrono::{DateTime, Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::str::FromStr;

pub const MIN_AMOUNT: Decimal = dec!(0.01);
pub const MAX_INCOME_AMOUNT: Decimal = dec!(100000);
pub const MAX_GOAL_UPDATE: Decimal = dec!(50000);
pub const MAX_AMOUNT_DECIMALS: u32 = 2;

/// Advisory thresholds restated in the prompt; not enforced in code.
pub const LARGE_AMOUNT_CONFIRMATION: Decimal = dec!(10000);
pub const UNCONFIRMED_AMOUNT_CEILING: Decimal = dec!(1000);

pub const MAX_ACTIONS_PER_MESSAGE: usize = 3;
pub const MAX_NOTES_CHARS: usize = 500;
pub const MAX_GOAL_NAME_CHARS: usize = 100;
pub const MAX_INCOME_AGE_DAYS: i64 = 365;

/// A goal may not be pushed past `target * OVERSHOOT_FACTOR` without re-proposal.
pub const OVERSHOOT_FACTOR: Decimal = dec!(1.5);

/// Validate a monetary argument and return it unchanged.
///
/// `signed` amounts are checked by magnitude, so a withdrawal of 20 passes
/// the same bounds as a deposit of 20.
pub fn validate_amount(
    value: Option<&Value>,
    max: Decimal,
    context: &str,
    signed: bool,
) -> Result<Decimal, String> {
    let amount = value
        .and_then(decimal_from_json)
        .ok_or_else(|| format!("{}: Amount must be a valid number", context))?;

    let magnitude = if signed { amount.abs() } else { amount };

    if magnitude < MIN_AMOUNT {
        return Err(format!("{}: Amount must be at least ${}", context, MIN_AMOUNT));
    }
    if magnitude > max {
        return Err(format!("{}: Amount cannot exceed ${}", context, max));
    }
    if amount.normalize().scale() > MAX_AMOUNT_DECIMALS {
        return Err(format!(
            "{}: Amount can only have up to {} decimal places",
            context, MAX_AMOUNT_DECIMALS
        ));
    }

    Ok(amount)
}

/// JSON numbers only; strings that look numeric are not amounts.
fn decimal_from_json(value: &Value) -> Option<Decimal> {
    let Value::Number(number) = value else {
        return None;
    };

    let text = number.to_string();
    if text.contains(['e', 'E']) {
        Decimal::from_scientific(&text).ok()
    } else {
        Decimal::from_str(&text).ok()
    }
}

pub fn validate_source(value: Option<&Value>) -> Result<IncomeSource, String> {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<IncomeSource>().ok())
        .ok_or_else(|| {
            let names: Vec<&str> = IncomeSource::ALL.iter().map(|s| s.as_str()).collect();
            format!("Invalid income source. Must be one of: {}", names.join(", "))
        })
}

/// Missing or empty dates mean today. Anything else must parse and fall
/// within `[today - 365 days, today]`.
pub fn resolve_income_date(value: Option<&Value>, today: NaiveDate) -> Result<NaiveDate, String> {
    const INVALID: &str = "Invalid date. Date must be within the last year and not in the future";

    let raw = match value {
        None | Some(Value::Null) => return Ok(today),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(today),
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(INVALID.to_string()),
    };

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| INVALID.to_string())?;

    let earliest = today - Duration::days(MAX_INCOME_AGE_DAYS);
    if date > today || date < earliest {
        return Err(INVALID.to_string());
    }

    Ok(date)
}

/// Optional free text, capped at `MAX_NOTES_CHARS` characters.
pub fn sanitize_notes(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if text.is_empty() {
        return None;
    }

    Some(text.chars().take(MAX_NOTES_CHARS).collect())
}

/// Trimmed goal name capped at `MAX_GOAL_NAME_CHARS`; empty is rejected.
pub fn sanitize_goal_name(value: Option<&Value>) -> Result<String, String> {
    let raw = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let name: String = raw.trim().chars().take(MAX_GOAL_NAME_CHARS).collect();
    let name = name.trim_end().to_string();

    if name.is_empty() {
        return Err("Goal name cannot be empty".to_string());
    }

    Ok(name)
}
