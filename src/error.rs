//! Error types for the chat action service
//!
//! Only request-level failures live here. Problems with a single action
//! call are never raised; they become outcome strings for the model
//! (see `execution::ActionOutcome`).

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Client-facing text for every 500-class failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process chat message";

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Request Boundary Errors
    // =============================

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Too many actions requested (max {max} per message, got {requested})")]
    TooManyActions { requested: usize, max: usize },

    // =============================
    // Upstream / Persistence Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl AgentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AgentError::Unauthorized => StatusCode::UNAUTHORIZED,
            AgentError::InvalidRequest(_) | AgentError::TooManyActions { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller. Internal detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AgentError::Unauthorized => "Unauthorized".to_string(),
            AgentError::InvalidRequest(msg) => msg.clone(),
            AgentError::TooManyActions { max, .. } => {
                format!("Too many actions requested (max {} per message)", max)
            }
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
