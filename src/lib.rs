//! Stash Agent
//!
//! A conversational finance assistant that can act on a user's records:
//! - Records income and moves money between savings goals via model-requested actions
//! - Grounds every reply in a fresh snapshot of the user's last 30 days
//! - Enforces hard guardrails in code, independent of model compliance
//! - Keeps an append-only audit trail of every exchange
//!
//! CHAT TURN:
//! VALIDATE → SNAPSHOT → DRAFT → EXECUTE → FINALIZE → RECORD

pub mod agent;
pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod state;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
