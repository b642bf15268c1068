//! Environment configuration

use crate::error::AgentError;
use crate::Result;
use std::env;
use uuid::Uuid;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub auth_base_url: Option<String>,
    pub auth_api_key: Option<String>,
    /// `(user_id, token)` pairs for the static verifier
    pub static_tokens: Vec<(Uuid, String)>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();

        let gemini_model = non_empty_var("GEMINI_MODEL")
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let port = match non_empty_var("PORT").or_else(|| non_empty_var("API_PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| AgentError::ConfigError(format!("invalid port: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        let static_tokens = match non_empty_var("STATIC_API_TOKENS") {
            Some(raw) => parse_static_tokens(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            gemini_api_key,
            gemini_model,
            port,
            database_url: non_empty_var("POSTGRES_URL").or_else(|| non_empty_var("DATABASE_URL")),
            auth_base_url: non_empty_var("AUTH_BASE_URL"),
            auth_api_key: non_empty_var("AUTH_API_KEY"),
            static_tokens,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `user-uuid:token,user-uuid:token`
pub fn parse_static_tokens(raw: &str) -> Result<Vec<(Uuid, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (user, token) = pair.split_once(':').ok_or_else(|| {
                AgentError::ConfigError("STATIC_API_TOKENS entries must be user:token".into())
            })?;

            let user_id = Uuid::parse_str(user.trim()).map_err(|e| {
                AgentError::ConfigError(format!("invalid user id in STATIC_API_TOKENS: {}", e))
            })?;

            let token = token.trim();
            if token.is_empty() {
                return Err(AgentError::ConfigError(
                    "empty token in STATIC_API_TOKENS".into(),
                ));
            }

            Ok((user_id, token.to_string()))
        })
        .collect()
}
