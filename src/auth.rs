//! Caller identity
//!
//! A bearer token is resolved to a user id by an `IdentityVerifier`.
//! Anything that cannot be resolved is treated as unauthenticated.

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(None)` means the token is unknown or expired
    async fn verify(&self, token: &str) -> Result<Option<AuthenticatedUser>>;
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();

    (!token.is_empty()).then_some(token)
}

//
// ================= Static tokens =================
//

/// Fixed token table; only SHA256 digests are kept in memory
pub struct StaticTokenVerifier {
    digests: HashMap<String, Uuid>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: &[(Uuid, String)]) -> Self {
        Self {
            digests: tokens
                .iter()
                .map(|(user_id, token)| (token_digest(token), *user_id))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Option<AuthenticatedUser>> {
        Ok(self
            .digests
            .get(&token_digest(token))
            .map(|user_id| AuthenticatedUser { user_id: *user_id }))
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

//
// ================= Remote auth service =================
//

/// Resolves tokens against `GET {base}/auth/v1/user`
pub struct RemoteIdentityVerifier {
    client: Client,
    user_endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Uuid,
}

impl RemoteIdentityVerifier {
    pub fn new(base_url: &str, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            user_endpoint: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            api_key,
        }
    }
}

#[async_trait]
impl IdentityVerifier for RemoteIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Option<AuthenticatedUser>> {
        let response = self
            .client
            .get(&self.user_endpoint)
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Auth service rejected token");
            return Ok(None);
        }

        let user: RemoteUser = response.json().await?;
        Ok(Some(AuthenticatedUser { user_id: user.id }))
    }
}

/// Resolve the caller or fail with `Unauthorized`.
///
/// Verifier transport failures also map to `Unauthorized`.
pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser> {
    let token = bearer_token(headers).ok_or(AgentError::Unauthorized)?;

    match verifier.verify(token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(AgentError::Unauthorized),
        Err(e) => {
            warn!(error = %e, "Identity verification failed");
            Err(AgentError::Unauthorized)
        }
    }
}

/// Pick the verifier from configuration: the auth service when configured,
/// otherwise the static token table.
pub fn build_verifier(config: &AppConfig) -> Arc<dyn IdentityVerifier> {
    match (config.auth_base_url.as_deref(), config.auth_api_key.clone()) {
        (Some(base_url), Some(api_key)) => {
            info!(base_url = %base_url, "Using remote identity verifier");
            Arc::new(RemoteIdentityVerifier::new(base_url, api_key))
        }
        _ => {
            let verifier = StaticTokenVerifier::new(&config.static_tokens);
            if verifier.is_empty() {
                warn!("No auth service or static tokens configured; every request will be rejected");
            } else {
                info!(tokens = verifier.len(), "Using static token verifier");
            }
            Arc::new(verifier)
        }
    }
}
