//! REST API server for the chat action service
//!
//! Every endpoint except `/health` requires a bearer token.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::agent::{Orchestrator, DEFAULT_HISTORY_LIMIT};
use crate::auth::{authenticate, IdentityVerifier};
use crate::error::AgentError;
use crate::models::{ChatRole, ConversationTurn, HistoryEntry};

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub message: String,
    pub role: ChatRole,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryTurn {
    pub role: ChatRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ConversationTurn> for HistoryTurn {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            role: turn.role,
            message: turn.message,
            timestamp: turn.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}

/// Response envelope shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        error_response(status, self.public_message())
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let user = match authenticate(state.verifier.as_ref(), &headers).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected chat body");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body".to_string());
        }
    };

    info!(user_id = %user.user_id, "Received chat message");

    match state
        .orchestrator
        .handle_message(user.user_id, &req.message, &req.conversation_history)
        .await
    {
        Ok(reply) => (
            StatusCode::OK,
            Json(ApiResponse::success(ChatResponse {
                message: reply.message,
                role: ChatRole::Assistant,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn history_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let user = match authenticate(state.verifier.as_ref(), &headers).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let limit = match query.limit.as_deref() {
        None => DEFAULT_HISTORY_LIMIT,
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "limit must be a positive integer".to_string(),
                )
            }
        },
    };

    match state.orchestrator.history(user.user_id, limit).await {
        Ok(turns) => {
            let data: Vec<HistoryTurn> = turns.into_iter().map(HistoryTurn::from).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(e) => {
            error!(user_id = %user.user_id, error = %e, "Failed to fetch chat history");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch chat history".to_string(),
            )
        }
    }
}

/// =============================
/// Router + Server
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", get(history_handler).post(chat_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(state: ApiState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
