use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use stash_agent::{
    agent::Orchestrator,
    api::{create_router, ApiState},
    auth::StaticTokenVerifier,
    context::FixedClock,
    llm::{ModelReply, ScriptedModel},
    models::{Goal, GoalStatus},
    state::InMemoryStore,
    tools::ActionCall,
};
use std::sync::Arc;
use tokio_test::assert_ok;
use tower::ServiceExt;
use uuid::Uuid;

const TOKEN: &str = "test-token";

struct Harness {
    app: Router,
    store: Arc<InMemoryStore>,
    user_id: Uuid,
}

fn harness(replies: Vec<ModelReply>) -> Harness {
    let user_id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(ScriptedModel::new(replies));
    let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()));

    let state = ApiState {
        orchestrator: Arc::new(Orchestrator::new(model, store.clone(), clock)),
        verifier: Arc::new(StaticTokenVerifier::new(&[(user_id, TOKEN.to_string())])),
    };

    Harness {
        app: create_router(state),
        store,
        user_id,
    }
}

fn post_chat(token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = assert_ok!(app.clone().oneshot(request).await);
    let status = response.status();
    let bytes = assert_ok!(to_bytes(response.into_body(), usize::MAX).await);
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() {
    let h = harness(vec![]);

    let (status, body) = send(&h.app, post_chat(None, r#"{"message":"hi"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));

    let (status, _) = send(&h.app, post_chat(Some("other"), r#"{"message":"hi"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_and_empty_bodies_are_bad_requests() {
    let h = harness(vec![]);

    let (status, body) = send(&h.app, post_chat(Some(TOKEN), "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&h.app, post_chat(Some(TOKEN), r#"{"message":"  "}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");
}

#[tokio::test]
async fn chat_round_trip_updates_goal_and_history() {
    let h = harness(vec![
        ModelReply::calls(vec![ActionCall::new(
            "update_goal_progress",
            json!({ "goal_name": "Laptop", "amount_to_add": 200 }),
        )]),
        ModelReply::text("Done! Your Laptop goal is complete."),
    ]);

    let goal_id = Uuid::new_v4();
    h.store
        .insert_goal(Goal {
            id: goal_id,
            user_id: h.user_id,
            name: "Laptop".into(),
            target_amount: dec!(1000),
            current_amount: dec!(900),
            status: GoalStatus::Active,
            deadline: None,
            created_at: Utc::now(),
        })
        .await;

    let body = json!({
        "message": "yes",
        "conversationHistory": [
            { "role": "user", "message": "put $200 in my laptop fund" },
            { "role": "assistant", "message": "Add $200 to Laptop? Please confirm." }
        ]
    });
    let (status, body) = send(&h.app, post_chat(Some(TOKEN), &body.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "data": { "message": "Done! Your Laptop goal is complete.", "role": "assistant" }
        })
    );

    let goal = h.store.goal(goal_id).await.unwrap();
    assert_eq!(goal.current_amount, dec!(1100));
    assert_eq!(goal.status, GoalStatus::Completed);

    let (status, body) = send(&h.app, get("/chat")).await;
    assert_eq!(status, StatusCode::OK);
    let turns = body["data"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[0]["message"], "yes");
    assert_eq!(turns[1]["role"], "assistant");
}

#[tokio::test]
async fn too_many_actions_is_rejected_without_side_effects() {
    let calls = (0..4)
        .map(|_| ActionCall::new("add_income", json!({ "amount": 100, "source": "bounty" })))
        .collect();
    let h = harness(vec![ModelReply::calls(calls)]);

    let (status, body) = send(&h.app, post_chat(Some(TOKEN), r#"{"message":"log 4 bounties"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Too many actions requested (max 3 per message)");
    assert!(h.store.income_for(h.user_id).await.is_empty());

    let (_, history) = send(&h.app, get("/chat")).await;
    assert_eq!(history["data"], json!([]));
}

#[tokio::test]
async fn model_failure_is_generic_server_error() {
    let h = harness(vec![]);

    let (status, body) = send(&h.app, post_chat(Some(TOKEN), r#"{"message":"hello"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process chat message");
}

#[tokio::test]
async fn history_limit_is_validated() {
    let h = harness(vec![ModelReply::text("one"), ModelReply::text("two")]);

    send(&h.app, post_chat(Some(TOKEN), r#"{"message":"first"}"#)).await;
    send(&h.app, post_chat(Some(TOKEN), r#"{"message":"second"}"#)).await;

    let (status, body) = send(&h.app, get("/chat?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    let messages: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["second", "two"]);

    let (status, _) = send(&h.app, get("/chat?limit=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&h.app, get("/chat?limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_needs_no_token() {
    let h = harness(vec![]);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
