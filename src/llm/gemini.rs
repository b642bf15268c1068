//! Gemini API client with function calling
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::llm::{ChatModel, MessagePart, ModelMessage, ModelReply, ModelRequest, ModelRole};
use crate::tools::{ActionCall, ActionDeclaration};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", GEMINI_BASE_URL, model),
        }
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(&self, request: ModelRequest<'_>) -> crate::Result<ModelReply> {
        if self.api_key.is_empty() {
            return Err(AgentError::LlmError("GEMINI_API_KEY not configured".to_string()));
        }

        let body = build_request(&request);

        debug!(
            message_count = request.messages.len(),
            action_count = request.actions.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response ({}): {}", status, error_text);
            return Err(AgentError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let reply = parse_response(gemini_response)?;

        info!(
            call_count = reply.action_calls().len(),
            "Gemini response received"
        );

        Ok(reply)
    }
}

fn build_request<'a>(request: &ModelRequest<'a>) -> GeminiRequest<'a> {
    let (tools, tool_config) = if request.actions.is_empty() {
        (None, None)
    } else {
        (
            Some(vec![ToolBlock {
                function_declarations: request.actions,
            }]),
            Some(ToolConfig {
                function_calling_config: FunctionCallingConfig { mode: "AUTO" },
            }),
        )
    };

    GeminiRequest {
        contents: request.messages.iter().map(content_from_message).collect(),
        system_instruction: SystemInstruction {
            parts: vec![Part::text(request.system_instruction.to_string())],
        },
        tools,
        tool_config,
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        },
    }
}

fn content_from_message(message: &ModelMessage) -> Content {
    let role = match message.role {
        ModelRole::User => "user",
        ModelRole::Model => "model",
    };

    let parts = message
        .parts
        .iter()
        .map(|part| match part {
            MessagePart::Text(text) => Part::text(text.clone()),
            MessagePart::ActionCall(call) => Part {
                function_call: Some(FunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                }),
                ..Part::default()
            },
            MessagePart::ActionResult { name, result } => Part {
                function_response: Some(FunctionResponse {
                    name: name.clone(),
                    response: json!({ "result": result }),
                }),
                ..Part::default()
            },
        })
        .collect();

    Content {
        role: Some(role.to_string()),
        parts,
    }
}

fn parse_response(response: GeminiResponse) -> crate::Result<ModelReply> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::LlmError("No response from Gemini API".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        debug!(finish_reason = reason, "Gemini candidate finished");
    }

    let parts = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                Some(MessagePart::ActionCall(ActionCall::new(call.name, call.args)))
            } else {
                part.text.map(MessagePart::Text)
            }
        })
        .collect();

    Ok(ModelReply { parts })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolBlock<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolBlock<'a> {
    function_declarations: &'a [ActionDeclaration],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct FunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}
