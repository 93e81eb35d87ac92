//! Agent runtime backed by the OpenAI Responses API with the accounting tool
//! attached as a hosted MCP server.
//!
//! The API executes MCP tool calls server-side; each HTTP round-trip counts as
//! one turn. Approval requests (if the server asks for them) are approved in a
//! follow-up turn chained through `previous_response_id`.

use crate::ai::runtime::AgentRuntime;
use crate::ai::types::{AgentRequest, AgentRun, ToolChoice};
use crate::config::AgentSettings;
use crate::error::BotError;
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

/// Header the accounting tool reads to find the caller's ledger
pub const USER_ID_HEADER: &str = "x-telegram-user-id";

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 2000;

#[derive(Debug, Serialize)]
struct McpToolSpec<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    server_label: &'a str,
    server_url: &'a str,
    require_approval: &'static str,
    headers: HashMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Value,
    tools: Vec<McpToolSpec<'a>>,
    tool_choice: ToolChoice,
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

pub struct OpenAiAgentRuntime {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    mcp_server_url: String,
    mcp_server_label: String,
}

impl OpenAiAgentRuntime {
    pub fn new(settings: &AgentSettings) -> Self {
        Self::with_client(settings, crate::http::agent_client().clone())
    }

    pub fn with_client(settings: &AgentSettings, client: Client) -> Self {
        Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            mcp_server_url: settings.mcp_server_url.clone(),
            mcp_server_label: settings.mcp_server_label.clone(),
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, BotError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BotError::Configuration("OPENAI_API_KEY is not set".to_string()))?;

        let mut headers = header::HeaderMap::new();
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| BotError::Configuration(format!("Invalid API key format: {}", e)))?;
        headers.insert(header::AUTHORIZATION, auth_value);
        Ok(headers)
    }

    fn mcp_tool(&self, user_id: &str) -> McpToolSpec<'_> {
        let mut headers = HashMap::new();
        headers.insert(USER_ID_HEADER, user_id.to_string());
        McpToolSpec {
            tool_type: "mcp",
            server_label: &self.mcp_server_label,
            server_url: &self.mcp_server_url,
            require_approval: "never",
            headers,
        }
    }

    /// POST a Responses request. Only failures that happen before the server
    /// starts the run are retried: connect errors, 429 and 503.
    async fn create_response(
        &self,
        request: &ResponsesRequest<'_>,
    ) -> Result<ResponsesResponse, BotError> {
        let url = format!("{}/responses", self.base_url);
        let headers = self.auth_headers()?;
        let mut last_error: Option<String> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = BASE_DELAY_MS * (1 << (attempt - 1));
                log::warn!(
                    "[AGENT] Retry attempt {}/{} after {}ms delay",
                    attempt,
                    MAX_RETRIES,
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let response = match self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) if e.is_connect() => {
                    log::warn!("[AGENT] Connect failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(format!("Responses API unreachable: {}", e));
                    continue;
                }
                // The request may have reached the server and run tools already.
                Err(e) => {
                    return Err(BotError::Agent(format!("Responses API request failed: {}", e)));
                }
            };

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                if is_retryable_status(status.as_u16()) {
                    log::warn!(
                        "[AGENT] Received retryable status {} (attempt {})",
                        status,
                        attempt + 1
                    );
                    last_error = Some(format!("HTTP {}: {}", status, error_text));
                    continue;
                }

                if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(&error_text) {
                    return Err(BotError::Agent(format!(
                        "Responses API error ({}): {}",
                        status, error_response.error.message
                    )));
                }
                return Err(BotError::Agent(format!(
                    "Responses API returned error status: {}, body: {}",
                    status,
                    crate::channels::util::preview(&error_text, 300)
                )));
            }

            return response
                .json::<ResponsesResponse>()
                .await
                .map_err(|e| BotError::Agent(format!("Failed to parse Responses API reply: {}", e)));
        }

        Err(BotError::Agent(
            last_error.unwrap_or_else(|| "Max retries exceeded".to_string()),
        ))
    }
}

/// Statuses returned before the run started, so resending cannot repeat
/// tool calls. Gateway errors (502/504) are excluded: the run may still be
/// executing behind them.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Concatenate every `output_text` block of the `message` items.
fn collect_output_text(output: &[Value]) -> String {
    output
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

/// Ids of approval requests the runtime is waiting on.
fn pending_approvals(output: &[Value]) -> Vec<String> {
    output
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("mcp_approval_request"))
        .filter_map(|item| item.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Everything except assistant messages goes into the trace.
fn trace_items(output: Vec<Value>) -> impl Iterator<Item = Value> {
    output
        .into_iter()
        .filter(|item| item.get("type").and_then(Value::as_str) != Some("message"))
}

#[async_trait]
impl AgentRuntime for OpenAiAgentRuntime {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, BotError> {
        let headers = self.auth_headers()?;
        let size = bytes.len();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| BotError::InvalidInput(format!("bad mime type {}: {}", mime_type, e)))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "vision")
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .headers(headers)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::Agent(format!("File upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BotError::Agent(format!(
                "File upload returned {}: {}",
                status,
                crate::channels::util::preview(&error_text, 300)
            )));
        }

        let uploaded: UploadedFile = response
            .json()
            .await
            .map_err(|e| BotError::Agent(format!("Failed to parse upload reply: {}", e)))?;

        log::info!("[AGENT] Uploaded {} ({} bytes) as {}", file_name, size, uploaded.id);
        Ok(uploaded.id)
    }

    async fn run(&self, request: AgentRequest) -> Result<AgentRun, BotError> {
        let mut input = serde_json::to_value(&request.input)
            .map_err(|e| BotError::InvalidInput(format!("Unserializable input: {}", e)))?;
        let mut previous_response_id: Option<String> = None;
        let mut trace = Vec::new();

        for turn in 1..=request.max_turns {
            let body = ResponsesRequest {
                model: &request.config.model,
                instructions: &request.config.instructions,
                input,
                tools: vec![self.mcp_tool(&request.user_id)],
                tool_choice: request.config.tool_choice,
                temperature: request.config.temperature,
                max_output_tokens: request.config.max_output_tokens,
                previous_response_id: previous_response_id.take(),
            };

            log::debug!(
                "[AGENT] Turn {} request for agent '{}' (model {})",
                turn,
                request.config.name,
                request.config.model
            );

            let response = self.create_response(&body).await?;

            if response.status.as_deref() == Some("failed") {
                let message = response
                    .error
                    .as_ref()
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown failure")
                    .to_string();
                return Err(BotError::Agent(format!("Response {} failed: {}", response.id, message)));
            }

            let approvals = pending_approvals(&response.output);
            let text = collect_output_text(&response.output);
            trace.extend(trace_items(response.output));

            if approvals.is_empty() {
                log::info!(
                    "[AGENT] Completed after {} turn(s), {} trace item(s)",
                    turn,
                    trace.len()
                );
                return Ok(AgentRun {
                    final_output: Some(text).filter(|t| !t.trim().is_empty()),
                    trace,
                });
            }

            log::info!("[AGENT] Approving {} pending tool call(s)", approvals.len());
            input = Value::Array(
                approvals
                    .into_iter()
                    .map(|id| {
                        json!({
                            "type": "mcp_approval_response",
                            "approval_request_id": id,
                            "approve": true,
                        })
                    })
                    .collect(),
            );
            previous_response_id = Some(response.id);
        }

        Err(BotError::Agent(format!(
            "max turns ({}) exceeded",
            request.max_turns
        )))
    }
}
