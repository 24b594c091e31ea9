// ABOUTME: Generic OpenAI-compatible model provider for local and cloud endpoints
// ABOUTME: Supports Ollama, vLLM, LocalAI, and any endpoint speaking the chat completions API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # `OpenAI`-Compatible Provider
//!
//! Generic implementation for any `OpenAI`-compatible chat completions
//! endpoint. Tool declarations are forwarded as function definitions and
//! tool calls in the response are surfaced as [`RawToolCall`]s with their
//! arguments parsed but not validated; validation is the executor's job.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::{ModelProvider, ModelRequest, ModelResponse, RawToolCall, ToolDeclaration};
use crate::config::ModelConfig;
use crate::errors::{AppError, AppResult};

/// Connection timeout for local servers (more lenient than cloud)
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Request timeout (local inference can be slow)
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Service label used in error messages
const SERVICE: &str = "ModelEndpoint";

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Generic `OpenAI`-compatible model provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: ModelConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ModelConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn convert_messages(request: &ModelRequest) -> Vec<OpenAiMessage> {
        request
            .messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str().to_owned(),
                content: msg.content.clone(),
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDeclaration]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|tool| OpenAiTool {
                tool_type: "function".to_owned(),
                function: OpenAiFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect()
    }

    /// Convert tool calls to the internal format.
    ///
    /// Arguments arrive as a JSON-encoded string; a string that fails to
    /// parse is kept as `Value::Null` so the orchestrator's rejection path
    /// sees it rather than this layer guessing.
    fn convert_tool_calls(tool_calls: Vec<OpenAiToolCall>) -> Vec<RawToolCall> {
        tool_calls
            .into_iter()
            .map(|call| {
                let arguments =
                    serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null);
                RawToolCall {
                    name: call.function.name,
                    arguments,
                }
            })
            .collect()
    }

    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            match status.as_u16() {
                401 | 403 => AppError::external_service(
                    SERVICE,
                    format!("authentication failed: {}", error_response.error.message),
                ),
                404 => AppError::external_service(
                    SERVICE,
                    format!("model or endpoint not found: {}", error_response.error.message),
                ),
                429 | 500..=599 => {
                    AppError::external_unavailable(SERVICE, error_response.error.message)
                }
                _ => AppError::external_service(SERVICE, error_response.error.message),
            }
        } else if (502..=504).contains(&status.as_u16()) {
            AppError::external_unavailable(SERVICE, "endpoint is not responding")
        } else {
            AppError::external_service(
                SERVICE,
                format!(
                    "API error ({}): {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            )
        }
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("Bearer {api_key}"))
        } else {
            request
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        request: &ModelRequest,
        tools: &[ToolDeclaration],
    ) -> AppResult<ModelResponse> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);

        debug!(
            model,
            messages = request.messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let openai_request = OpenAiRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
            tools: (!tools.is_empty()).then(|| Self::convert_tools(tools)),
            tool_choice: (!tools.is_empty()).then(|| "auto".to_owned()),
        };

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&openai_request);

        let response = self.add_auth_header(http_request).send().await.map_err(|e| {
            error!("Failed to send request to model endpoint: {e}");
            if e.is_connect() || e.is_timeout() {
                AppError::external_unavailable(
                    SERVICE,
                    format!("cannot reach {}: {e}", self.config.base_url),
                )
            } else {
                AppError::external_service(SERVICE, format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let openai_response: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
            error!(
                "Failed to parse model response: {e} - body: {}",
                &body[..body.len().min(500)]
            );
            AppError::external_service(SERVICE, format!("failed to parse response: {e}"))
        })?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(SERVICE, "API returned no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .map(Self::convert_tool_calls)
            .unwrap_or_default();

        debug!(
            content_len = choice.message.content.as_ref().map(String::len),
            tool_calls = tool_calls.len(),
            finish_reason = ?choice.finish_reason,
            "Received model response"
        );

        Ok(ModelResponse {
            content: choice.message.content,
            tool_calls,
            model: openai_response.model,
            finish_reason: choice.finish_reason,
        })
    }
}
