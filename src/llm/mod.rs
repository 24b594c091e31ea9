// ABOUTME: Model capability abstraction for pluggable chat-completion endpoints
// ABOUTME: Defines the message, request, and response types shared by providers and the orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Model Capability Boundary
//!
//! The orchestrator treats the language model as an opaque, fallible
//! capability: given ordered messages, tool declarations, and the system
//! policy, it returns either tool-invocation requests or text. Providers
//! implement [`ModelProvider`]; the crate ships an OpenAI-compatible HTTP
//! implementation that works against Ollama, vLLM, and similar endpoints.

mod openai_compatible;
pub mod prompts;

pub use openai_compatible::OpenAiCompatibleProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppResult;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to the string representation used on the wire and in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A tool made visible to the model capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Tool name the model must echo back to invoke it
    pub name: String,
    /// Description guiding the model's choice
    pub description: String,
    /// JSON Schema for the tool's arguments
    pub parameters: Value,
}

/// Configuration for a chat completion request
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Conversation messages, oldest first
    pub messages: Vec<ChatMessage>,
    /// Model identifier (provider default when `None`)
    pub model: Option<String>,
    /// Temperature for response randomness
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    /// Create a new request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the model to use
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A tool invocation requested by the model, before any validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawToolCall {
    /// Name of the tool the model wants to invoke
    pub name: String,
    /// Arguments as produced by the model (untrusted)
    pub arguments: Value,
}

/// Response from a chat completion
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Text content, if the model produced any
    pub content: Option<String>,
    /// Tool invocations requested by the model
    pub tool_calls: Vec<RawToolCall>,
    /// Model that produced the response
    pub model: String,
    /// Finish reason as reported by the endpoint
    pub finish_reason: Option<String>,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Model capability trait for chat completion with tool calling.
///
/// Implementations are treated as fallible and possibly slow; retry policy
/// lives in the orchestrator, not here.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Unique provider identifier (e.g. "ollama", "vllm")
    fn name(&self) -> &'static str;

    /// Default model used when the request does not specify one
    fn default_model(&self) -> &str;

    /// Perform a chat completion, exposing the given tool declarations
    async fn complete(
        &self,
        request: &ModelRequest,
        tools: &[ToolDeclaration],
    ) -> AppResult<ModelResponse>;
}
