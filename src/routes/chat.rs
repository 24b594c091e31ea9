// ABOUTME: Chat route handlers exposing the turn endpoint and transcript retrieval
// ABOUTME: Maps service results and AppError codes onto the JSON wire contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Chat Routes
//!
//! One endpoint accepts a user message and returns the turn's transcript
//! delta; a second returns the stored transcript for auditing. The
//! authentication layer is external to this crate; handlers trust the
//! `user_id` the caller supplies and enforce ownership at the data layer.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::context::ServerResources;
use crate::database::{MessageRecord, ToolCallRecord};
use crate::errors::AppError;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to send a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// User sending the message
    pub user_id: String,
    /// Existing conversation, or absent to start a new one
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Message text
    pub text: String,
}

/// One recorded tool call in a response
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCallResponse {
    /// Tool call ID
    pub id: String,
    /// Tool that ran
    pub tool_name: String,
    /// Arguments it ran with
    pub arguments: Value,
    /// "success" or "failure"
    pub status: String,
    /// Failure classification, when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    /// Result payload or failure detail
    pub payload: Value,
}

impl From<ToolCallRecord> for ToolCallResponse {
    fn from(record: ToolCallRecord) -> Self {
        Self {
            id: record.id,
            tool_name: record.tool_name,
            arguments: record.arguments,
            status: record.status,
            failure_kind: record.failure_kind,
            payload: record.payload,
        }
    }
}

/// Response for one completed turn
#[derive(Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Conversation the turn belongs to
    pub conversation_id: String,
    /// Terminal assistant reply
    pub reply: String,
    /// Why the turn ended
    pub finish_reason: String,
    /// Tool calls recorded during the turn
    pub tool_calls: Vec<ToolCallResponse>,
}

/// One message in a transcript response
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// Message ID
    pub id: String,
    /// Role (user/assistant/system)
    pub role: String,
    /// Message content
    pub content: String,
    /// Replay position within the conversation
    pub ordinal: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Tool calls attached to this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallResponse>,
}

/// Transcript response
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    /// Conversation ID
    pub conversation_id: String,
    /// Messages oldest first
    pub messages: Vec<TranscriptMessage>,
}

/// Query parameters for transcript retrieval
#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    /// Requesting user (ownership is enforced)
    pub user_id: String,
    /// Maximum number of messages to return
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    100
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat/messages", post(Self::send_message))
            .route(
                "/api/chat/conversations/:conversation_id/messages",
                get(Self::get_transcript),
            )
            .route("/health", get(Self::health))
            .with_state(resources)
    }

    /// Handle one user message and return the transcript delta
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let delta = resources
            .chat
            .handle_user_message(
                &request.user_id,
                request.conversation_id.as_deref(),
                &request.text,
            )
            .await?;

        let response = TurnResponse {
            conversation_id: delta.conversation_id,
            reply: delta.reply,
            finish_reason: delta.finish_reason.to_owned(),
            tool_calls: delta
                .tool_calls
                .into_iter()
                .map(ToolCallResponse::from)
                .collect(),
        };

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Return the stored transcript for a conversation
    async fn get_transcript(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<String>,
        Query(query): Query<TranscriptQuery>,
    ) -> Result<Response, AppError> {
        let transcript = resources
            .chat
            .load_transcript(&query.user_id, &conversation_id, query.limit)
            .await?;

        let messages = transcript
            .into_iter()
            .map(|(message, calls)| Self::transcript_message(message, calls))
            .collect();

        let response = TranscriptResponse {
            conversation_id,
            messages,
        };

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Liveness probe
    async fn health() -> Response {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "service": "taskpilot",
                "tools_version": crate::tools::TOOL_REGISTRY_VERSION,
            })),
        )
            .into_response()
    }

    fn transcript_message(
        message: MessageRecord,
        calls: Vec<ToolCallRecord>,
    ) -> TranscriptMessage {
        TranscriptMessage {
            id: message.id,
            role: message.role,
            content: message.content,
            ordinal: message.ordinal,
            created_at: message.created_at,
            tool_calls: calls.into_iter().map(ToolCallResponse::from).collect(),
        }
    }
}
