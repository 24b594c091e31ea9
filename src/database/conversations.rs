// ABOUTME: Append-only persistence for conversations, messages, and tool call records
// ABOUTME: Ordinal assignment is atomic with the message insert so replay order has no gaps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::llm::MessageRole;
use crate::tools::{FailureKind, ToolOutcome};

// ============================================================================
// Record Types
// ============================================================================

/// Stored representation of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: String,
    /// User who owns the conversation
    pub user_id: String,
    /// When the conversation was created (ISO 8601)
    pub created_at: String,
    /// When a message was last appended (ISO 8601)
    pub last_active_at: String,
}

/// Stored representation of one turn message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Role of the sender (system, user, assistant)
    pub role: String,
    /// Message content
    pub content: String,
    /// Monotonic position within the conversation
    pub ordinal: i64,
    /// When the message was written (ISO 8601)
    pub created_at: String,
}

/// Stored representation of one tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Unique tool call ID
    pub id: String,
    /// Assistant message this call is attached to
    pub message_id: String,
    /// Name of the invoked tool
    pub tool_name: String,
    /// Arguments the tool was invoked with
    pub arguments: Value,
    /// "success" or "failure"
    pub status: String,
    /// Failure classification, when status is "failure"
    pub failure_kind: Option<String>,
    /// Result payload or failure detail
    pub payload: Value,
    /// When the call was recorded (ISO 8601)
    pub created_at: String,
}

// ============================================================================
// Conversation Store
// ============================================================================

/// Append-only conversation persistence.
///
/// All writes are single-statement or ordered appends; nothing is edited
/// in place, which is what makes the transcript a trustworthy audit trail.
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    /// Create a new store over an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Fetch a conversation by ID
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, created_at, last_active_at
            FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.map(|r| ConversationRecord {
            id: r.get("id"),
            user_id: r.get("user_id"),
            created_at: r.get("created_at"),
            last_active_at: r.get("last_active_at"),
        }))
    }

    /// Return the user's most recently active conversation, creating one
    /// on first interaction.
    ///
    /// # Errors
    ///
    /// Returns a database error if the lookup or insert fails.
    pub async fn get_or_create_conversation(
        &self,
        user_id: &str,
    ) -> AppResult<ConversationRecord> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, created_at, last_active_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY last_active_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up conversation: {e}")))?;

        if let Some(r) = row {
            return Ok(ConversationRecord {
                id: r.get("id"),
                user_id: r.get("user_id"),
                created_at: r.get("created_at"),
                last_active_at: r.get("last_active_at"),
            });
        }

        self.create_conversation(user_id).await
    }

    /// Create a conversation for a user
    ///
    /// # Errors
    ///
    /// Returns a database error if the insert fails.
    pub async fn create_conversation(&self, user_id: &str) -> AppResult<ConversationRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO conversations (id, user_id, created_at, last_active_at)
            VALUES ($1, $2, $3, $3)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(ConversationRecord {
            id,
            user_id: user_id.to_owned(),
            created_at: now.clone(),
            last_active_at: now,
        })
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Append a message, assigning the next ordinal atomically.
    ///
    /// The ordinal is computed inside the insert statement itself, so two
    /// racing appends cannot read the same value; the unique constraint on
    /// `(conversation_id, ordinal)` is the backstop across processes.
    ///
    /// # Errors
    ///
    /// Returns a database error if the insert fails.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<MessageRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, role, content, ordinal, created_at)
            VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(MAX(ordinal), 0) + 1 FROM messages WHERE conversation_id = $2),
                $5
            )
            ",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to append message: {e}")))?;

        sqlx::query("UPDATE conversations SET last_active_at = $1 WHERE id = $2")
            .bind(&now)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to update conversation activity: {e}"))
            })?;

        let row = sqlx::query("SELECT ordinal FROM messages WHERE id = $1")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to read back message: {e}")))?;

        Ok(MessageRecord {
            id,
            conversation_id: conversation_id.to_owned(),
            role: role.as_str().to_owned(),
            content: content.to_owned(),
            ordinal: row.get("ordinal"),
            created_at: now,
        })
    }

    /// Load the last `limit` messages in replay order (oldest first)
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn load_history(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, ordinal, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY ordinal DESC
            LIMIT $2
            ",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load history: {e}")))?;

        let mut messages: Vec<MessageRecord> = rows
            .into_iter()
            .map(|r| MessageRecord {
                id: r.get("id"),
                conversation_id: r.get("conversation_id"),
                role: r.get("role"),
                content: r.get("content"),
                ordinal: r.get("ordinal"),
                created_at: r.get("created_at"),
            })
            .collect();
        messages.reverse();

        Ok(messages)
    }

    // ========================================================================
    // Tool Call Operations
    // ========================================================================

    /// Record a tool invocation against its assistant message
    ///
    /// # Errors
    ///
    /// Returns a database error if serialization or the insert fails.
    pub async fn append_tool_call(
        &self,
        message_id: &str,
        tool_name: &str,
        arguments: &Value,
        outcome: &ToolOutcome,
    ) -> AppResult<ToolCallRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let arguments_text = serde_json::to_string(arguments)
            .map_err(|e| AppError::database(format!("Failed to serialize arguments: {e}")))?;
        let payload_text = serde_json::to_string(&outcome.payload)
            .map_err(|e| AppError::database(format!("Failed to serialize payload: {e}")))?;
        let failure_kind = outcome.kind.map(FailureKind::as_str);

        sqlx::query(
            r"
            INSERT INTO tool_calls (id, message_id, tool_name, arguments, status, failure_kind, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&id)
        .bind(message_id)
        .bind(tool_name)
        .bind(&arguments_text)
        .bind(outcome.status.as_str())
        .bind(failure_kind)
        .bind(&payload_text)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to record tool call: {e}")))?;

        Ok(ToolCallRecord {
            id,
            message_id: message_id.to_owned(),
            tool_name: tool_name.to_owned(),
            arguments: arguments.clone(),
            status: outcome.status.as_str().to_owned(),
            failure_kind: failure_kind.map(ToOwned::to_owned),
            payload: outcome.payload.clone(),
            created_at: now,
        })
    }

    /// Load the tool calls attached to a message, oldest first
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn load_tool_calls(&self, message_id: &str) -> AppResult<Vec<ToolCallRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, message_id, tool_name, arguments, status, failure_kind, payload, created_at
            FROM tool_calls
            WHERE message_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load tool calls: {e}")))?;

        let records = rows
            .into_iter()
            .map(|r| {
                let arguments_text: String = r.get("arguments");
                let payload_text: String = r.get("payload");
                ToolCallRecord {
                    id: r.get("id"),
                    message_id: r.get("message_id"),
                    tool_name: r.get("tool_name"),
                    arguments: serde_json::from_str(&arguments_text).unwrap_or(Value::Null),
                    status: r.get("status"),
                    failure_kind: r.get("failure_kind"),
                    payload: serde_json::from_str(&payload_text).unwrap_or(Value::Null),
                    created_at: r.get("created_at"),
                }
            })
            .collect();

        Ok(records)
    }
}
