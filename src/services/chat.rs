// ABOUTME: Chat service façade: ownership checks, turn serialization, and transcript persistence
// ABOUTME: Turns run on a detached task so caller cancellation never truncates the audit trail
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Chat Service
//!
//! Request-level façade over the orchestrator. Each call:
//!
//! 1. resolves the conversation: a supplied ID must belong to the caller
//!    (foreign IDs read as not-found, no cross-user leakage), while no ID
//!    resumes the user's ongoing conversation or lazily creates one;
//! 2. takes the conversation's turn lock; a second message while a turn
//!    is in flight is rejected with `TurnInProgress`, never interleaved;
//! 3. appends the user message, rebuilds the bounded history window, and
//!    runs the orchestrator;
//! 4. persists the terminal assistant message with its tool call records
//!    and returns the transcript delta.
//!
//! Steps 3–4 run on a spawned task: if the HTTP caller times out and its
//! future is dropped, the turn still runs to completion and every
//! acknowledged tool effect is recorded. Audit integrity wins over
//! response delivery.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::database::{
    ConversationRecord, ConversationStore, Database, MessageRecord, ToolCallRecord,
};
use crate::errors::{AppError, AppResult};
use crate::llm::MessageRole;
use crate::tasks::TaskStore;
use crate::tools::ToolExecutionContext;

use super::orchestrator::AgentOrchestrator;

// ============================================================================
// Turn Gate
// ============================================================================

/// Per-conversation turn locks.
///
/// The store's atomic ordinal assignment keeps concurrent appends safe;
/// this gate keeps whole turns from interleaving within one conversation.
#[derive(Default)]
pub struct TurnGate {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TurnGate {
    /// Create an empty gate
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Try to take the turn lock for a conversation without waiting
    #[must_use]
    pub fn try_acquire(&self, conversation_id: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(conversation_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned().ok()
    }
}

// ============================================================================
// Chat Service
// ============================================================================

/// The transcript delta returned for one turn
#[derive(Debug, Clone)]
pub struct TurnDelta {
    /// Conversation the turn belongs to (freshly created when none was supplied)
    pub conversation_id: String,
    /// Terminal assistant reply
    pub reply: String,
    /// Why the turn ended
    pub finish_reason: &'static str,
    /// Tool calls recorded during the turn, in order
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Request-level chat façade
pub struct ChatService {
    database: Database,
    task_store: Arc<dyn TaskStore>,
    orchestrator: Arc<AgentOrchestrator>,
    turn_gate: Arc<TurnGate>,
    history_window: i64,
}

impl ChatService {
    /// Create a new chat service
    #[must_use]
    pub fn new(
        database: Database,
        task_store: Arc<dyn TaskStore>,
        orchestrator: Arc<AgentOrchestrator>,
        turn_gate: Arc<TurnGate>,
        history_window: i64,
    ) -> Self {
        Self {
            database,
            task_store,
            orchestrator,
            turn_gate,
            history_window,
        }
    }

    /// Handle one user message end to end.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank text, `ResourceNotFound` for a
    /// missing or foreign conversation, `TurnInProgress` when another turn
    /// holds the conversation, and database errors on persistence failure.
    pub async fn handle_user_message(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        text: &str,
    ) -> AppResult<TurnDelta> {
        let text = text.trim().to_owned();
        if text.is_empty() {
            return Err(AppError::invalid_input("message text must not be empty"));
        }
        if user_id.trim().is_empty() {
            return Err(AppError::invalid_input("user_id must not be empty"));
        }

        let store = ConversationStore::new(self.database.pool().clone());
        let conversation = self
            .resolve_conversation(&store, user_id, conversation_id)
            .await?;

        let Some(guard) = self.turn_gate.try_acquire(&conversation.id) else {
            return Err(AppError::turn_in_progress(conversation.id));
        };

        // Detach the turn: if the caller's request future is dropped, the
        // turn still completes and its tool calls are persisted.
        let turn = TurnRunner {
            store,
            task_store: Arc::clone(&self.task_store),
            orchestrator: Arc::clone(&self.orchestrator),
            history_window: self.history_window,
        };
        let user_id = user_id.to_owned();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            turn.run(&user_id, conversation, &text).await
        });

        handle
            .await
            .map_err(|e| AppError::internal(format!("turn task failed: {e}")))?
    }

    /// Load a conversation's transcript with attached tool calls.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` when the conversation does not exist or
    /// belongs to another user.
    pub async fn load_transcript(
        &self,
        user_id: &str,
        conversation_id: &str,
        limit: i64,
    ) -> AppResult<Vec<(MessageRecord, Vec<ToolCallRecord>)>> {
        let store = ConversationStore::new(self.database.pool().clone());

        let conversation = store
            .get_conversation(conversation_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        let messages = store.load_history(&conversation.id, limit).await?;
        let mut transcript = Vec::with_capacity(messages.len());
        for message in messages {
            let calls = if message.role == MessageRole::Assistant.as_str() {
                store.load_tool_calls(&message.id).await?
            } else {
                Vec::new()
            };
            transcript.push((message, calls));
        }

        Ok(transcript)
    }

    /// Find the caller's conversation, resume their ongoing one, or create
    /// one lazily on first interaction
    async fn resolve_conversation(
        &self,
        store: &ConversationStore,
        user_id: &str,
        conversation_id: Option<&str>,
    ) -> AppResult<ConversationRecord> {
        match conversation_id {
            Some(id) => store
                .get_conversation(id)
                .await?
                // A foreign conversation reads as not-found, never as forbidden
                .filter(|c| c.user_id == user_id)
                .ok_or_else(|| AppError::not_found("Conversation")),
            None => {
                debug!(user = user_id, "Resolving ongoing conversation");
                store.get_or_create_conversation(user_id).await
            }
        }
    }
}

/// Owned state for one detached turn
struct TurnRunner {
    store: ConversationStore,
    task_store: Arc<dyn TaskStore>,
    orchestrator: Arc<AgentOrchestrator>,
    history_window: i64,
}

impl TurnRunner {
    async fn run(
        &self,
        user_id: &str,
        conversation: ConversationRecord,
        text: &str,
    ) -> AppResult<TurnDelta> {
        self.store
            .append_message(&conversation.id, MessageRole::User, text)
            .await?;

        let history = self
            .store
            .load_history(&conversation.id, self.history_window)
            .await?;

        let context = ToolExecutionContext::new(user_id, Arc::clone(&self.task_store));
        let outcome = self.orchestrator.run_turn(&context, &history).await?;

        let assistant_msg = self
            .store
            .append_message(&conversation.id, MessageRole::Assistant, &outcome.reply)
            .await?;

        let mut tool_calls = Vec::with_capacity(outcome.tool_calls.len());
        for call in &outcome.tool_calls {
            let record = self
                .store
                .append_tool_call(
                    &assistant_msg.id,
                    &call.tool_name,
                    &call.arguments,
                    &call.outcome,
                )
                .await?;
            tool_calls.push(record);
        }

        info!(
            conversation = %conversation.id,
            finish_reason = outcome.finish_reason.as_str(),
            tool_calls = tool_calls.len(),
            "Turn completed"
        );

        Ok(TurnDelta {
            conversation_id: conversation.id,
            reply: outcome.reply,
            finish_reason: outcome.finish_reason.as_str(),
            tool_calls,
        })
    }
}
