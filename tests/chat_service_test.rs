// ABOUTME: Integration tests for the chat façade: ownership, turn locking, and persistence
// ABOUTME: Runs full turns end to end against a scripted model and real SQLite storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{clarification, text, tool_call, ScriptedProvider, ScriptedStep};
use taskpilot::config::OrchestratorConfig;
use taskpilot::errors::ErrorCode;
use taskpilot::services::{AgentOrchestrator, ChatService, TurnGate};
use taskpilot::tasks::SqliteTaskStore;
use taskpilot::tools::{ToolExecutor, ToolRegistry};

struct Fixture {
    chat: ChatService,
    turn_gate: Arc<TurnGate>,
    _db: common::TestDatabase,
}

async fn setup(steps: Vec<ScriptedStep>) -> Fixture {
    let db = common::test_database().await;
    let task_store = Arc::new(SqliteTaskStore::new(db.database.pool().clone()));
    task_store.migrate().await.unwrap();

    let registry = Arc::new(ToolRegistry::builtin().unwrap());
    let executor = Arc::new(ToolExecutor::new(registry));
    let provider = Arc::new(ScriptedProvider::new(steps));
    let limits = OrchestratorConfig {
        model_retry_backoff_ms: 1,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(AgentOrchestrator::new(executor, provider, limits));

    let turn_gate = Arc::new(TurnGate::new());
    let chat = ChatService::new(
        db.database.clone(),
        task_store,
        orchestrator,
        Arc::clone(&turn_gate),
        limits.history_window,
    );

    Fixture {
        chat,
        turn_gate,
        _db: db,
    }
}

#[tokio::test]
async fn test_first_message_creates_conversation_and_returns_delta() {
    let fixture = setup(vec![
        tool_call("add_task", serde_json::json!({"title": "buy milk"})),
        text("Added \"buy milk\"."),
    ])
    .await;

    let delta = fixture
        .chat
        .handle_user_message("user-1", None, "Add a task to buy milk")
        .await
        .unwrap();

    assert!(!delta.conversation_id.is_empty());
    assert_eq!(delta.finish_reason, "stop");
    assert!(delta.reply.contains("buy milk"));
    assert_eq!(delta.tool_calls.len(), 1);
    assert_eq!(delta.tool_calls[0].tool_name, "add_task");
    assert_eq!(delta.tool_calls[0].status, "success");
}

#[tokio::test]
async fn test_transcript_round_trip_preserves_order_and_tool_calls() {
    let fixture = setup(vec![
        tool_call("add_task", serde_json::json!({"title": "buy milk"})),
        text("Added."),
        text("You're welcome!"),
    ])
    .await;

    let delta = fixture
        .chat
        .handle_user_message("user-1", None, "Add a task to buy milk")
        .await
        .unwrap();
    fixture
        .chat
        .handle_user_message("user-1", Some(&delta.conversation_id), "thanks")
        .await
        .unwrap();

    let transcript = fixture
        .chat
        .load_transcript("user-1", &delta.conversation_id, 100)
        .await
        .unwrap();

    assert_eq!(transcript.len(), 4);
    let roles: Vec<&str> = transcript.iter().map(|(m, _)| m.role.as_str()).collect();
    assert_eq!(roles, ["user", "assistant", "user", "assistant"]);

    // Ordinals strictly increasing and gap-free
    for (index, (message, _)) in transcript.iter().enumerate() {
        assert_eq!(message.ordinal, i64::try_from(index).unwrap() + 1);
    }

    // The tool call rides on the first assistant message only
    assert_eq!(transcript[1].1.len(), 1);
    assert_eq!(transcript[1].1[0].tool_name, "add_task");
    assert!(transcript[3].1.is_empty());
}

#[tokio::test]
async fn test_foreign_conversation_reads_as_not_found() {
    let fixture = setup(vec![text("Hi!"), text("unused")]).await;

    let delta = fixture
        .chat
        .handle_user_message("user-1", None, "hello")
        .await
        .unwrap();

    let err = fixture
        .chat
        .handle_user_message("user-2", Some(&delta.conversation_id), "steal this")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    let err = fixture
        .chat
        .load_transcript("user-2", &delta.conversation_id, 10)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_omitted_conversation_id_resumes_ongoing_conversation() {
    let fixture = setup(vec![text("Hi!"), text("Hello again!")]).await;

    let first = fixture
        .chat
        .handle_user_message("user-1", None, "hello")
        .await
        .unwrap();
    let second = fixture
        .chat
        .handle_user_message("user-1", None, "hello again")
        .await
        .unwrap();

    assert_eq!(first.conversation_id, second.conversation_id);

    let transcript = fixture
        .chat
        .load_transcript("user-1", &first.conversation_id, 10)
        .await
        .unwrap();
    assert_eq!(transcript.len(), 4);
}

#[tokio::test]
async fn test_unknown_conversation_is_not_found() {
    let fixture = setup(vec![]).await;

    let err = fixture
        .chat
        .handle_user_message("user-1", Some("missing-id"), "hello")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_blank_text_is_rejected_before_any_persistence() {
    let fixture = setup(vec![]).await;

    let err = fixture
        .chat
        .handle_user_message("user-1", None, "   ")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_second_message_during_turn_is_rejected() {
    let fixture = setup(vec![text("Hi!"), text("unused")]).await;

    let delta = fixture
        .chat
        .handle_user_message("user-1", None, "hello")
        .await
        .unwrap();

    // Simulate a turn in flight by holding the conversation's lock
    let guard = fixture.turn_gate.try_acquire(&delta.conversation_id).unwrap();

    let err = fixture
        .chat
        .handle_user_message("user-1", Some(&delta.conversation_id), "again")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TurnInProgress);

    drop(guard);
    let delta = fixture
        .chat
        .handle_user_message("user-1", Some(&delta.conversation_id), "again")
        .await
        .unwrap();
    assert_eq!(delta.reply, "unused");
}

#[tokio::test]
async fn test_clarification_turn_records_no_tool_calls() {
    let fixture = setup(vec![clarification("Which task should I mark done?")]).await;

    let delta = fixture
        .chat
        .handle_user_message("user-1", None, "Mark it done")
        .await
        .unwrap();

    assert_eq!(delta.finish_reason, "clarification");
    assert!(delta.reply.contains("Which task"));
    assert!(delta.tool_calls.is_empty());

    let transcript = fixture
        .chat
        .load_transcript("user-1", &delta.conversation_id, 10)
        .await
        .unwrap();
    assert_eq!(transcript.len(), 2);
    assert!(transcript[1].1.is_empty());
}

#[tokio::test]
async fn test_failed_tool_call_is_still_recorded() {
    let fixture = setup(vec![
        tool_call("delete_task", serde_json::json!({"task": "ghost"})),
        text("There's no task like that."),
    ])
    .await;

    let delta = fixture
        .chat
        .handle_user_message("user-1", None, "Delete the ghost task")
        .await
        .unwrap();

    assert_eq!(delta.tool_calls.len(), 1);
    assert_eq!(delta.tool_calls[0].status, "failure");
    assert_eq!(delta.tool_calls[0].failure_kind.as_deref(), Some("not_found"));
}
