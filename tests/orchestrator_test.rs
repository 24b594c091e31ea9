// ABOUTME: Integration tests for the bounded resolve/dispatch loop with a scripted model
// ABOUTME: Covers the happy path, clarification, loop limit, retries, and policy leaks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{clarification, malformed, text, tool_call, ScriptedProvider, ScriptedStep};
use taskpilot::config::OrchestratorConfig;
use taskpilot::database::ConversationStore;
use taskpilot::database::MessageRecord;
use taskpilot::llm::MessageRole;
use taskpilot::services::{AgentOrchestrator, FinishReason};
use taskpilot::tasks::{SqliteTaskStore, TaskFilter, TaskStore};
use taskpilot::tools::{FailureKind, ToolExecutionContext, ToolExecutor, ToolRegistry};

struct Fixture {
    orchestrator: AgentOrchestrator,
    context: ToolExecutionContext,
    task_store: Arc<SqliteTaskStore>,
    store: ConversationStore,
    conversation_id: String,
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
    let orchestrator = AgentOrchestrator::new(executor, provider, limits);

    let store = ConversationStore::new(db.database.pool().clone());
    let conversation = store.create_conversation("user-1").await.unwrap();

    let context =
        ToolExecutionContext::new("user-1", task_store.clone());

    Fixture {
        orchestrator,
        context,
        task_store,
        store,
        conversation_id: conversation.id,
        _db: db,
    }
}

impl Fixture {
    async fn history_after(&self, user_text: &str) -> Vec<MessageRecord> {
        self.store
            .append_message(&self.conversation_id, MessageRole::User, user_text)
            .await
            .unwrap();
        self.store
            .load_history(&self.conversation_id, 20)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_add_task_turn_dispatches_and_confirms() {
    let fixture = setup(vec![
        tool_call("add_task", serde_json::json!({"title": "buy milk"})),
        text("Done — I added \"buy milk\" to your list."),
    ])
    .await;

    let history = fixture.history_after("Add a task to buy milk").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert!(outcome.reply.contains("buy milk"));
    assert_eq!(outcome.tool_calls.len(), 1);
    assert_eq!(outcome.tool_calls[0].tool_name, "add_task");
    assert!(outcome.tool_calls[0].outcome.is_success());

    let tasks = fixture
        .task_store
        .list_tasks("user-1", &TaskFilter::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "buy milk");
}

#[tokio::test]
async fn test_ambiguous_utterance_ends_in_clarification_with_no_tool_calls() {
    let fixture = setup(vec![clarification(
        "Which task do you mean? You have several.",
    )])
    .await;

    let history = fixture.history_after("Mark it done").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Clarification);
    assert!(outcome.reply.contains("Which task"));
    assert!(outcome.tool_calls.is_empty(), "ask_user must not be recorded");
}

#[tokio::test]
async fn test_ambiguous_reference_failure_is_surfaced_not_auto_picked() {
    let fixture = setup(vec![
        tool_call("add_task", serde_json::json!({"title": "buy milk"})),
        text("Added."),
    ])
    .await;
    // Seed a second matching task directly
    let history = fixture.history_after("Add a task to buy milk").await;
    fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();
    fixture
        .task_store
        .create_task(
            "user-1",
            taskpilot::tasks::NewTask {
                title: "buy bread".to_owned(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let fixture2 = Fixture {
        orchestrator: AgentOrchestrator::new(
            Arc::new(ToolExecutor::new(Arc::new(ToolRegistry::builtin().unwrap()))),
            Arc::new(ScriptedProvider::new(vec![
                tool_call("complete_task", serde_json::json!({"task": "buy"})),
                clarification("I found two tasks matching \"buy\" — milk or bread?"),
            ])),
            OrchestratorConfig::default(),
        ),
        ..fixture
    };

    let history = fixture2.history_after("Complete the buy task").await;
    let outcome = fixture2
        .orchestrator
        .run_turn(&fixture2.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Clarification);
    assert_eq!(outcome.tool_calls.len(), 1);
    let call = &outcome.tool_calls[0];
    assert_eq!(call.outcome.kind, Some(FailureKind::AmbiguousReference));

    // No task was mutated
    let tasks = fixture2
        .task_store
        .list_tasks("user-1", &TaskFilter::default())
        .await
        .unwrap();
    assert!(tasks.iter().all(|t| t.status.as_str() == "open"));
}

#[tokio::test]
async fn test_loop_limit_forces_terminal_reply() {
    let steps = (0..6)
        .map(|_| tool_call("list_tasks", serde_json::json!({})))
        .collect();
    let fixture = setup(steps).await;

    let history = fixture.history_after("Keep listing forever").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::LoopLimit);
    assert_eq!(outcome.tool_calls.len(), 5, "one dispatch per allowed iteration");
    assert!(!outcome.reply.is_empty());
}

#[tokio::test]
async fn test_model_failures_are_retried_then_reported_politely() {
    // model_retries = 2 means three attempts per model call
    let fixture = setup(vec![
        ScriptedStep::Fail,
        ScriptedStep::Fail,
        ScriptedStep::Fail,
    ])
    .await;

    let history = fixture.history_after("hello").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::ModelUnavailable);
    assert!(outcome.tool_calls.is_empty());
    assert!(outcome.reply.contains("try again"));
}

#[tokio::test]
async fn test_transient_model_failure_recovers_within_retry_budget() {
    let fixture = setup(vec![ScriptedStep::Fail, text("Hello!")]).await;

    let history = fixture.history_after("hello").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert_eq!(outcome.reply, "Hello!");
}

#[tokio::test]
async fn test_malformed_output_is_rejected_and_corrected() {
    let fixture = setup(vec![malformed(), text("Recovered.")]).await;

    let history = fixture.history_after("hello").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert_eq!(outcome.reply, "Recovered.");
    assert!(outcome.tool_calls.is_empty());
}

#[tokio::test]
async fn test_store_not_found_is_recorded_and_reported() {
    let fixture = setup(vec![
        tool_call("delete_task", serde_json::json!({"task": "launch rocket"})),
        text("I couldn't find a task like that."),
    ])
    .await;

    let history = fixture.history_after("Delete the rocket task").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert_eq!(outcome.tool_calls.len(), 1);
    assert_eq!(
        outcome.tool_calls[0].outcome.kind,
        Some(FailureKind::NotFound)
    );
    assert!(outcome.reply.contains("couldn't find"));
}

#[tokio::test]
async fn test_unregistered_tool_request_aborts_with_generic_apology() {
    let fixture = setup(vec![tool_call("drop_database", serde_json::json!({}))]).await;

    let history = fixture.history_after("hello").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::InternalError);
    assert!(outcome.tool_calls.is_empty());
    // The leaked tool name never reaches the user
    assert!(!outcome.reply.contains("drop_database"));
}

#[tokio::test]
async fn test_chained_tool_calls_within_one_turn() {
    let fixture = setup(vec![
        tool_call("add_task", serde_json::json!({"title": "buy milk"})),
        tool_call("list_tasks", serde_json::json!({})),
        text("Added buy milk; you now have 1 open task."),
    ])
    .await;

    let history = fixture.history_after("Add buy milk and show my list").await;
    let outcome = fixture
        .orchestrator
        .run_turn(&fixture.context, &history)
        .await
        .unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert_eq!(outcome.tool_calls.len(), 2);
    assert_eq!(outcome.tool_calls[0].tool_name, "add_task");
    assert_eq!(outcome.tool_calls[1].tool_name, "list_tasks");
    assert!(outcome.tool_calls.iter().all(|c| c.outcome.is_success()));
}
