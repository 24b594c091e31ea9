// ABOUTME: Integration tests for schema validation, dispatch, and store-error mapping
// ABOUTME: Exercises the builtin tools against a real SQLite task store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use taskpilot::errors::AppResult;
use taskpilot::tasks::{SqliteTaskStore, TaskFilter, TaskStore};
use taskpilot::tools::{
    FailureKind, JsonSchema, PropertySchema, TaskTool, ToolCapabilities, ToolExecutionContext,
    ToolExecutor, ToolOutcome, ToolRegistry, ToolStatus,
};

async fn setup() -> (ToolExecutor, ToolExecutionContext, Arc<SqliteTaskStore>, common::TestDatabase)
{
    let db = common::test_database().await;
    let task_store = Arc::new(SqliteTaskStore::new(db.database.pool().clone()));
    task_store.migrate().await.unwrap();

    let registry = Arc::new(ToolRegistry::builtin().unwrap());
    let executor = ToolExecutor::new(registry);
    let context = ToolExecutionContext::new("user-1", task_store.clone());
    (executor, context, task_store, db)
}

#[tokio::test]
async fn test_missing_required_argument_never_reaches_store() {
    let (executor, context, task_store, _db) = setup().await;

    let outcome = executor
        .execute("add_task", serde_json::json!({"priority": "high"}), &context)
        .await
        .unwrap();

    assert_eq!(outcome.status, ToolStatus::Failure);
    assert_eq!(outcome.kind, Some(FailureKind::InvalidArguments));

    let tasks = task_store
        .list_tasks("user-1", &TaskFilter::default())
        .await
        .unwrap();
    assert!(tasks.is_empty(), "validation failure must not create a task");
}

#[tokio::test]
async fn test_unknown_argument_is_rejected() {
    let (executor, context, _store, _db) = setup().await;

    let outcome = executor
        .execute(
            "add_task",
            serde_json::json!({"title": "x", "color": "red"}),
            &context,
        )
        .await
        .unwrap();

    assert_eq!(outcome.kind, Some(FailureKind::InvalidArguments));
}

#[tokio::test]
async fn test_add_task_normalizes_store_response() {
    let (executor, context, _store, _db) = setup().await;

    let outcome = executor
        .execute(
            "add_task",
            serde_json::json!({"title": "buy milk", "priority": "high"}),
            &context,
        )
        .await
        .unwrap();

    assert!(outcome.is_success());
    let task = &outcome.payload["task"];
    assert_eq!(task["title"], "buy milk");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["status"], "open");
    assert!(task["id"].as_str().is_some());
}

#[tokio::test]
async fn test_ambiguous_reference_returns_candidates_and_mutates_nothing() {
    let (executor, context, task_store, _db) = setup().await;

    for title in ["buy milk", "buy bread"] {
        executor
            .execute("add_task", serde_json::json!({"title": title}), &context)
            .await
            .unwrap();
    }

    let outcome = executor
        .execute("complete_task", serde_json::json!({"task": "buy"}), &context)
        .await
        .unwrap();

    assert_eq!(outcome.kind, Some(FailureKind::AmbiguousReference));
    let candidates = outcome.payload["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 2);

    // Neither task was completed
    let tasks = task_store
        .list_tasks("user-1", &TaskFilter::default())
        .await
        .unwrap();
    assert!(tasks.iter().all(|t| t.status.as_str() == "open"));
}

#[tokio::test]
async fn test_reference_to_missing_task_maps_to_not_found() {
    let (executor, context, _store, _db) = setup().await;

    let outcome = executor
        .execute(
            "delete_task",
            serde_json::json!({"task": "no such thing"}),
            &context,
        )
        .await
        .unwrap();

    assert_eq!(outcome.kind, Some(FailureKind::NotFound));
}

#[tokio::test]
async fn test_complete_task_by_title_fragment() {
    let (executor, context, _store, _db) = setup().await;

    executor
        .execute("add_task", serde_json::json!({"title": "water the plants"}), &context)
        .await
        .unwrap();

    let outcome = executor
        .execute("complete_task", serde_json::json!({"task": "plants"}), &context)
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.payload["task"]["status"], "done");
}

#[tokio::test]
async fn test_update_task_requires_a_change() {
    let (executor, context, _store, _db) = setup().await;

    executor
        .execute("add_task", serde_json::json!({"title": "write report"}), &context)
        .await
        .unwrap();

    let outcome = executor
        .execute("update_task", serde_json::json!({"task": "report"}), &context)
        .await
        .unwrap();

    assert_eq!(outcome.kind, Some(FailureKind::InvalidArguments));
}

#[tokio::test]
async fn test_update_task_applies_patch() {
    let (executor, context, _store, _db) = setup().await;

    executor
        .execute("add_task", serde_json::json!({"title": "write report"}), &context)
        .await
        .unwrap();

    let outcome = executor
        .execute(
            "update_task",
            serde_json::json!({"task": "report", "priority": "high", "due_date": "2026-09-01"}),
            &context,
        )
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.payload["task"]["priority"], "high");
    assert_eq!(outcome.payload["task"]["due_date"], "2026-09-01");
}

#[tokio::test]
async fn test_list_tasks_applies_filters() {
    let (executor, context, _store, _db) = setup().await;

    executor
        .execute("add_task", serde_json::json!({"title": "a", "priority": "high"}), &context)
        .await
        .unwrap();
    executor
        .execute("add_task", serde_json::json!({"title": "b", "priority": "low"}), &context)
        .await
        .unwrap();
    executor
        .execute("complete_task", serde_json::json!({"task": "a"}), &context)
        .await
        .unwrap();

    let outcome = executor
        .execute("list_tasks", serde_json::json!({"status": "open"}), &context)
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.payload["count"], 1);
    assert_eq!(outcome.payload["tasks"][0]["title"], "b");
}

#[tokio::test]
async fn test_tasks_are_scoped_per_user() {
    let (executor, context, task_store, _db) = setup().await;

    executor
        .execute("add_task", serde_json::json!({"title": "mine"}), &context)
        .await
        .unwrap();

    let other = ToolExecutionContext::new("user-2", task_store);
    let outcome = executor
        .execute("list_tasks", serde_json::json!({}), &other)
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.payload["count"], 0);
}

#[tokio::test]
async fn test_unregistered_tool_is_an_internal_error() {
    let (executor, context, _store, _db) = setup().await;

    let result = executor
        .execute("drop_everything", serde_json::json!({}), &context)
        .await;

    assert!(result.is_err());
}

/// A tool whose success payload does not match its declared output shape
struct ContractBreakingTool;

#[async_trait]
impl TaskTool for ContractBreakingTool {
    fn name(&self) -> &'static str {
        "break_contract"
    }

    fn description(&self) -> &'static str {
        "Returns a payload outside its declared shape"
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::empty_object()
    }

    fn output_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert("task".to_owned(), PropertySchema::object("The task"));
        JsonSchema::object(properties, &["task"])
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_TASKS
    }

    async fn execute(&self, _args: Value, _context: &ToolExecutionContext) -> AppResult<ToolOutcome> {
        Ok(ToolOutcome::ok(serde_json::json!({"wrong_field": true})))
    }
}

#[tokio::test]
async fn test_output_contract_violation_is_an_internal_error() {
    let (_ignored, context, _store, _db) = setup().await;

    let mut registry = ToolRegistry::new();
    assert!(registry.register(Arc::new(ContractBreakingTool)));
    let executor = ToolExecutor::new(Arc::new(registry));

    let result = executor
        .execute("break_contract", serde_json::json!({}), &context)
        .await;

    assert!(result.is_err(), "contract violation must not surface as a tool outcome");
}
