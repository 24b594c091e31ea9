// ABOUTME: The five builtin task tools: add, list, complete, delete, update
// ABOUTME: Shared reference resolution surfaces ambiguity as data instead of picking a winner
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Builtin Tools
//!
//! Each tool normalizes its store response into a declared output shape
//! and maps store errors through the [`ToolOutcome`] conversion. Task
//! references (an ID or a title fragment) are resolved by
//! [`resolve_reference`]; a fragment matching several tasks produces an
//! `ambiguous_reference` failure carrying the candidates; the tool never
//! picks one.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::errors::AppResult;
use crate::tasks::{
    NewTask, Task, TaskFilter, TaskPatch, TaskPriority, TaskStatus, TaskStoreError,
};

use super::context::ToolExecutionContext;
use super::result::ToolOutcome;
use super::schema::{JsonSchema, PropertySchema};
use super::traits::{TaskTool, ToolCapabilities};

/// Normalized task payload used by every tool's output
fn task_payload(task: &Task) -> Value {
    serde_json::json!({
        "id": task.id,
        "title": task.title,
        "notes": task.notes,
        "priority": task.priority.as_str(),
        "due_date": task.due_date,
        "status": task.status.as_str(),
        "created_at": task.created_at,
        "updated_at": task.updated_at,
    })
}

/// Compact candidate payload for ambiguity reporting
fn candidate_payload(tasks: &[Task]) -> Value {
    Value::Array(
        tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "title": t.title,
                    "status": t.status.as_str(),
                })
            })
            .collect(),
    )
}

/// Resolve a task reference (ID or title fragment) to exactly one task.
///
/// Returns `Err(outcome)` with the failure to report when resolution does
/// not land on a single task.
async fn resolve_reference(
    context: &ToolExecutionContext,
    reference: &str,
) -> Result<Task, Box<ToolOutcome>> {
    let reference = reference.trim();
    if reference.is_empty() {
        // An empty fragment would substring-match every task
        return Err(Box::new(ToolOutcome::invalid_arguments(vec![
            "field 'task' must not be empty".to_owned(),
        ])));
    }

    // Exact ID wins outright
    match context.task_store.get_task(&context.user_id, reference).await {
        Ok(task) => return Ok(task),
        Err(TaskStoreError::NotFound) => {}
        Err(other) => return Err(Box::new(ToolOutcome::from(other))),
    }

    let all = match context
        .task_store
        .list_tasks(&context.user_id, &TaskFilter::default())
        .await
    {
        Ok(tasks) => tasks,
        Err(e) => return Err(Box::new(ToolOutcome::from(e))),
    };

    let needle = reference.to_lowercase();
    let mut matches: Vec<Task> = all
        .into_iter()
        .filter(|t| t.title.to_lowercase().contains(&needle))
        .collect();

    if matches.len() > 1 {
        return Err(Box::new(ToolOutcome::ambiguous(
            reference,
            candidate_payload(&matches),
        )));
    }
    matches
        .pop()
        .ok_or_else(|| Box::new(ToolOutcome::from(TaskStoreError::NotFound)))
}

fn reference_property() -> PropertySchema {
    PropertySchema::string("Task reference: a task ID or a distinctive part of its title")
}

/// Output shape shared by the tools that return one task
fn single_task_output() -> JsonSchema {
    let mut properties = HashMap::new();
    properties.insert(
        "task".to_owned(),
        PropertySchema::object("The task after the operation"),
    );
    JsonSchema::object(properties, &["task"])
}

fn string_arg(args: &Value, name: &str) -> Option<String> {
    args.get(name).and_then(Value::as_str).map(str::to_owned)
}

fn priority_arg(args: &Value) -> Option<TaskPriority> {
    string_arg(args, "priority").and_then(|p| TaskPriority::parse(&p))
}

// ============================================================================
// add_task
// ============================================================================

/// Creates one task from a title and optional attributes
pub struct AddTaskTool;

#[async_trait]
impl TaskTool for AddTaskTool {
    fn name(&self) -> &'static str {
        "add_task"
    }

    fn description(&self) -> &'static str {
        "Create a new task. Requires a title; priority, due date, and notes are optional."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "title".to_owned(),
            PropertySchema::string("Short description of the task (required, non-empty)"),
        );
        properties.insert(
            "priority".to_owned(),
            PropertySchema::string_enum("Task priority", &["low", "medium", "high"]),
        );
        properties.insert(
            "due_date".to_owned(),
            PropertySchema::string("Due date in YYYY-MM-DD form"),
        );
        properties.insert(
            "notes".to_owned(),
            PropertySchema::string("Free-form notes attached to the task"),
        );
        JsonSchema::object(properties, &["title"])
    }

    fn output_schema(&self) -> JsonSchema {
        single_task_output()
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_TASKS
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> AppResult<ToolOutcome> {
        let title = string_arg(&args, "title").unwrap_or_default();
        if title.trim().is_empty() {
            return Ok(ToolOutcome::invalid_arguments(vec![
                "field 'title' must not be empty".to_owned(),
            ]));
        }

        let new_task = NewTask {
            title,
            notes: string_arg(&args, "notes"),
            priority: priority_arg(&args),
            due_date: string_arg(&args, "due_date"),
        };

        match context.task_store.create_task(&context.user_id, new_task).await {
            Ok(task) => Ok(ToolOutcome::ok(
                serde_json::json!({ "task": task_payload(&task) }),
            )),
            Err(e) => Ok(ToolOutcome::from(e)),
        }
    }
}

// ============================================================================
// list_tasks
// ============================================================================

/// Returns the user's tasks, optionally filtered
pub struct ListTasksTool;

#[async_trait]
impl TaskTool for ListTasksTool {
    fn name(&self) -> &'static str {
        "list_tasks"
    }

    fn description(&self) -> &'static str {
        "List the user's tasks. Optional filters: status, priority, and a title search string."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "status".to_owned(),
            PropertySchema::string_enum("Only tasks in this state", &["open", "done"]),
        );
        properties.insert(
            "priority".to_owned(),
            PropertySchema::string_enum("Only tasks with this priority", &["low", "medium", "high"]),
        );
        properties.insert(
            "search".to_owned(),
            PropertySchema::string("Only tasks whose title contains this text"),
        );
        JsonSchema::object(properties, &[])
    }

    fn output_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "tasks".to_owned(),
            PropertySchema::array("Matching tasks, newest first"),
        );
        properties.insert(
            "count".to_owned(),
            PropertySchema::integer("Number of matching tasks"),
        );
        JsonSchema::object(properties, &["tasks", "count"])
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_TASKS
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> AppResult<ToolOutcome> {
        let filter = TaskFilter {
            status: string_arg(&args, "status").and_then(|s| TaskStatus::parse(&s)),
            priority: priority_arg(&args),
            search: string_arg(&args, "search"),
        };

        match context.task_store.list_tasks(&context.user_id, &filter).await {
            Ok(tasks) => {
                let payload: Vec<Value> = tasks.iter().map(task_payload).collect();
                Ok(ToolOutcome::ok(serde_json::json!({
                    "tasks": payload,
                    "count": payload.len(),
                })))
            }
            Err(e) => Ok(ToolOutcome::from(e)),
        }
    }
}

// ============================================================================
// complete_task
// ============================================================================

/// Marks one referenced task as done
pub struct CompleteTaskTool;

#[async_trait]
impl TaskTool for CompleteTaskTool {
    fn name(&self) -> &'static str {
        "complete_task"
    }

    fn description(&self) -> &'static str {
        "Mark one task as done. Takes a task ID or an unambiguous title fragment."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert("task".to_owned(), reference_property());
        JsonSchema::object(properties, &["task"])
    }

    fn output_schema(&self) -> JsonSchema {
        single_task_output()
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_TASKS | ToolCapabilities::TAKES_REFERENCE
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> AppResult<ToolOutcome> {
        let reference = string_arg(&args, "task").unwrap_or_default();
        let task = match resolve_reference(context, &reference).await {
            Ok(task) => task,
            Err(outcome) => return Ok(*outcome),
        };

        let patch = TaskPatch {
            status: Some(TaskStatus::Done),
            ..TaskPatch::default()
        };

        match context
            .task_store
            .update_task(&context.user_id, &task.id, patch)
            .await
        {
            Ok(updated) => Ok(ToolOutcome::ok(
                serde_json::json!({ "task": task_payload(&updated) }),
            )),
            Err(e) => Ok(ToolOutcome::from(e)),
        }
    }
}

// ============================================================================
// delete_task
// ============================================================================

/// Removes one referenced task permanently
pub struct DeleteTaskTool;

#[async_trait]
impl TaskTool for DeleteTaskTool {
    fn name(&self) -> &'static str {
        "delete_task"
    }

    fn description(&self) -> &'static str {
        "Delete one task permanently. Takes a task ID or an unambiguous title fragment."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert("task".to_owned(), reference_property());
        JsonSchema::object(properties, &["task"])
    }

    fn output_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "deleted".to_owned(),
            PropertySchema::boolean("Always true on success"),
        );
        properties.insert(
            "task".to_owned(),
            PropertySchema::object("ID and title of the removed task"),
        );
        JsonSchema::object(properties, &["deleted", "task"])
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_TASKS | ToolCapabilities::TAKES_REFERENCE
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> AppResult<ToolOutcome> {
        let reference = string_arg(&args, "task").unwrap_or_default();
        let task = match resolve_reference(context, &reference).await {
            Ok(task) => task,
            Err(outcome) => return Ok(*outcome),
        };

        match context
            .task_store
            .delete_task(&context.user_id, &task.id)
            .await
        {
            Ok(()) => Ok(ToolOutcome::ok(serde_json::json!({
                "deleted": true,
                "task": { "id": task.id, "title": task.title },
            }))),
            Err(e) => Ok(ToolOutcome::from(e)),
        }
    }
}

// ============================================================================
// update_task
// ============================================================================

/// Mutates one referenced task; at least one field must change
pub struct UpdateTaskTool;

#[async_trait]
impl TaskTool for UpdateTaskTool {
    fn name(&self) -> &'static str {
        "update_task"
    }

    fn description(&self) -> &'static str {
        "Update one task's title, notes, priority, due date, or status. \
         Takes a task reference plus at least one field to change."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert("task".to_owned(), reference_property());
        properties.insert("title".to_owned(), PropertySchema::string("New title"));
        properties.insert("notes".to_owned(), PropertySchema::string("New notes"));
        properties.insert(
            "priority".to_owned(),
            PropertySchema::string_enum("New priority", &["low", "medium", "high"]),
        );
        properties.insert(
            "due_date".to_owned(),
            PropertySchema::string("New due date in YYYY-MM-DD form"),
        );
        properties.insert(
            "status".to_owned(),
            PropertySchema::string_enum("New status", &["open", "done"]),
        );
        JsonSchema::object(properties, &["task"])
    }

    fn output_schema(&self) -> JsonSchema {
        single_task_output()
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_TASKS | ToolCapabilities::TAKES_REFERENCE
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> AppResult<ToolOutcome> {
        let patch = TaskPatch {
            title: string_arg(&args, "title"),
            notes: string_arg(&args, "notes"),
            priority: priority_arg(&args),
            due_date: string_arg(&args, "due_date"),
            status: string_arg(&args, "status").and_then(|s| TaskStatus::parse(&s)),
        };

        if patch.is_empty() {
            return Ok(ToolOutcome::invalid_arguments(vec![
                "update_task requires at least one field to change".to_owned(),
            ]));
        }

        let reference = string_arg(&args, "task").unwrap_or_default();
        let task = match resolve_reference(context, &reference).await {
            Ok(task) => task,
            Err(outcome) => return Ok(*outcome),
        };

        match context
            .task_store
            .update_task(&context.user_id, &task.id, patch)
            .await
        {
            Ok(updated) => Ok(ToolOutcome::ok(
                serde_json::json!({ "task": task_payload(&updated) }),
            )),
            Err(e) => Ok(ToolOutcome::from(e)),
        }
    }
}
