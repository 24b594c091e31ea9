// ABOUTME: Task domain model and the TaskStore boundary consumed by the tool layer
// ABOUTME: Defines typed store errors so tool failures can be mapped without string matching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Task Store Boundary
//!
//! The agent core never touches task storage directly; all mutations flow
//! through [`TaskStore`], an async trait with typed errors. The crate ships
//! a SQLite reference implementation in [`sqlite`], but any backend that
//! honors the trait contract (per-user scoping, typed errors) can be
//! plugged in.

mod sqlite;

pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Completion state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task still needs doing
    Open,
    /// Task has been completed
    Done,
}

impl TaskStatus {
    /// String representation used for storage and tool payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Priority of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Can wait
    Low,
    /// Default priority
    Medium,
    /// Needs attention soon
    High,
}

impl TaskPriority {
    /// String representation used for storage and tool payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A task owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Short description of the work
    pub title: String,
    /// Optional free-form notes
    pub notes: Option<String>,
    /// Priority
    pub priority: TaskPriority,
    /// Optional due date (ISO 8601 date)
    pub due_date: Option<String>,
    /// Completion state
    pub status: TaskStatus,
    /// When the task was created (ISO 8601)
    pub created_at: String,
    /// When the task was last modified (ISO 8601)
    pub updated_at: String,
}

/// Fields for creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    /// Task title (must be non-empty)
    pub title: String,
    /// Optional notes
    pub notes: Option<String>,
    /// Priority, defaulting to medium when absent
    pub priority: Option<TaskPriority>,
    /// Optional due date
    pub due_date: Option<String>,
}

/// Partial update applied to an existing task
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    /// New title
    pub title: Option<String>,
    /// New notes
    pub notes: Option<String>,
    /// New priority
    pub priority: Option<TaskPriority>,
    /// New due date
    pub due_date: Option<String>,
    /// New completion state
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    /// Whether the patch changes anything at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
    }
}

/// Filter applied when listing tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to a completion state
    pub status: Option<TaskStatus>,
    /// Restrict to a priority
    pub priority: Option<TaskPriority>,
    /// Case-insensitive substring match on the title
    pub search: Option<String>,
}

/// Typed errors surfaced by task store implementations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStoreError {
    /// No task with the given ID exists for the user
    NotFound,
    /// The request violates a store-side validation rule
    Validation(String),
    /// The task exists but belongs to another user
    Forbidden,
    /// The backend is unreachable or failed transiently
    Unavailable(String),
}

impl fmt::Display for TaskStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "task not found"),
            Self::Validation(reason) => write!(f, "validation failed: {reason}"),
            Self::Forbidden => write!(f, "task belongs to another user"),
            Self::Unavailable(reason) => write!(f, "task store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for TaskStoreError {}

/// Result alias for store operations
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// The CRUD surface the tool layer is allowed to use.
///
/// Every operation is scoped to a user ID; implementations must never let
/// one user observe or mutate another user's tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create one task for the user
    async fn create_task(&self, user_id: &str, new_task: NewTask) -> TaskStoreResult<Task>;

    /// List the user's tasks matching the filter, newest first
    async fn list_tasks(&self, user_id: &str, filter: &TaskFilter) -> TaskStoreResult<Vec<Task>>;

    /// Fetch a single task by ID
    async fn get_task(&self, user_id: &str, task_id: &str) -> TaskStoreResult<Task>;

    /// Apply a partial update and return the updated task
    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> TaskStoreResult<Task>;

    /// Remove a task permanently
    async fn delete_task(&self, user_id: &str, task_id: &str) -> TaskStoreResult<()>;
}
