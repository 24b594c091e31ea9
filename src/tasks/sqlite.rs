// ABOUTME: SQLite reference implementation of the TaskStore trait
// ABOUTME: Maps sqlx rows and errors into the typed task domain model
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    NewTask, Task, TaskFilter, TaskPatch, TaskPriority, TaskStatus, TaskStore, TaskStoreError,
    TaskStoreResult,
};

/// Task store backed by a SQLite `tasks` table
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Create a new store over an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `tasks` table if it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    pub async fn migrate(&self) -> TaskStoreResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                notes TEXT,
                priority TEXT NOT NULL DEFAULT 'medium',
                due_date TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id)")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> TaskStoreResult<Task> {
        let priority: String = row.get("priority");
        let status: String = row.get("status");
        Ok(Task {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            notes: row.get("notes"),
            priority: TaskPriority::parse(&priority)
                .ok_or_else(|| TaskStoreError::Validation(format!("bad priority: {priority}")))?,
            due_date: row.get("due_date"),
            status: TaskStatus::parse(&status)
                .ok_or_else(|| TaskStoreError::Validation(format!("bad status: {status}")))?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

fn unavailable(e: sqlx::Error) -> TaskStoreError {
    TaskStoreError::Unavailable(e.to_string())
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create_task(&self, user_id: &str, new_task: NewTask) -> TaskStoreResult<Task> {
        let title = new_task.title.trim();
        if title.is_empty() {
            return Err(TaskStoreError::Validation("title must not be empty".into()));
        }

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let priority = new_task.priority.unwrap_or(TaskPriority::Medium);

        sqlx::query(
            r"
            INSERT INTO tasks (id, user_id, title, notes, priority, due_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'open', $7, $7)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(title)
        .bind(&new_task.notes)
        .bind(priority.as_str())
        .bind(&new_task.due_date)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(Task {
            id,
            user_id: user_id.to_owned(),
            title: title.to_owned(),
            notes: new_task.notes,
            priority,
            due_date: new_task.due_date,
            status: TaskStatus::Open,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn list_tasks(&self, user_id: &str, filter: &TaskFilter) -> TaskStoreResult<Vec<Task>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, notes, priority, due_date, status, created_at, updated_at
            FROM tasks
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(Self::row_to_task(row)?);
        }

        // Filters are narrow enough to apply in memory after the user scope
        if let Some(status) = filter.status {
            tasks.retain(|t| t.status == status);
        }
        if let Some(priority) = filter.priority {
            tasks.retain(|t| t.priority == priority);
        }
        if let Some(ref search) = filter.search {
            let needle = search.to_lowercase();
            tasks.retain(|t| t.title.to_lowercase().contains(&needle));
        }

        Ok(tasks)
    }

    async fn get_task(&self, user_id: &str, task_id: &str) -> TaskStoreResult<Task> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, notes, priority, due_date, status, created_at, updated_at
            FROM tasks
            WHERE id = $1
            ",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or(TaskStoreError::NotFound)?;

        let task = Self::row_to_task(&row)?;
        if task.user_id != user_id {
            return Err(TaskStoreError::Forbidden);
        }
        Ok(task)
    }

    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> TaskStoreResult<Task> {
        if patch.is_empty() {
            return Err(TaskStoreError::Validation(
                "update requires at least one field".into(),
            ));
        }
        if let Some(ref title) = patch.title {
            if title.trim().is_empty() {
                return Err(TaskStoreError::Validation("title must not be empty".into()));
            }
        }

        let mut task = self.get_task(user_id, task_id).await?;

        if let Some(title) = patch.title {
            task.title = title.trim().to_owned();
        }
        if let Some(notes) = patch.notes {
            task.notes = Some(notes);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        task.updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            UPDATE tasks
            SET title = $1, notes = $2, priority = $3, due_date = $4, status = $5, updated_at = $6
            WHERE id = $7 AND user_id = $8
            ",
        )
        .bind(&task.title)
        .bind(&task.notes)
        .bind(task.priority.as_str())
        .bind(&task.due_date)
        .bind(task.status.as_str())
        .bind(&task.updated_at)
        .bind(task_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(task)
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> TaskStoreResult<()> {
        // Ownership check first so a foreign ID maps to Forbidden, not NotFound
        self.get_task(user_id, task_id).await?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::NotFound);
        }
        Ok(())
    }
}
