// ABOUTME: Execution context handed to tools: the requesting user and the task store handle
// ABOUTME: Carries no mutable state; tools stay stateless between calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

use std::sync::Arc;

use crate::tasks::TaskStore;

/// Context for a single tool execution
#[derive(Clone)]
pub struct ToolExecutionContext {
    /// The user on whose behalf the tool runs; all store calls are scoped to it
    pub user_id: String,
    /// Task store boundary
    pub task_store: Arc<dyn TaskStore>,
}

impl ToolExecutionContext {
    /// Create a new execution context
    #[must_use]
    pub fn new(user_id: impl Into<String>, task_store: Arc<dyn TaskStore>) -> Self {
        Self {
            user_id: user_id.into(),
            task_store,
        }
    }
}
