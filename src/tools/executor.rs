// ABOUTME: Tool executor: schema validation, dispatch, and store-error normalization
// ABOUTME: Holds no state between calls; one store mutation at most per execution
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Tool Executor
//!
//! Single entry point for executing a registered tool. Validation runs
//! against the tool's declared schema before anything touches the task
//! store; an invalid argument set becomes a failure outcome and the store
//! is never called. Success payloads are checked against the tool's
//! declared output schema on the way back out. An unregistered tool name
//! is an internal error — the registry is verified at startup, so reaching
//! this path means the model was shown a name the registry does not own.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::errors::{AppError, AppResult};

use super::context::ToolExecutionContext;
use super::registry::ToolRegistry;
use super::result::ToolOutcome;

/// Validates and executes tool invocations against the registry
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    /// Create a new executor over a verified registry
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Access the underlying registry
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a tool invocation.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the tool name is not registered
    /// (a policy leak, not a user error) or when the tool itself hits an
    /// internal defect. All domain failures come back as failure outcomes.
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        context: &ToolExecutionContext,
    ) -> AppResult<ToolOutcome> {
        let Some(tool) = self.registry.get(tool_name) else {
            warn!("Dispatch requested for unregistered tool '{tool_name}'");
            return Err(AppError::internal(format!(
                "tool '{tool_name}' is not registered"
            )));
        };

        let violations = tool.input_schema().validate(&args);
        if !violations.is_empty() {
            debug!(
                tool = tool_name,
                violations = violations.len(),
                "Rejecting tool call with invalid arguments"
            );
            return Ok(ToolOutcome::invalid_arguments(violations));
        }

        debug!(tool = tool_name, "Executing tool");
        let outcome = tool.execute(args, context).await?;

        // A success payload outside the declared output shape is a contract
        // violation inside this process, never something to show the user.
        if outcome.is_success() {
            let violations = tool.output_schema().validate(&outcome.payload);
            if !violations.is_empty() {
                error!(
                    tool = tool_name,
                    ?violations,
                    "Tool produced a payload outside its declared output schema"
                );
                return Err(AppError::internal(format!(
                    "tool '{tool_name}' violated its output contract"
                )));
            }
        }

        Ok(outcome)
    }
}
