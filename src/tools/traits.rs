// ABOUTME: Defines the TaskTool trait and ToolCapabilities for the fixed tool set
// ABOUTME: Tools implement this trait to be registered and executed via the ToolRegistry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Tool Trait and Capabilities
//!
//! All registered tools implement [`TaskTool`]: metadata (name,
//! description, input schema), capability flags, and async execution
//! against a [`ToolExecutionContext`]. Tools return [`ToolOutcome`]s for
//! domain failures; an `Err` from `execute` signals an internal defect,
//! never a user-recoverable condition.

use async_trait::async_trait;
use bitflags::bitflags;
use serde_json::Value;

use crate::errors::AppResult;

use super::context::ToolExecutionContext;
use super::result::ToolOutcome;
use super::schema::JsonSchema;

bitflags! {
    /// Capabilities that tools declare for filtering and audit decisions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ToolCapabilities: u8 {
        /// Tool reads task data
        const READS_TASKS = 0b0000_0001;
        /// Tool creates, mutates, or removes tasks
        const WRITES_TASKS = 0b0000_0010;
        /// Tool takes a task reference that may need disambiguation
        const TAKES_REFERENCE = 0b0000_0100;
    }
}

impl ToolCapabilities {
    /// Check if the tool mutates task data
    #[must_use]
    pub const fn writes_tasks(self) -> bool {
        self.contains(Self::WRITES_TASKS)
    }

    /// Check if the tool resolves a task reference
    #[must_use]
    pub const fn takes_reference(self) -> bool {
        self.contains(Self::TAKES_REFERENCE)
    }

    /// Get a description of enabled capabilities for logging
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.contains(Self::READS_TASKS) {
            parts.push("reads_tasks");
        }
        if self.contains(Self::WRITES_TASKS) {
            parts.push("writes_tasks");
        }
        if self.contains(Self::TAKES_REFERENCE) {
            parts.push("takes_reference");
        }
        if parts.is_empty() {
            "none".to_owned()
        } else {
            parts.join(", ")
        }
    }
}

/// The trait every registered tool implements.
///
/// Tools are `Send + Sync` for sharing across async tasks; `name()`
/// returns `&'static str` because the tool set is fixed at compile time.
#[async_trait]
pub trait TaskTool: Send + Sync {
    /// Unique identifier used for registry lookup and model declarations
    fn name(&self) -> &'static str;

    /// Human-readable description for model consumption
    fn description(&self) -> &'static str;

    /// JSON Schema for input arguments
    fn input_schema(&self) -> JsonSchema;

    /// JSON Schema for the payload of a successful call.
    ///
    /// The executor checks success payloads against this shape; a payload
    /// outside it is an internal defect, not a recoverable failure.
    fn output_schema(&self) -> JsonSchema;

    /// Capability flags
    fn capabilities(&self) -> ToolCapabilities;

    /// Execute the tool with validated arguments.
    ///
    /// `args` have already passed schema validation when called through
    /// the executor. Domain failures (not found, ambiguous reference,
    /// store unavailable) are returned as failure outcomes.
    ///
    /// # Errors
    ///
    /// Returns an error only for internal defects such as payload
    /// serialization failures.
    async fn execute(&self, args: Value, context: &ToolExecutionContext)
        -> AppResult<ToolOutcome>;
}
