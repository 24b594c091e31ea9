// ABOUTME: Central registry for the fixed task-tool set with startup verification
// ABOUTME: Produces the schemas and model declarations; immutable once the server is up
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Tool Registry
//!
//! The registry maps tool names to implementations. It is built once at
//! startup, verified against the mandatory tool set, and then used
//! immutably; there is no dynamic registration path. A mandatory tool
//! missing at verification time is a fatal configuration error, caught
//! before any request is served.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::llm::ToolDeclaration;

use super::implementations::{
    AddTaskTool, CompleteTaskTool, DeleteTaskTool, ListTasksTool, UpdateTaskTool,
};
use super::schema::ToolSchema;
use super::traits::TaskTool;

/// The five tools every deployment must expose
pub const REQUIRED_TOOLS: [&str; 5] = [
    "add_task",
    "list_tasks",
    "complete_task",
    "delete_task",
    "update_task",
];

/// Version of the tool contract advertised with the schemas.
///
/// Bumped whenever a tool's input or output shape changes, so clients can
/// detect a contract they were not written against.
pub const TOOL_REGISTRY_VERSION: u32 = 1;

/// Central registry for task tools
pub struct ToolRegistry {
    /// Registered tools by name
    tools: HashMap<String, Arc<dyn TaskTool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry populated and verified with the builtin tool set
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a mandatory tool is missing.
    pub fn builtin() -> AppResult<Self> {
        let mut registry = Self::new();
        registry.register_builtin_tools();
        registry.verify_required_tools()?;
        Ok(registry)
    }

    /// Register a tool in the registry
    ///
    /// Returns `true` if the tool was registered, `false` if a tool with
    /// the same name already exists.
    pub fn register(&mut self, tool: Arc<dyn TaskTool>) -> bool {
        let name = tool.name().to_owned();

        if self.tools.contains_key(&name) {
            warn!("Tool '{}' is already registered, skipping", name);
            return false;
        }

        debug!(
            "Registering tool '{}' with capabilities: {}",
            name,
            tool.capabilities().describe()
        );
        self.tools.insert(name, tool);
        true
    }

    /// Register the builtin task tools
    pub fn register_builtin_tools(&mut self) {
        self.register(Arc::new(AddTaskTool));
        self.register(Arc::new(ListTasksTool));
        self.register(Arc::new(CompleteTaskTool));
        self.register(Arc::new(DeleteTaskTool));
        self.register(Arc::new(UpdateTaskTool));
    }

    /// Verify every mandatory tool is present.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing tools. This runs
    /// at startup so a misconfigured registry never serves requests.
    pub fn verify_required_tools(&self) -> AppResult<()> {
        let missing: Vec<&str> = REQUIRED_TOOLS
            .iter()
            .filter(|name| !self.tools.contains_key(**name))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::config(format!(
                "Tool registry is missing mandatory tools: {}",
                missing.join(", ")
            )))
        }
    }

    /// Get a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TaskTool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all tool names
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// List the schemas of all registered tools
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                input_schema: tool.input_schema(),
                output_schema: tool.output_schema(),
            })
            .collect()
    }

    /// Build the tool declarations handed to the model capability
    #[must_use]
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .values()
            .map(|tool| ToolDeclaration {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.input_schema().to_value(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
