// ABOUTME: Tool subsystem: registry, executor, schemas, and the builtin task tools
// ABOUTME: The only sanctioned path between the model capability and task storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Tool Subsystem
//!
//! Fixed, schema-validated operations the model may invoke. See
//! [`registry::ToolRegistry`] for the tool set and
//! [`executor::ToolExecutor`] for the validation and dispatch contract.

pub mod context;
pub mod executor;
pub mod implementations;
pub mod registry;
pub mod result;
pub mod schema;
pub mod traits;

pub use context::ToolExecutionContext;
pub use executor::ToolExecutor;
pub use registry::{ToolRegistry, REQUIRED_TOOLS, TOOL_REGISTRY_VERSION};
pub use result::{FailureKind, ToolOutcome, ToolStatus};
pub use schema::{JsonSchema, PropertySchema, ToolSchema};
pub use traits::{TaskTool, ToolCapabilities};
