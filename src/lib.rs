// ABOUTME: Main library entry point for the Taskpilot conversational task manager
// ABOUTME: Wires the agent orchestration core, tool layer, and persistence boundaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

#![deny(unsafe_code)]

//! # Taskpilot
//!
//! A task manager driven by natural-language conversation. The hard part
//! is not the task CRUD — it is the agent core: translating free-form
//! utterances into a fixed set of auditable operations, executing them
//! only through a constrained tool interface, persisting every turn so a
//! stateless process can resume any conversation, and asking instead of
//! guessing when a request is ambiguous.
//!
//! ## Architecture
//!
//! - **Tools**: the fixed, schema-validated operation set, the only
//!   sanctioned path to mutate tasks
//! - **Database**: append-only conversation, message, and tool-call audit
//!   trail over SQLite
//! - **Services**: the bounded orchestrator loop and the chat façade
//! - **LLM**: the opaque model capability boundary with an
//!   `OpenAI`-compatible reference provider
//! - **Tasks**: the task store boundary with a SQLite reference
//!   implementation
//!
//! ## Example
//!
//! ```rust,no_run
//! use taskpilot::config::ServerConfig;
//! use taskpilot::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Taskpilot configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Environment-driven server configuration
pub mod config;

/// Shared resource container assembled at startup
pub mod context;

/// Conversation, message, and tool-call persistence
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// Model capability abstraction and the OpenAI-compatible provider
pub mod llm;

/// Structured logging setup
pub mod logging;

/// HTTP routes for the chat API
pub mod routes;

/// Agent orchestrator and chat service
pub mod services;

/// Task domain model and store boundary
pub mod tasks;

/// Tool registry, executor, and the builtin task tools
pub mod tools;
