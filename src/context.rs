// ABOUTME: Shared server resources assembled once at startup and cloned via Arc
// ABOUTME: Wires the registry, executor, orchestrator, and chat service together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Server Resources
//!
//! Dependency container built once in the binary and shared with every
//! request handler. Building it runs the registry verification, so a
//! misconfigured tool set fails the process before it binds a socket.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::llm::ModelProvider;
use crate::services::{AgentOrchestrator, ChatService, TurnGate};
use crate::tasks::TaskStore;
use crate::tools::{ToolExecutor, ToolRegistry};

/// Shared, immutable server state
pub struct ServerResources {
    /// Conversation database
    pub database: Database,
    /// Task store boundary
    pub task_store: Arc<dyn TaskStore>,
    /// Verified tool registry
    pub registry: Arc<ToolRegistry>,
    /// Model capability
    pub provider: Arc<dyn ModelProvider>,
    /// Chat façade handling user turns
    pub chat: ChatService,
    /// Server configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Assemble the resource graph.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the tool registry fails its
    /// mandatory-tool verification.
    pub fn new(
        database: Database,
        task_store: Arc<dyn TaskStore>,
        provider: Arc<dyn ModelProvider>,
        config: ServerConfig,
    ) -> AppResult<Self> {
        let registry = Arc::new(ToolRegistry::builtin()?);
        let executor = Arc::new(ToolExecutor::new(Arc::clone(&registry)));
        let orchestrator = Arc::new(AgentOrchestrator::new(
            executor,
            Arc::clone(&provider),
            config.orchestrator,
        ));
        let chat = ChatService::new(
            database.clone(),
            Arc::clone(&task_store),
            orchestrator,
            Arc::new(TurnGate::new()),
            config.orchestrator.history_window,
        );

        Ok(Self {
            database,
            task_store,
            registry,
            provider,
            chat,
            config,
        })
    }
}
