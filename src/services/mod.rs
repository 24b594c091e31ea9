// ABOUTME: Domain service layer: the agent orchestrator and the chat façade
// ABOUTME: Protocol-agnostic logic sitting between the HTTP routes and the stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Services
//!
//! [`orchestrator`] owns the bounded resolve/dispatch state machine;
//! [`chat`] wraps it in conversation resolution, turn serialization, and
//! audit persistence.

pub mod chat;
pub mod orchestrator;

pub use chat::{ChatService, TurnDelta, TurnGate};
pub use orchestrator::{
    AgentOrchestrator, CompletedToolCall, FinishReason, ModelAction, TurnOutcome, ASK_USER_TOOL,
};
