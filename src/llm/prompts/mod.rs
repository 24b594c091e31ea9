// ABOUTME: System policy prompt for the task assistant loaded at compile time
// ABOUTME: Encodes the tool-only and no-guessing rules handed to the model capability
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # System Prompts
//!
//! Prompts are loaded at compile time from markdown files for easy
//! maintenance. The policy text is advisory for the model; the binding
//! enforcement of tool-only execution and no-guessing lives in the
//! orchestrator.

/// Task assistant system policy prompt
pub const TASK_ASSISTANT_PROMPT: &str = include_str!("task_assistant.md");

/// Get the system policy prompt for the task assistant
#[must_use]
pub const fn get_task_assistant_prompt() -> &'static str {
    TASK_ASSISTANT_PROMPT
}
