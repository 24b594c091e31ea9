// ABOUTME: Shared test fixtures: a scripted model provider and temp-file databases
// ABOUTME: Lets orchestrator and chat tests run without a live model endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use taskpilot::database::Database;
use taskpilot::errors::{AppError, AppResult};
use taskpilot::llm::{ModelProvider, ModelRequest, ModelResponse, RawToolCall, ToolDeclaration};

/// One step in a scripted model conversation
pub enum ScriptedStep {
    /// Return this response
    Respond(ModelResponse),
    /// Fail with a transient external error
    Fail,
}

/// A model provider that replays a fixed script of responses.
///
/// Steps are consumed in order; once the script is exhausted every call
/// fails, so a test that over-consumes the script fails loudly.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<ScriptedStep>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
        }
    }

    /// Remaining unconsumed steps
    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(
        &self,
        _request: &ModelRequest,
        _tools: &[ToolDeclaration],
    ) -> AppResult<ModelResponse> {
        let step = self
            .steps
            .lock()
            .map_err(|_| AppError::internal("script lock poisoned"))?
            .pop_front();

        match step {
            Some(ScriptedStep::Respond(response)) => Ok(response),
            Some(ScriptedStep::Fail) => Err(AppError::external_unavailable(
                "ScriptedModel",
                "scripted failure",
            )),
            None => Err(AppError::internal("scripted provider exhausted")),
        }
    }
}

/// A plain text reply step
pub fn text(content: &str) -> ScriptedStep {
    ScriptedStep::Respond(ModelResponse {
        content: Some(content.to_owned()),
        tool_calls: vec![],
        model: "scripted-model".to_owned(),
        finish_reason: Some("stop".to_owned()),
    })
}

/// A tool invocation step
pub fn tool_call(name: &str, arguments: Value) -> ScriptedStep {
    ScriptedStep::Respond(ModelResponse {
        content: None,
        tool_calls: vec![RawToolCall {
            name: name.to_owned(),
            arguments,
        }],
        model: "scripted-model".to_owned(),
        finish_reason: Some("tool_calls".to_owned()),
    })
}

/// A clarification step riding on the ask_user pseudo-tool
pub fn clarification(question: &str) -> ScriptedStep {
    tool_call(
        taskpilot::services::ASK_USER_TOOL,
        serde_json::json!({ "question": question }),
    )
}

/// A malformed step: neither text nor tool call
pub fn malformed() -> ScriptedStep {
    ScriptedStep::Respond(ModelResponse {
        content: None,
        tool_calls: vec![],
        model: "scripted-model".to_owned(),
        finish_reason: None,
    })
}

/// A database backed by a temp file, valid for the lifetime of the guard
pub struct TestDatabase {
    pub database: Database,
    _dir: tempfile::TempDir,
}

/// Create a migrated database on a temp file
pub async fn test_database() -> TestDatabase {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite:{}/test.db", dir.path().display());
    let database = Database::new(&url).await.expect("open test database");
    TestDatabase {
        database,
        _dir: dir,
    }
}
