// ABOUTME: The agent orchestrator: bounded resolve/dispatch loop over the model capability
// ABOUTME: Enforces tool-only execution, the no-guessing policy, and strict output parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Agent Orchestrator
//!
//! One call to [`AgentOrchestrator::run_turn`] resolves one user turn:
//!
//! ```text
//! RESOLVING -> { TOOL_DISPATCH -> RESOLVING }* -> TERMINAL_REPLY
//! ```
//!
//! The model's output is untrusted input. It is parsed into the tagged
//! [`ModelAction`] variant (tool invocation, clarification, plain reply,
//! or rejected), and only a well-formed tool invocation ever reaches the
//! executor. Clarifications ride on the reserved `ask_user` pseudo-tool,
//! which is intercepted here and never dispatched or recorded as a tool
//! call. The loop is bounded by configuration; exhaustion, model failure,
//! and policy leaks all land on explicit terminal replies rather than
//! errors the caller has to interpret.
//!
//! The orchestrator holds no per-conversation state: everything it needs
//! is passed in, reconstructed from the store by the chat service.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::database::MessageRecord;
use crate::errors::{AppError, AppResult};
use crate::llm::{
    prompts::get_task_assistant_prompt, ChatMessage, MessageRole, ModelProvider, ModelRequest,
    ModelResponse, ToolDeclaration,
};
use crate::tools::{ToolExecutionContext, ToolExecutor, ToolOutcome};

/// Reserved pseudo-tool the model invokes to ask the user a question.
///
/// Declared to the model alongside the real tools but intercepted before
/// dispatch: it produces a clarification turn, not a tool call record.
pub const ASK_USER_TOOL: &str = "ask_user";

/// Reply sent when the model endpoint stays unreachable after retries
const MODEL_UNAVAILABLE_REPLY: &str =
    "I'm having trouble reaching my language model right now. Please try again in a moment.";

/// Reply sent when the dispatch loop hits its iteration bound
const LOOP_LIMIT_REPLY: &str =
    "I wasn't able to complete that request; it needed more steps than I'm allowed to take. \
     Could you try breaking it into smaller requests?";

/// Reply sent when an internal defect aborts the turn
const INTERNAL_ERROR_REPLY: &str =
    "Something went wrong on my side while handling that. Please try again.";

// ============================================================================
// Model Output Interpretation
// ============================================================================

/// Tagged interpretation of one model response.
///
/// The parse is strict: anything that does not match a variant exactly
/// is `Rejected` and handled by the loop's correction path.
#[derive(Debug, Clone)]
pub enum ModelAction {
    /// The model requests a registered tool invocation
    ToolInvocation {
        /// Requested tool name
        name: String,
        /// Arguments (object-shaped, but otherwise unvalidated)
        arguments: Value,
    },
    /// The model asks the user for missing or disambiguating information
    Clarification {
        /// The question to put to the user
        question: String,
    },
    /// The model answers directly with no tool need
    Reply {
        /// Final reply text
        content: String,
    },
    /// The output matched no variant and must not be acted on
    Rejected {
        /// Why the output was rejected
        reason: String,
    },
}

impl ModelAction {
    /// Interpret a raw model response.
    ///
    /// Rules, in order:
    /// - a tool call to `ask_user` with a non-empty string `question`
    ///   argument is a clarification; a malformed one is rejected;
    /// - any other tool call must carry object-shaped arguments;
    /// - otherwise non-empty text content is a reply;
    /// - everything else is rejected.
    #[must_use]
    pub fn interpret(response: &ModelResponse) -> Self {
        if let Some(call) = response.tool_calls.first() {
            if call.name == ASK_USER_TOOL {
                let question = call
                    .arguments
                    .get("question")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .unwrap_or_default();
                if question.is_empty() {
                    return Self::Rejected {
                        reason: "ask_user call without a question".to_owned(),
                    };
                }
                return Self::Clarification {
                    question: question.to_owned(),
                };
            }

            if !call.arguments.is_object() {
                return Self::Rejected {
                    reason: format!("tool call '{}' with non-object arguments", call.name),
                };
            }
            return Self::ToolInvocation {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            };
        }

        match response.content.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() => Self::Reply {
                content: content.to_owned(),
            },
            _ => Self::Rejected {
                reason: "response carried neither a tool call nor text".to_owned(),
            },
        }
    }
}

// ============================================================================
// Turn Outcome
// ============================================================================

/// Why a turn reached its terminal reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model produced a final answer
    Stop,
    /// The turn ended with a question back to the user
    Clarification,
    /// The dispatch loop hit its iteration bound
    LoopLimit,
    /// The model endpoint stayed unavailable through all retries
    ModelUnavailable,
    /// An internal defect aborted the turn
    InternalError,
}

impl FinishReason {
    /// Storage/wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Clarification => "clarification",
            Self::LoopLimit => "loop_limit",
            Self::ModelUnavailable => "model_unavailable",
            Self::InternalError => "internal_error",
        }
    }
}

/// One executed tool call, ready for audit persistence
#[derive(Debug, Clone)]
pub struct CompletedToolCall {
    /// Tool that ran
    pub tool_name: String,
    /// Arguments it ran with
    pub arguments: Value,
    /// What happened
    pub outcome: ToolOutcome,
}

/// Result of resolving one user turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Terminal assistant reply
    pub reply: String,
    /// Why the turn ended
    pub finish_reason: FinishReason,
    /// Tool calls executed during the turn, in order
    pub tool_calls: Vec<CompletedToolCall>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// The core state machine resolving user turns against the model capability
pub struct AgentOrchestrator {
    executor: Arc<ToolExecutor>,
    provider: Arc<dyn ModelProvider>,
    limits: OrchestratorConfig,
}

impl AgentOrchestrator {
    /// Create a new orchestrator
    #[must_use]
    pub fn new(
        executor: Arc<ToolExecutor>,
        provider: Arc<dyn ModelProvider>,
        limits: OrchestratorConfig,
    ) -> Self {
        Self {
            executor,
            provider,
            limits,
        }
    }

    /// Declaration for the reserved clarification pseudo-tool
    #[must_use]
    pub fn ask_user_declaration() -> ToolDeclaration {
        ToolDeclaration {
            name: ASK_USER_TOOL.to_owned(),
            description: "Ask the user one short question when required information is missing \
                          or a task reference is ambiguous. Ends the turn."
                .to_owned(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to ask the user"
                    }
                },
                "required": ["question"]
            }),
        }
    }

    /// Resolve one user turn to a terminal reply.
    ///
    /// `history` is the bounded, ordered context window ending with the
    /// user's new message (already persisted by the caller).
    ///
    /// # Errors
    ///
    /// Reserved for defects below the policy layer. Model unavailability,
    /// loop exhaustion, tool defects, and policy leaks all resolve to
    /// terminal replies rather than errors the caller must interpret.
    pub async fn run_turn(
        &self,
        context: &ToolExecutionContext,
        history: &[MessageRecord],
    ) -> AppResult<TurnOutcome> {
        let mut messages = Self::build_context(history);
        let declarations = self.build_declarations();
        let mut tool_calls: Vec<CompletedToolCall> = Vec::new();

        for iteration in 0..self.limits.max_tool_iterations {
            let request = ModelRequest::new(messages.clone());
            let response = match self.complete_with_retry(&request, &declarations).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Model capability failed after retries: {e}");
                    return Ok(TurnOutcome {
                        reply: MODEL_UNAVAILABLE_REPLY.to_owned(),
                        finish_reason: FinishReason::ModelUnavailable,
                        tool_calls,
                    });
                }
            };

            match ModelAction::interpret(&response) {
                ModelAction::Clarification { question } => {
                    debug!(iteration, "Turn ends with clarification");
                    return Ok(TurnOutcome {
                        reply: question,
                        finish_reason: FinishReason::Clarification,
                        tool_calls,
                    });
                }
                ModelAction::Reply { content } => {
                    debug!(iteration, "Turn ends with direct reply");
                    return Ok(TurnOutcome {
                        reply: content,
                        finish_reason: FinishReason::Stop,
                        tool_calls,
                    });
                }
                ModelAction::Rejected { reason } => {
                    warn!(iteration, "Rejected malformed model output: {reason}");
                    messages.push(ChatMessage::user(format!(
                        "[Invalid response: {reason}. Reply with plain text, or call exactly \
                         one tool with valid JSON arguments.]"
                    )));
                }
                ModelAction::ToolInvocation { name, arguments } => {
                    if !self.executor.registry().contains(&name) {
                        // The model was only ever shown registered names,
                        // so this is a policy leak, not a user error.
                        error!("Model requested unregistered tool '{name}'");
                        return Ok(TurnOutcome {
                            reply: INTERNAL_ERROR_REPLY.to_owned(),
                            finish_reason: FinishReason::InternalError,
                            tool_calls,
                        });
                    }

                    info!(iteration, tool = %name, "Dispatching tool call");
                    let outcome =
                        match self.executor.execute(&name, arguments.clone(), context).await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                // Internal defects (output-contract violations
                                // and the like) end the turn with a generic
                                // apology; the detail stays in the logs.
                                error!(tool = %name, "Tool execution hit an internal defect: {e}");
                                return Ok(TurnOutcome {
                                    reply: INTERNAL_ERROR_REPLY.to_owned(),
                                    finish_reason: FinishReason::InternalError,
                                    tool_calls,
                                });
                            }
                        };

                    if let Some(content) = response.content.as_deref() {
                        if !content.trim().is_empty() {
                            messages.push(ChatMessage::assistant(content));
                        }
                    }
                    messages.push(Self::tool_result_message(&name, &outcome));

                    tool_calls.push(CompletedToolCall {
                        tool_name: name,
                        arguments,
                        outcome,
                    });
                }
            }
        }

        info!(
            limit = self.limits.max_tool_iterations,
            "Tool-dispatch loop exhausted; forcing terminal reply"
        );
        Ok(TurnOutcome {
            reply: LOOP_LIMIT_REPLY.to_owned(),
            finish_reason: FinishReason::LoopLimit,
            tool_calls,
        })
    }

    /// Build the model context: system policy plus the history window
    fn build_context(history: &[MessageRecord]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(get_task_assistant_prompt()));

        for record in history {
            let Some(role) = MessageRole::parse(&record.role) else {
                continue;
            };
            messages.push(ChatMessage::new(role, &record.content));
        }

        messages
    }

    /// Registered tool declarations plus the clarification pseudo-tool
    fn build_declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations = self.executor.registry().declarations();
        declarations.push(Self::ask_user_declaration());
        declarations
    }

    /// Feed a tool outcome back into the context for the next iteration
    fn tool_result_message(tool_name: &str, outcome: &ToolOutcome) -> ChatMessage {
        let body = serde_json::to_string(outcome).unwrap_or_else(|_| "{}".to_owned());
        ChatMessage::user(format!("[Tool result for {tool_name}]: {body}"))
    }

    /// Call the model capability, retrying transient failures with backoff
    async fn complete_with_retry(
        &self,
        request: &ModelRequest,
        declarations: &[ToolDeclaration],
    ) -> AppResult<ModelResponse> {
        let mut last_error: Option<AppError> = None;

        for attempt in 0..=self.limits.model_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(
                    self.limits.model_retry_backoff_ms << (attempt - 1),
                );
                debug!(attempt, ?backoff, "Retrying model call");
                sleep(backoff).await;
            }

            match self.provider.complete(request, declarations).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(attempt, "Model call failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::internal("model retry loop without attempts")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RawToolCall;

    fn response(content: Option<&str>, tool_calls: Vec<RawToolCall>) -> ModelResponse {
        ModelResponse {
            content: content.map(ToOwned::to_owned),
            tool_calls,
            model: "test".to_owned(),
            finish_reason: None,
        }
    }

    #[test]
    fn test_interpret_reply() {
        let action = ModelAction::interpret(&response(Some("done!"), vec![]));
        assert!(matches!(action, ModelAction::Reply { content } if content == "done!"));
    }

    #[test]
    fn test_interpret_tool_invocation() {
        let call = RawToolCall {
            name: "add_task".to_owned(),
            arguments: serde_json::json!({"title": "buy milk"}),
        };
        let action = ModelAction::interpret(&response(None, vec![call]));
        assert!(matches!(action, ModelAction::ToolInvocation { name, .. } if name == "add_task"));
    }

    #[test]
    fn test_interpret_clarification() {
        let call = RawToolCall {
            name: ASK_USER_TOOL.to_owned(),
            arguments: serde_json::json!({"question": "Which task did you mean?"}),
        };
        let action = ModelAction::interpret(&response(None, vec![call]));
        assert!(
            matches!(action, ModelAction::Clarification { question } if question.contains("Which"))
        );
    }

    #[test]
    fn test_interpret_rejects_empty_output() {
        let action = ModelAction::interpret(&response(Some("   "), vec![]));
        assert!(matches!(action, ModelAction::Rejected { .. }));
    }

    #[test]
    fn test_interpret_rejects_non_object_arguments() {
        let call = RawToolCall {
            name: "delete_task".to_owned(),
            arguments: serde_json::json!("not an object"),
        };
        let action = ModelAction::interpret(&response(None, vec![call]));
        assert!(matches!(action, ModelAction::Rejected { .. }));
    }

    #[test]
    fn test_interpret_rejects_questionless_ask_user() {
        let call = RawToolCall {
            name: ASK_USER_TOOL.to_owned(),
            arguments: serde_json::json!({}),
        };
        let action = ModelAction::interpret(&response(None, vec![call]));
        assert!(matches!(action, ModelAction::Rejected { .. }));
    }

    #[test]
    fn test_tool_call_takes_precedence_over_text() {
        let call = RawToolCall {
            name: "list_tasks".to_owned(),
            arguments: serde_json::json!({}),
        };
        let action = ModelAction::interpret(&response(Some("Let me check."), vec![call]));
        assert!(matches!(action, ModelAction::ToolInvocation { .. }));
    }
}
