// ABOUTME: Structured tool execution outcomes with typed failure kinds
// ABOUTME: Failure kinds drive both audit persistence and the user-facing wording
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Tool Outcomes
//!
//! Every tool execution produces a [`ToolOutcome`]: success with a
//! normalized payload, or a typed failure. Failures are data, not errors:
//! the orchestrator recovers them into clarification or apology turns, and
//! the audit trail records them verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tasks::TaskStoreError;

/// Whether a tool call succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// The tool performed its operation
    Success,
    /// The tool could not perform its operation
    Failure,
}

impl ToolStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Classification of a tool failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Arguments failed schema validation
    InvalidArguments,
    /// A task reference matched more than one task
    AmbiguousReference,
    /// The referenced task does not exist
    NotFound,
    /// The referenced task belongs to another user
    Forbidden,
    /// The task store failed transiently
    Unavailable,
}

impl FailureKind {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::AmbiguousReference => "ambiguous_reference",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Unavailable => "unavailable",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "invalid_arguments" => Some(Self::InvalidArguments),
            "ambiguous_reference" => Some(Self::AmbiguousReference),
            "not_found" => Some(Self::NotFound),
            "forbidden" => Some(Self::Forbidden),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

/// Result of executing one tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Success or failure
    pub status: ToolStatus,
    /// Failure classification, present only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Success payload, or failure detail (message, candidate list)
    pub payload: Value,
}

impl ToolOutcome {
    /// Create a successful outcome with a payload
    #[must_use]
    pub const fn ok(payload: Value) -> Self {
        Self {
            status: ToolStatus::Success,
            kind: None,
            payload,
        }
    }

    /// Create a failure outcome
    #[must_use]
    pub const fn failure(kind: FailureKind, payload: Value) -> Self {
        Self {
            status: ToolStatus::Failure,
            kind: Some(kind),
            payload,
        }
    }

    /// Validation failure with the list of violations attached
    #[must_use]
    pub fn invalid_arguments(violations: Vec<String>) -> Self {
        Self::failure(
            FailureKind::InvalidArguments,
            serde_json::json!({ "violations": violations }),
        )
    }

    /// Ambiguous reference failure with the candidate tasks attached
    #[must_use]
    pub fn ambiguous(reference: &str, candidates: Value) -> Self {
        Self::failure(
            FailureKind::AmbiguousReference,
            serde_json::json!({
                "reference": reference,
                "candidates": candidates,
            }),
        )
    }

    /// Whether this outcome is a success
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

impl From<TaskStoreError> for ToolOutcome {
    fn from(error: TaskStoreError) -> Self {
        match error {
            TaskStoreError::NotFound => Self::failure(
                FailureKind::NotFound,
                serde_json::json!({ "message": "no matching task exists" }),
            ),
            TaskStoreError::Validation(reason) => Self::failure(
                FailureKind::InvalidArguments,
                serde_json::json!({ "violations": [reason] }),
            ),
            TaskStoreError::Forbidden => Self::failure(
                FailureKind::Forbidden,
                serde_json::json!({ "message": "task belongs to another user" }),
            ),
            TaskStoreError::Unavailable(reason) => Self::failure(
                FailureKind::Unavailable,
                serde_json::json!({ "message": reason }),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let outcome = ToolOutcome::from(TaskStoreError::NotFound);
        assert_eq!(outcome.status, ToolStatus::Failure);
        assert_eq!(outcome.kind, Some(FailureKind::NotFound));

        let outcome = ToolOutcome::from(TaskStoreError::Validation("bad".into()));
        assert_eq!(outcome.kind, Some(FailureKind::InvalidArguments));

        let outcome = ToolOutcome::from(TaskStoreError::Unavailable("io".into()));
        assert_eq!(outcome.kind, Some(FailureKind::Unavailable));
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            FailureKind::InvalidArguments,
            FailureKind::AmbiguousReference,
            FailureKind::NotFound,
            FailureKind::Forbidden,
            FailureKind::Unavailable,
        ] {
            assert_eq!(FailureKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FailureKind::parse("nope"), None);
    }
}
