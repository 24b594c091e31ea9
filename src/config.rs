// ABOUTME: Environment-driven server configuration for ports, storage, and model endpoint
// ABOUTME: Also carries the orchestrator limits that bound the tool-dispatch loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Server Configuration
//!
//! Configuration follows an environment-only approach: every knob is an
//! environment variable with a sensible default, read once at startup.

use serde::{Deserialize, Serialize};
use std::env;

use crate::errors::{AppError, AppResult};

/// Environment variable for the HTTP port
const HTTP_PORT_ENV: &str = "TASKPILOT_HTTP_PORT";

/// Environment variable for the database URL
const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable for the model endpoint base URL
const MODEL_BASE_URL_ENV: &str = "TASKPILOT_MODEL_BASE_URL";

/// Environment variable for the model name
const MODEL_NAME_ENV: &str = "TASKPILOT_MODEL";

/// Environment variable for the model API key (optional)
const MODEL_API_KEY_ENV: &str = "TASKPILOT_MODEL_API_KEY";

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8088;

/// Default database location
const DEFAULT_DATABASE_URL: &str = "sqlite:taskpilot.db";

/// Default model endpoint (Ollama-compatible)
const DEFAULT_MODEL_BASE_URL: &str = "http://localhost:11434/v1";

/// Default model for intent resolution
const DEFAULT_MODEL: &str = "qwen2.5:14b-instruct";

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Database URL (SQLite path)
    pub database_url: String,
    /// Model capability endpoint configuration
    pub model: ModelConfig,
    /// Orchestrator loop limits
    pub orchestrator: OrchestratorConfig,
}

/// Configuration for the external model capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Optional bearer token
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// Limits that bound a single orchestrated turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum tool-dispatch iterations before the turn is forced terminal
    pub max_tool_iterations: usize,
    /// Number of recent messages loaded as model context
    pub history_window: i64,
    /// Retries for a failed model call before giving up on the turn
    pub model_retries: u32,
    /// Base backoff between model retries, in milliseconds (doubles per attempt)
    pub model_retry_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 5,
            history_window: 20,
            model_retries: 2,
            model_retry_backoff_ms: 250,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a numeric variable cannot be parsed.
    pub fn from_env() -> AppResult<Self> {
        let http_port = parse_env(HTTP_PORT_ENV, DEFAULT_HTTP_PORT)?;
        let database_url =
            env::var(DATABASE_URL_ENV).unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());

        let model = ModelConfig {
            base_url: env::var(MODEL_BASE_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_MODEL_BASE_URL.to_owned()),
            model: env::var(MODEL_NAME_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_owned()),
            api_key: env::var(MODEL_API_KEY_ENV).ok().filter(|k| !k.is_empty()),
        };

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            max_tool_iterations: parse_env(
                "TASKPILOT_MAX_TOOL_ITERATIONS",
                defaults.max_tool_iterations,
            )?,
            history_window: parse_env("TASKPILOT_HISTORY_WINDOW", defaults.history_window)?,
            model_retries: parse_env("TASKPILOT_MODEL_RETRIES", defaults.model_retries)?,
            model_retry_backoff_ms: parse_env(
                "TASKPILOT_MODEL_RETRY_BACKOFF_MS",
                defaults.model_retry_backoff_ms,
            )?,
        };

        Ok(Self {
            http_port,
            database_url,
            model,
            orchestrator,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            model: ModelConfig {
                base_url: DEFAULT_MODEL_BASE_URL.to_owned(),
                model: DEFAULT_MODEL.to_owned(),
                api_key: None,
            },
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Parse an environment variable, falling back to the default when unset
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("Invalid value for {name}: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.orchestrator.max_tool_iterations, 5);
        assert_eq!(config.orchestrator.history_window, 20);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = ServerConfig::default();
        config.model.api_key = Some("secret".to_owned());
        let json = serde_json::to_string(&config).unwrap_or_default();
        assert!(!json.contains("secret"));
    }
}
