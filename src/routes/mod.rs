// ABOUTME: HTTP route assembly for the chat API surface
// ABOUTME: Adds the tracing layer and merges route groups into one router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # HTTP Routes

pub mod chat;

pub use chat::ChatRoutes;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::context::ServerResources;

/// Build the full application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    ChatRoutes::routes(resources).layer(TraceLayer::new_for_http())
}
