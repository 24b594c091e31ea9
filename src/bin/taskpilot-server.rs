// ABOUTME: Server binary: config load, logging init, database setup, and axum serve
// ABOUTME: Fails fast on registry verification before binding the listen socket
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Taskpilot Server Binary
//!
//! Starts the chat API over the SQLite-backed conversation store and the
//! configured model endpoint.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use taskpilot::{
    config::ServerConfig,
    context::ServerResources,
    database::Database,
    llm::OpenAiCompatibleProvider,
    logging::LoggingConfig,
    routes,
    tasks::SqliteTaskStore,
};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "taskpilot-server")]
#[command(about = "Taskpilot - conversational task management over a tool-only agent core")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    LoggingConfig::from_env().init()?;

    info!("Starting Taskpilot server");
    info!("Database URL: {}", config.database_url);
    info!(
        "Model endpoint: {} ({})",
        config.model.base_url, config.model.model
    );

    let database = Database::new(&config.database_url).await?;
    info!("Conversation database ready");

    let task_store = SqliteTaskStore::new(database.pool().clone());
    task_store.migrate().await?;
    info!("Task store ready");

    let provider = OpenAiCompatibleProvider::new(config.model.clone())?;

    let resources = Arc::new(ServerResources::new(
        database,
        Arc::new(task_store),
        Arc::new(provider),
        config.clone(),
    )?);
    info!(
        "Tool registry verified with {} tools",
        resources.registry.len()
    );

    let router = routes::router(resources);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
