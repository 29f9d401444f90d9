// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP server bootstrap: config loading, session manager wiring and the
//! serve loop with graceful shutdown.

use anyhow::{Context, Result};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use coral_core::application::SessionManager;
use coral_core::domain::app_config::AppConfig;
use coral_core::domain::connection::ConnectionSettings;
use coral_core::infrastructure::AppConfigLoader;
use coral_core::presentation::api::{app, AppState};

pub struct ServeOptions {
    pub config: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub external_host: String,
    pub dev_mode: bool,
}

/// Wire a session manager and router for `config`.
pub fn build_app(config: AppConfig, connection: ConnectionSettings, dev_mode: bool) -> (Router, Arc<SessionManager>) {
    let config = Arc::new(config);
    let session_manager = Arc::new(SessionManager::new(
        Arc::new(config.registry.clone()),
        connection,
        dev_mode,
    ));
    let router = app(AppState::new(session_manager.clone(), config));
    (router, session_manager)
}

pub async fn run(options: ServeOptions) -> Result<()> {
    let loaded = AppConfigLoader::load(options.config.as_deref()).context("Failed to load configuration")?;
    if options.dev_mode {
        warn!("Dev mode enabled: credentials are not checked and sessions are created on demand");
    }

    let connection = ConnectionSettings::new(options.external_host.clone(), options.port);
    let (router, session_manager) = build_app(loaded.config, connection, options.dev_mode);

    let addr = format!("{}:{}", options.host, options.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(
        address = %addr,
        dev_mode = options.dev_mode,
        config = ?loaded.source,
        "Coral server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutting down");
    session_manager.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
