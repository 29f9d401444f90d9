// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Coral Server
//!
//! The `coral` binary hosts agent-graph sessions over HTTP.
//!
//! ## Commands
//!
//! - `coral serve` (default) - Run the server
//! - `coral config show|validate` - Inspect the application configuration
//!
//! Configuration discovery: `--config`, `CORAL_CONFIG_PATH`, `./coral.yaml`,
//! `./config/application.yaml`, then a built-in default.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use coral_server::commands::{self, ConfigCommand};
use coral_server::server::{self, ServeOptions};

/// Coral - coordination server for cooperating agents
#[derive(Parser)]
#[command(name = "coral")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CORAL_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, global = true, env = "CORAL_PORT", default_value = "5555")]
    port: u16,

    /// HTTP API host
    #[arg(long, global = true, env = "CORAL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Host advertised to agents in their connection URLs (default: --host)
    #[arg(long, global = true, env = "CORAL_EXTERNAL_HOST")]
    external_host: Option<String>,

    /// Skip credential checks and create sessions on demand
    #[arg(long, global = true, env = "CORAL_DEV_MODE")]
    dev: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CORAL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (default)
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Serve) | None => {
            let external_host = cli.external_host.unwrap_or_else(|| cli.host.clone());
            server::run(ServeOptions {
                config: cli.config,
                host: cli.host,
                port: cli.port,
                external_host,
                dev_mode: cli.dev,
            })
            .await
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
