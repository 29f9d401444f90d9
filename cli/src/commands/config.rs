// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use coral_core::domain::app_config::AppConfig;
use coral_core::infrastructure::config_loader::{AppConfigLoader, DEFAULT_CONFIG_CANDIDATES};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the resolved configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml),
        ConfigCommand::Validate { file } => validate(file.or(config_override)).map(|_| ()),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let loaded = AppConfigLoader::load(config_override.as_deref()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config / CORAL_CONFIG_PATH: {}", path.display()),
            None => println!("  1. --config / CORAL_CONFIG_PATH: {}", "(not set)".dimmed()),
        }
        for (i, candidate) in DEFAULT_CONFIG_CANDIDATES.iter().enumerate() {
            println!("  {}. ./{}", i + 2, candidate);
        }
        println!();
    }

    if as_yaml {
        print!("{}", AppConfigLoader::to_yaml(&loaded.config)?);
        return Ok(());
    }

    match &loaded.source {
        Some(path) => println!("{} {}", "Source:".bold(), path.display()),
        None => println!("{} {}", "Source:".bold(), "built-in default".dimmed()),
    }
    println!();
    print_summary(&loaded.config);
    Ok(())
}

fn print_summary(config: &AppConfig) {
    println!("{}", "Applications:".bold());
    for application in &config.applications {
        println!("  {} ({})", application.id.bold(), application.name);
        if let Some(description) = &application.description {
            println!("    {}", description);
        }
        println!("    Privacy keys: {}", application.privacy_keys.len());
    }
    println!();

    println!("{}", "Agent registry:".bold());
    if config.registry.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    let mut agent_types: Vec<_> = config.registry.agent_types().collect();
    agent_types.sort();
    for agent_type in agent_types {
        let Some(agent) = config.registry.get(agent_type) else {
            continue;
        };
        println!("  {} [{}]", agent_type.as_str().bold(), agent.runtime.kind());
        for option in &agent.options {
            println!("    - {}", option.name());
        }
    }
}

/// Load and validate a config file. Returns the validated config.
pub fn validate(config_path: Option<PathBuf>) -> Result<AppConfig> {
    println!("Validating configuration...");

    let loaded = AppConfigLoader::load(config_path.as_deref()).context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(loaded.config)
}
