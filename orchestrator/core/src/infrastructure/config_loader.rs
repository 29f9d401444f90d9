// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application Config Loader
//!
//! Finds, parses and validates the YAML application config.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML → [`AppConfig`]
//!
//! # Discovery
//!
//! 1. An explicit path (the CLI's `--config` / `CORAL_CONFIG_PATH`).
//! 2. `coral.yaml` in the working directory.
//! 3. `config/application.yaml` in the working directory.
//!
//! With nothing found the built-in fallback config is used. A file that is
//! found but fails to parse or validate is always an error.

use crate::domain::app_config::{AppConfig, ConfigError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_CANDIDATES: [&str; 2] = ["coral.yaml", "config/application.yaml"];

/// A loaded config and the file it came from (`None` for the fallback).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

pub struct AppConfigLoader;

impl AppConfigLoader {
    /// Parse and validate config YAML
    pub fn parse_yaml(yaml: &str, origin: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_yaml(&yaml, &path.display().to_string())
    }

    pub fn to_yaml(config: &AppConfig) -> Result<String, ConfigError> {
        serde_yaml::to_string(config).map_err(|source| ConfigError::Parse {
            path: "<memory>".to_string(),
            source,
        })
    }

    /// Discover relative to the current working directory.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        Self::load_from(explicit, Path::new("."))
    }

    pub fn load_from(explicit: Option<&Path>, base_dir: &Path) -> Result<LoadedConfig, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => DEFAULT_CONFIG_CANDIDATES
                .iter()
                .map(|candidate| base_dir.join(candidate))
                .find(|candidate| candidate.is_file()),
        };

        let Some(path) = path else {
            warn!("No configuration file found, using default application config");
            return Ok(LoadedConfig {
                config: AppConfig::fallback(),
                source: None,
            });
        };

        let config = Self::parse_file(&path)?;
        info!(
            path = %path.display(),
            applications = config.applications.len(),
            registry_agents = config.registry.len(),
            "Loaded configuration"
        );
        Ok(LoadedConfig {
            config,
            source: Some(path),
        })
    }
}
