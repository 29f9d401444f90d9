// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Application Configuration
//!
//! Applications that may open sessions (each with its accepted privacy keys)
//! and the agent registry. Loaded once at startup by
//! [`crate::infrastructure::config_loader`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::registry::AgentRegistry;
use crate::domain::runtime::RuntimeError;

pub const DEFAULT_APPLICATION_ID: &str = "default-app";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfig {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
    #[serde(default)]
    pub registry: AgentRegistry,
}

impl AppConfig {
    /// Used when no config file can be found.
    pub fn fallback() -> Self {
        Self {
            applications: vec![ApplicationConfig {
                id: DEFAULT_APPLICATION_ID.to_string(),
                name: "Default Application".to_string(),
                description: Some("Default application (fallback)".to_string()),
                privacy_keys: vec!["default-key".to_string(), "public".to_string()],
            }],
            registry: AgentRegistry::default(),
        }
    }

    pub fn application(&self, application_id: &str) -> Option<&ApplicationConfig> {
        self.applications.iter().find(|a| a.id == application_id)
    }

    pub fn is_valid_application(&self, application_id: &str, privacy_key: &str) -> bool {
        self.application(application_id)
            .map(|a| a.privacy_keys.iter().any(|k| k == privacy_key))
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = std::collections::HashSet::new();
        for application in &self.applications {
            if application.id.is_empty() {
                return Err(ConfigError::Invalid("application id must not be empty".to_string()));
            }
            if !ids.insert(application.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "application '{}' is declared more than once",
                    application.id
                )));
            }
        }
        self.registry.validate()?;
        Ok(())
    }
}
