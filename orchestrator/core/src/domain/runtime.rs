// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agent::AgentName;
use crate::domain::options::OptionValues;

/// Environment variable through which a spawned agent learns where to connect.
pub const CONNECTION_URL_ENV: &str = "CORAL_CONNECTION_URL";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to spawn agent: {0}")]
    SpawnFailed(String),
    #[error("Unsupported runtime: {0}")]
    Unsupported(String),
    #[error("Failed to terminate agent: {0}")]
    TerminationFailed(String),
}

/// Spawn strategy for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentRuntime {
    /// Local OS process.
    Executable {
        command: Vec<String>,
        #[serde(default)]
        environment: Vec<EnvVar>,
    },
    /// Container runtime. Not implemented yet.
    Docker { container: String },
    /// Agent hosted by another Coral server. Not implemented yet.
    Remote(RemoteRuntime),
}

impl AgentRuntime {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentRuntime::Executable { .. } => "executable",
            AgentRuntime::Docker { .. } => "docker",
            AgentRuntime::Remote(_) => "remote",
        }
    }

    /// Structural checks that do not need the option schema.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if let AgentRuntime::Executable { command, environment } = self {
            if command.is_empty() {
                return Err(RuntimeError::InvalidConfig(
                    "executable runtime needs a non-empty command".to_string(),
                ));
            }
            if let Some(env) = environment.iter().find(|e| e.target_name() == CONNECTION_URL_ENV) {
                return Err(RuntimeError::InvalidConfig(format!(
                    "'{}' is reserved and set by the server (declared by {:?})",
                    CONNECTION_URL_ENV, env
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRuntime {
    pub host: String,
    pub agent_type: String,
    pub app_id: String,
    pub privacy_key: String,
}

/// Declaration of one environment variable for an executable agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvVar", into = "RawEnvVar")]
pub enum EnvVar {
    /// `name` + `value`
    Literal { name: String, value: String },
    /// `name` + `from`
    FromOption { name: String, option: String },
    /// `option` on its own: the variable takes the option's name.
    OptionShorthand { option: String },
}

impl EnvVar {
    pub fn target_name(&self) -> &str {
        match self {
            EnvVar::Literal { name, .. } | EnvVar::FromOption { name, .. } => name,
            EnvVar::OptionShorthand { option } => option,
        }
    }

    pub fn referenced_option(&self) -> Option<&str> {
        match self {
            EnvVar::Literal { .. } => None,
            EnvVar::FromOption { option, .. } | EnvVar::OptionShorthand { option } => Some(option),
        }
    }

    pub fn resolve(&self, options: &OptionValues) -> Result<(String, String), RuntimeError> {
        let option = match self {
            EnvVar::Literal { name, value } => return Ok((name.clone(), value.clone())),
            EnvVar::FromOption { option, .. } | EnvVar::OptionShorthand { option } => option,
        };
        let value = options
            .get(option)
            .ok_or_else(|| RuntimeError::InvalidConfig(format!("Undefined option '{}'", option)))?;
        Ok((self.target_name().to_string(), value.to_string()))
    }
}

/// Wire shape of [`EnvVar`]: every field optional, validated on conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEnvVar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
}

impl TryFrom<RawEnvVar> for EnvVar {
    type Error = RuntimeError;

    fn try_from(raw: RawEnvVar) -> Result<Self, Self::Error> {
        match raw {
            RawEnvVar { option: Some(option), name: None, value: None, from: None } => {
                Ok(EnvVar::OptionShorthand { option })
            }
            RawEnvVar { option: Some(_), .. } => Err(RuntimeError::InvalidConfig(
                "'option' is shorthand for 'name' & 'from' and must be used on its own".to_string(),
            )),
            RawEnvVar { name: Some(_), value: Some(_), from: Some(_), .. } => Err(RuntimeError::InvalidConfig(
                "'from' and 'value' are mutually exclusive".to_string(),
            )),
            RawEnvVar { name: Some(name), value: Some(value), .. } => Ok(EnvVar::Literal { name, value }),
            RawEnvVar { name: Some(name), from: Some(option), .. } => Ok(EnvVar::FromOption { name, option }),
            RawEnvVar { name: Some(name), .. } => Err(RuntimeError::InvalidConfig(format!(
                "'value' or 'from' must be provided for '{}'",
                name
            ))),
            RawEnvVar { name: None, .. } => Err(RuntimeError::InvalidConfig(
                "environment variable needs 'name' or 'option'".to_string(),
            )),
        }
    }
}

impl From<EnvVar> for RawEnvVar {
    fn from(env: EnvVar) -> Self {
        match env {
            EnvVar::Literal { name, value } => RawEnvVar { name: Some(name), value: Some(value), ..Default::default() },
            EnvVar::FromOption { name, option } => RawEnvVar { name: Some(name), from: Some(option), ..Default::default() },
            EnvVar::OptionShorthand { option } => RawEnvVar { option: Some(option), ..Default::default() },
        }
    }
}

/// A live agent started by an [`AgentRuntime`].
#[async_trait]
pub trait OrchestratorHandle: Send + Sync {
    fn agent_name(&self) -> &AgentName;

    /// Stop the agent. Must be safe to call on an agent that already exited.
    async fn destroy(&self) -> Result<(), RuntimeError>;
}
