// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Typed option values and the option schema a registry agent declares.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of value an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Number,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::String => f.write_str("string"),
            OptionKind::Number => f.write_str("number"),
        }
    }
}

/// A concrete option value used to parametrize an agent spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Str(String),
    Num(f64),
}

impl ConfigValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            ConfigValue::Str(_) => OptionKind::String,
            ConfigValue::Num(_) => OptionKind::Number,
        }
    }

    /// Convert a JSON primitive. Strings and numbers are accepted; anything else
    /// has no option representation.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(ConfigValue::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(ConfigValue::Num),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Str(s) => f.write_str(s),
            // f64's Display drops the fractional part of whole numbers ("3", not "3.0").
            ConfigValue::Num(n) => write!(f, "{}", n),
        }
    }
}

/// Option declaration in a registry agent's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentOption {
    String {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    Number {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<f64>,
    },
}

impl AgentOption {
    pub fn name(&self) -> &str {
        match self {
            AgentOption::String { name, .. } | AgentOption::Number { name, .. } => name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            AgentOption::String { description, .. } | AgentOption::Number { description, .. } => {
                description.as_deref()
            }
        }
    }

    pub fn kind(&self) -> OptionKind {
        match self {
            AgentOption::String { .. } => OptionKind::String,
            AgentOption::Number { .. } => OptionKind::Number,
        }
    }

    pub fn default_value(&self) -> Option<ConfigValue> {
        match self {
            AgentOption::String { default, .. } => default.clone().map(ConfigValue::Str),
            AgentOption::Number { default, .. } => default.map(ConfigValue::Num),
        }
    }
}

/// Map of option name to value.
pub type OptionValues = HashMap<String, ConfigValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display_drops_trailing_zero() {
        assert_eq!(ConfigValue::Num(3.0).to_string(), "3");
        assert_eq!(ConfigValue::Num(0.25).to_string(), "0.25");
        assert_eq!(ConfigValue::Str("abc".into()).to_string(), "abc");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            ConfigValue::from_json(&serde_json::json!("x")),
            Some(ConfigValue::Str("x".into()))
        );
        assert_eq!(ConfigValue::from_json(&serde_json::json!(2)), Some(ConfigValue::Num(2.0)));
        assert_eq!(ConfigValue::from_json(&serde_json::json!(true)), None);
        assert_eq!(ConfigValue::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_option_schema_from_yaml() {
        let yaml = r#"
- type: string
  name: API_KEY
  description: key used by the agent
- type: number
  name: temperature
  default: 0.3
"#;
        let options: Vec<AgentOption> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options[0].name(), "API_KEY");
        assert_eq!(options[0].kind(), OptionKind::String);
        assert_eq!(options[0].default_value(), None);
        assert_eq!(options[1].default_value(), Some(ConfigValue::Num(0.3)));
    }

    #[test]
    fn test_option_default_type_enforced() {
        let yaml = "type: number\nname: n\ndefault: not-a-number\n";
        assert!(serde_yaml::from_str::<AgentOption>(yaml).is_err());
    }
}
