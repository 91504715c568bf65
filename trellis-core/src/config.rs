//! Configuration
//!
//! Every setting has a default, so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// State key seeded eagerly for every field.
pub const DEFAULT_STATE_KEY: &str = "default";

fn default_state_key() -> String {
    DEFAULT_STATE_KEY.to_string()
}

fn default_max_size() -> usize {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSetConfig {
    /// Soft cap on stored records. Only processed records are evicted to get
    /// back under it.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for ChangeSetConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    #[serde(default = "default_state_key")]
    pub default_state_key: String,
    pub change_set: ChangeSetConfig,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            default_state_key: default_state_key(),
            change_set: ChangeSetConfig::default(),
        }
    }
}

impl FormConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_object_uses_defaults() {
        let config = FormConfig::from_json("{}").unwrap();
        assert_eq!(config, FormConfig::default());
        assert_eq!(config.default_state_key, "default");
        assert_eq!(config.change_set.max_size, 1000);
    }

    #[test]
    fn partial_override() {
        let config = FormConfig::from_json(r#"{"change_set": {"max_size": 16}}"#).unwrap();
        assert_eq!(config.change_set.max_size, 16);
        assert_eq!(config.default_state_key, "default");
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = FormConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
