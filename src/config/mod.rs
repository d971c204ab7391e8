//! Application configuration
//!
//! Deployments carry their configuration as a JSON document under the
//! `"config"` key of their config source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::errors::{InteractionError, InteractionResult};
use crate::value_objects::StoreName;

/// Key under which the application config is stored
pub const CONFIG_KEY: &str = "config";

/// Input that forces a session back to the start state
pub const DEFAULT_RESET_KEYWORD: &str = "!reset";

/// Read access to deployment configuration values
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn get(&self, key: &str) -> InteractionResult<Option<String>>;
}

/// Config source backed by a map held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl ConfigSource for StaticConfig {
    async fn get(&self, key: &str) -> InteractionResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }
}

/// Settings of one conversational application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Store namespace for user records; the default namespace when absent
    pub name: Option<String>,
    /// State every new session starts in
    pub start_state: String,
    /// Language for users whose inbound message does not name one
    pub default_lang: Option<String>,
    pub reset_keyword: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: None,
            start_state: String::new(),
            default_lang: None,
            reset_keyword: DEFAULT_RESET_KEYWORD.to_string(),
        }
    }
}

impl AppConfig {
    pub fn new(start_state: impl Into<String>) -> Self {
        Self {
            start_state: start_state.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = Some(lang.into());
        self
    }

    pub fn from_json(json: &str) -> InteractionResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            InteractionError::configuration(format!("invalid config: {e}")).with_cause(e)
        })
    }

    /// Read the config from `source`, falling back to defaults when unset
    pub async fn load(source: &dyn ConfigSource) -> InteractionResult<Self> {
        match source.get(CONFIG_KEY).await? {
            Some(json) => Self::from_json(&json),
            None => {
                debug!("No config found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> InteractionResult<()> {
        if self.start_state.trim().is_empty() {
            return Err(InteractionError::configuration("no start state configured"));
        }
        if self.reset_keyword.trim().is_empty() {
            return Err(InteractionError::configuration("reset keyword cannot be empty"));
        }
        Ok(())
    }

    /// Namespace user records are stored under when a message names none
    pub fn store_name(&self) -> StoreName {
        self.name.clone().map(StoreName::Named).unwrap_or_default()
    }
}
