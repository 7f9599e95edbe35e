//! Provider contract shared by every chat backend adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Normalized reply produced by a single provider query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Reply text
    pub message: String,
    /// Payload the reply was parsed from
    pub raw: Value,
    /// Provider-specific fields passed through untouched (citations, score, role, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl LlmResponse {
    pub fn new(message: impl Into<String>, raw: Value) -> Self {
        Self {
            message: message.into(),
            raw,
            extra: Map::new(),
        }
    }

    /// Attach a pass-through field; `null` values are dropped
    pub fn with_extra(mut self, key: &str, value: Option<&Value>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_null()) {
            self.extra.insert(key.to_string(), value.clone());
        }
        self
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Text placed around every outgoing prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptDecoration {
    pub prepend: String,
    pub append: String,
}

impl PromptDecoration {
    pub fn new(prepend: impl Into<String>, append: impl Into<String>) -> Self {
        Self {
            prepend: prepend.into(),
            append: append.into(),
        }
    }

    pub fn apply(&self, message: &str) -> String {
        format!("{}{}{}", self.prepend, message, self.append)
    }
}

/// Trait for chat backends reachable through the uniform query interface
#[async_trait]
pub trait Provider: Send + Sync {
    /// Routing name, unique across the registry
    fn name(&self) -> &str;

    /// Adapter family reported in model metadata
    fn family(&self) -> &str {
        self.name()
    }

    /// Prompt decoration applied by `build_prompt`
    fn decoration(&self) -> &PromptDecoration;

    fn build_prompt(&self, message: &str) -> String {
        self.decoration().apply(message)
    }

    /// Send one message and wait for the backend's reply
    async fn query(&self, text: &str) -> Result<LlmResponse>;
}
