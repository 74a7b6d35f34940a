//! Uniform capability over one external collaboration tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::tools::action::{ToolAction, ToolKind};

/// Result of one adapter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Tool-native response body.
    pub data: serde_json::Value,
    /// True when no real tool was contacted.
    #[serde(default)]
    pub simulated: bool,
}

impl ToolResponse {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            simulated: false,
        }
    }

    pub fn simulated(data: serde_json::Value) -> Self {
        Self {
            data,
            simulated: true,
        }
    }

    /// String id under `key`, accepting numeric ids too.
    pub fn artifact_id(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One external tool behind a uniform `execute(action, params)` call.
///
/// Implementations fail with an [`AdapterError`] carrying the tool, the
/// action and the cause. They never retry on their own.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// The tool this adapter talks to.
    fn tool(&self) -> ToolKind;

    /// Run `action` with `params`.
    async fn execute(
        &self,
        action: ToolAction,
        params: &serde_json::Value,
    ) -> Result<ToolResponse, AdapterError>;
}
