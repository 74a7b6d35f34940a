//! HTTP adapter for a tool-router service that fronts the real providers.
//!
//! Every action is a `POST {base}/tools/execute/{WIRE_NAME}` with the
//! configured entity id and the action arguments. The router answers
//! `{ successful, data, error }`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::RouterConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::tools::action::{ToolAction, ToolKind};
use crate::tools::adapter::{ToolAdapter, ToolResponse};

/// Real adapter for one tool, routed through the tool-router service.
pub struct ToolRouterAdapter {
    tool: ToolKind,
    base_url: String,
    api_key: SecretString,
    entity_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RouterReply {
    #[serde(default = "default_true")]
    successful: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ToolRouterAdapter {
    pub fn new(tool: ToolKind, config: &RouterConfig, client: reqwest::Client) -> Self {
        Self {
            tool,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            entity_id: config.entity_id.clone(),
            client,
        }
    }

    fn execute_url(&self, action: ToolAction) -> String {
        format!("{}/tools/execute/{}", self.base_url, action.wire_name())
    }

    fn err(&self, action: ToolAction, kind: AdapterErrorKind, cause: impl Into<String>) -> AdapterError {
        AdapterError::new(self.tool, action, kind, cause)
    }
}

#[async_trait]
impl ToolAdapter for ToolRouterAdapter {
    fn tool(&self) -> ToolKind {
        self.tool
    }

    async fn execute(
        &self,
        action: ToolAction,
        params: &serde_json::Value,
    ) -> Result<ToolResponse, AdapterError> {
        if action.tool() != self.tool {
            return Err(self.err(
                action,
                AdapterErrorKind::Remote { status: None },
                format!("action not supported by {}", self.tool),
            ));
        }

        let body = serde_json::json!({
            "entity_id": self.entity_id,
            "arguments": params,
        });

        let resp = self
            .client
            .post(self.execute_url(action))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    AdapterErrorKind::Timeout(std::time::Duration::ZERO)
                } else {
                    AdapterErrorKind::Transport
                };
                self.err(action, kind, e.to_string())
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(self.err(action, AdapterErrorKind::Auth, format!("router returned {status}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(self.err(
                action,
                AdapterErrorKind::Remote {
                    status: Some(status.as_u16()),
                },
                text,
            ));
        }

        let reply: RouterReply = resp.json().await.map_err(|e| {
            self.err(
                action,
                AdapterErrorKind::Remote {
                    status: Some(status.as_u16()),
                },
                format!("invalid router response: {e}"),
            )
        })?;

        if !reply.successful {
            return Err(self.err(
                action,
                AdapterErrorKind::Remote { status: None },
                reply.error.unwrap_or_else(|| "unknown router error".into()),
            ));
        }

        tracing::debug!(tool = %self.tool, action = %action, "Tool router call succeeded");
        Ok(ToolResponse::new(
            reply.data.unwrap_or(serde_json::Value::Object(Default::default())),
        ))
    }
}
