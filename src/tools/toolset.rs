//! Maps each tool to its adapter and runs calls under the retry policy.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::OpsConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::tools::action::{ToolAction, ToolKind};
use crate::tools::adapter::{ToolAdapter, ToolResponse};
use crate::tools::retry::{Retried, RetryExhausted, RetryPolicy, with_retry};
use crate::tools::router::ToolRouterAdapter;
use crate::tools::simulated::{SimulatedAdapter, simulated_response};

/// Adapters keyed by tool. A tool without an adapter is "unconfigured".
#[derive(Clone, Default)]
pub struct ToolSet {
    adapters: HashMap<ToolKind, Arc<dyn ToolAdapter>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tool backed by [`SimulatedAdapter`].
    pub fn simulated() -> Self {
        ToolKind::ALL.into_iter().fold(Self::new(), |set, kind| {
            set.with_adapter(Arc::new(SimulatedAdapter::new(kind)))
        })
    }

    /// Build from configuration: simulation wins, then the router, else empty.
    pub fn from_config(config: &OpsConfig) -> Self {
        if config.simulate_tools {
            tracing::info!("Tool simulation enabled for all tools");
            return Self::simulated();
        }
        match &config.router {
            Some(router) => {
                let client = reqwest::Client::new();
                ToolKind::ALL.into_iter().fold(Self::new(), |set, kind| {
                    set.with_adapter(Arc::new(ToolRouterAdapter::new(kind, router, client.clone())))
                })
            }
            None => {
                tracing::warn!("No tool router configured; tool calls will use the configuration fallback");
                Self::new()
            }
        }
    }

    /// Register (or replace) the adapter for its tool.
    pub fn with_adapter(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.adapters.insert(adapter.tool(), adapter);
        self
    }

    pub fn get(&self, tool: ToolKind) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.get(&tool).cloned()
    }

    pub fn is_configured(&self, tool: ToolKind) -> bool {
        self.adapters.contains_key(&tool)
    }

    /// Call `action` through its adapter under `policy`.
    ///
    /// A missing adapter, or one reporting itself unconfigured, yields the
    /// configuration fallback immediately: flagged `simulated`, zero retries.
    pub async fn call(
        &self,
        policy: &RetryPolicy,
        action: ToolAction,
        params: &serde_json::Value,
    ) -> Result<Retried<ToolResponse>, RetryExhausted> {
        let Some(adapter) = self.get(action.tool()) else {
            return Ok(Self::fallback(action, params, 0));
        };

        let result = with_retry(policy, action, |_| {
            let adapter = adapter.clone();
            async move { adapter.execute(action, params).await }
        })
        .await;

        match result {
            Err(RetryExhausted {
                last:
                    AdapterError {
                        kind: AdapterErrorKind::Unconfigured,
                        ..
                    },
                attempts,
            }) => Ok(Self::fallback(action, params, attempts)),
            other => other,
        }
    }

    fn fallback(action: ToolAction, params: &serde_json::Value, attempts: u32) -> Retried<ToolResponse> {
        tracing::info!(
            tool = %action.tool(),
            action = %action,
            simulated = true,
            "Tool unconfigured, using configuration fallback"
        );
        Retried {
            value: simulated_response(action, params),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct Unconfigured {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ToolAdapter for Unconfigured {
        fn tool(&self) -> ToolKind {
            ToolKind::Chat
        }

        async fn execute(
            &self,
            action: ToolAction,
            _params: &serde_json::Value,
        ) -> Result<ToolResponse, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AdapterError::unconfigured(ToolKind::Chat, action))
        }
    }

    #[tokio::test]
    async fn missing_adapter_yields_flagged_fallback() {
        let set = ToolSet::new();
        let out = set
            .call(&RetryPolicy::immediate(3), ToolAction::CreateCard, &serde_json::json!({}))
            .await
            .unwrap();
        assert!(out.value.simulated);
        assert_eq!(out.attempts, 0);
        assert!(out.value.artifact_id("id").is_some());
    }

    #[tokio::test]
    async fn unconfigured_adapter_is_not_retried() {
        let adapter = Arc::new(Unconfigured {
            calls: AtomicU32::new(0),
        });
        let set = ToolSet::new().with_adapter(adapter.clone());
        let out = set
            .call(&RetryPolicy::immediate(3), ToolAction::SendMessage, &serde_json::json!({}))
            .await
            .unwrap();
        assert!(out.value.simulated);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn simulated_set_covers_every_tool() {
        let set = ToolSet::simulated();
        for kind in ToolKind::ALL {
            assert!(set.is_configured(kind));
        }
    }
}
