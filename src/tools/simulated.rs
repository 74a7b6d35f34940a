//! Configuration-selected stand-in that fabricates tool responses.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AdapterError;
use crate::tools::action::{ToolAction, ToolKind};
use crate::tools::adapter::{ToolAdapter, ToolResponse};

/// Adapter that answers every action locally, flagged `simulated`.
pub struct SimulatedAdapter {
    tool: ToolKind,
}

impl SimulatedAdapter {
    pub fn new(tool: ToolKind) -> Self {
        Self { tool }
    }
}

/// Fabricated response body for `action`.
///
/// Shared with the configuration fallback so both look the same to callers.
pub fn simulated_response(action: ToolAction, params: &serde_json::Value) -> ToolResponse {
    let tool = action.tool();
    let id = simulated_id(tool);
    let data = match action {
        ToolAction::CreateCard => serde_json::json!({
            "id": id,
            "url": format!("https://trello.com/c/{id}"),
            "mock": true,
        }),
        ToolAction::CreatePage => serde_json::json!({
            "id": id,
            "url": format!("https://notion.so/{id}"),
            "mock": true,
        }),
        ToolAction::SendMessage => serde_json::json!({
            "id": id,
            "ts": format!("{}.000000", chrono::Utc::now().timestamp()),
            "channel": params.get("channel").cloned().unwrap_or(serde_json::Value::Null),
            "mock": true,
        }),
        ToolAction::SearchEmails => serde_json::json!({ "messages": [], "mock": true }),
        ToolAction::GetEmail => serde_json::json!({ "id": id, "mock": true }),
        ToolAction::ReadRange => serde_json::json!({ "values": [], "mock": true }),
    };
    ToolResponse::simulated(data)
}

fn simulated_id(tool: ToolKind) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("sim_{}_{}", tool.name().replace('-', "_"), &hex[..8])
}

#[async_trait]
impl ToolAdapter for SimulatedAdapter {
    fn tool(&self) -> ToolKind {
        self.tool
    }

    async fn execute(
        &self,
        action: ToolAction,
        params: &serde_json::Value,
    ) -> Result<ToolResponse, AdapterError> {
        tracing::info!(
            tool = %self.tool,
            action = %action,
            simulated = true,
            "Simulated tool call"
        );
        Ok(simulated_response(action, params))
    }
}
