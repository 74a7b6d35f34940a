//! Execution records: one audit row per attempted fan-out action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::action::ToolAction;

/// Status of one fan-out step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown execution status: {s}")),
        }
    }
}

/// Audit row for one attempted action against one external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub tool: String,
    pub action: String,
    pub status: ExecutionStatus,
    pub request_data: Option<serde_json::Value>,
    pub response_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// True when the response came from a simulated or fallback adapter.
    pub simulated: bool,
    /// Adapter attempts consumed, including the successful one.
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl ExecutionRecord {
    /// Open a pending record for `action`, stamped now.
    pub fn start(signal_id: Uuid, action: ToolAction, request: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_id,
            tool: action.tool().name().to_string(),
            action: action.name().to_string(),
            status: ExecutionStatus::Pending,
            request_data: Some(request),
            response_data: None,
            error_message: None,
            simulated: false,
            attempts: 0,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Terminate successfully. Returns the update to persist.
    pub fn succeed(
        &mut self,
        response: serde_json::Value,
        simulated: bool,
        attempts: u32,
    ) -> ExecutionUpdate {
        self.status = ExecutionStatus::Success;
        self.response_data = Some(response);
        self.simulated = simulated;
        self.attempts = attempts;
        self.finish()
    }

    /// Terminate with an error. Returns the update to persist.
    pub fn fail(&mut self, error: impl Into<String>, attempts: u32) -> ExecutionUpdate {
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(error.into());
        self.attempts = attempts;
        self.finish()
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ExecutionStatus::Pending
    }

    fn finish(&mut self) -> ExecutionUpdate {
        let completed_at = Utc::now().max(self.started_at);
        let duration_ms = (completed_at - self.started_at).num_milliseconds();
        self.completed_at = Some(completed_at);
        self.duration_ms = Some(duration_ms);
        ExecutionUpdate {
            status: self.status,
            response_data: self.response_data.clone(),
            error_message: self.error_message.clone(),
            simulated: self.simulated,
            attempts: self.attempts,
            completed_at,
            duration_ms,
        }
    }
}

/// Terminal fields written back to a record once its step finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub response_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub simulated: bool,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}
