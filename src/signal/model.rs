//! Signal data model: intake payload, tracked signal, status machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::scoring::band::PriorityBand;

/// Maximum stored subject length (characters).
pub const SUBJECT_MAX_CHARS: usize = 500;

/// Maximum stored description length (characters).
pub const DESCRIPTION_MAX_CHARS: usize = 5000;

// ── Source ──────────────────────────────────────────────────────────

/// Where a signal was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Mail,
    Spreadsheet,
    Chat,
    Manual,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Spreadsheet => "spreadsheet",
            Self::Chat => "chat",
            Self::Manual => "manual",
        }
    }

    /// Capitalized form used in tool payloads ("Mail", "Chat", ...).
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mail => "Mail",
            Self::Spreadsheet => "Spreadsheet",
            Self::Chat => "Chat",
            Self::Manual => "Manual",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignalSource {
    type Err = ValidationError;

    /// Accepts the canonical names plus the provider names pollers emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mail" | "email" | "gmail" => Ok(Self::Mail),
            "spreadsheet" | "sheets" => Ok(Self::Spreadsheet),
            "chat" | "slack" => Ok(Self::Chat),
            "manual" | "webhook" | "api" => Ok(Self::Manual),
            other => Err(ValidationError::UnknownSource(other.to_string())),
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────

/// Processing status of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward-only transitions. `Failed → Failed` is allowed so a failed
    /// signal can accumulate retries and a new error message.
    pub fn can_transition_to(&self, next: SignalStatus) -> bool {
        use SignalStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Failed)
        )
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignalStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown signal status: {s}")),
        }
    }
}

// ── Metadata ────────────────────────────────────────────────────────

/// Semi-structured key → value metadata attached to a signal.
///
/// Accessors are lenient: a missing key, a null, or an unparsable value
/// all read as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalMetadata(pub serde_json::Map<String, serde_json::Value>);

impl SignalMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Numeric value, accepting JSON numbers and numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Intake payload ──────────────────────────────────────────────────

/// Raw signal as submitted by a poller, webhook, or manual caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSignal {
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "type", alias = "signal_type")]
    pub signal_type: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl RawSignal {
    pub fn new(
        source: impl Into<String>,
        signal_type: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            signal_type: signal_type.into(),
            subject: subject.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check required fields and parse the source.
    pub fn validate(&self) -> Result<(SignalSource, SignalMetadata), ValidationError> {
        if self.source.trim().is_empty() {
            return Err(ValidationError::MissingField("source"));
        }
        if self.signal_type.trim().is_empty() {
            return Err(ValidationError::MissingField("type"));
        }
        if self.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("subject"));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::MissingField("content"));
        }
        let source: SignalSource = self.source.parse()?;
        let metadata = match &self.metadata {
            None | Some(serde_json::Value::Null) => SignalMetadata::new(),
            Some(serde_json::Value::Object(map)) => SignalMetadata(map.clone()),
            Some(other) => {
                return Err(ValidationError::InvalidMetadata(json_kind(other).to_string()));
            }
        };
        Ok((source, metadata))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ── Tracked signal ──────────────────────────────────────────────────

/// Ids of the artifacts created by the fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLinks {
    pub task_item_id: Option<String>,
    pub doc_id: Option<String>,
    pub chat_message_id: Option<String>,
}

/// One detected operational event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub source: SignalSource,
    pub signal_type: String,
    pub subject: String,
    pub description: String,
    pub sender: String,
    pub metadata: SignalMetadata,

    pub priority_score: f64,
    pub ai_summary: Option<String>,
    pub ai_reasoning: Option<String>,
    pub recommended_action: Option<String>,
    pub assigned_to: Option<String>,
    pub artifacts: ArtifactLinks,

    pub status: SignalStatus,
    pub retries: u32,
    pub error_message: Option<String>,

    pub detected_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// Create a pending signal from a validated intake payload.
    ///
    /// Every call mints a fresh id; intake never deduplicates by content.
    pub fn from_intake(raw: &RawSignal) -> Result<Self, ValidationError> {
        let (source, metadata) = raw.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            signal_type: raw.signal_type.trim().to_string(),
            subject: truncate_chars(&raw.subject, SUBJECT_MAX_CHARS),
            description: truncate_chars(&raw.content, DESCRIPTION_MAX_CHARS),
            sender: raw.sender.clone(),
            metadata,
            priority_score: 0.0,
            ai_summary: None,
            ai_reasoning: None,
            recommended_action: None,
            assigned_to: None,
            artifacts: ArtifactLinks::default(),
            status: SignalStatus::Pending,
            retries: 0,
            error_message: None,
            detected_at: Utc::now(),
            processed_at: None,
            completed_at: None,
        })
    }

    pub fn band(&self) -> PriorityBand {
        PriorityBand::from_score(self.priority_score)
    }

    /// First `max` characters of the description.
    pub fn description_excerpt(&self, max: usize) -> String {
        truncate_chars(&self.description, max)
    }

    /// Apply a partial update in place (mirrors what the store persists).
    pub fn apply(&mut self, update: &SignalUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(score) = update.priority_score {
            self.priority_score = score;
        }
        if let Some(ref v) = update.ai_summary {
            self.ai_summary = Some(v.clone());
        }
        if let Some(ref v) = update.ai_reasoning {
            self.ai_reasoning = Some(v.clone());
        }
        if let Some(ref v) = update.recommended_action {
            self.recommended_action = Some(v.clone());
        }
        if let Some(ref v) = update.assigned_to {
            self.assigned_to = Some(v.clone());
        }
        if let Some(ref v) = update.task_item_id {
            self.artifacts.task_item_id = Some(v.clone());
        }
        if let Some(ref v) = update.doc_id {
            self.artifacts.doc_id = Some(v.clone());
        }
        if let Some(ref v) = update.chat_message_id {
            self.artifacts.chat_message_id = Some(v.clone());
        }
        if let Some(retries) = update.retries {
            self.retries = retries;
        }
        if let Some(ref v) = update.error_message {
            self.error_message = Some(v.clone());
        }
        if let Some(at) = update.processed_at {
            self.processed_at = Some(at);
        }
        if let Some(at) = update.completed_at {
            self.completed_at = Some(at);
        }
    }
}

/// Partial update of a signal's mutable fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalUpdate {
    pub status: Option<SignalStatus>,
    pub priority_score: Option<f64>,
    pub ai_summary: Option<String>,
    pub ai_reasoning: Option<String>,
    pub recommended_action: Option<String>,
    pub assigned_to: Option<String>,
    pub task_item_id: Option<String>,
    pub doc_id: Option<String>,
    pub chat_message_id: Option<String>,
    pub retries: Option<u32>,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SignalUpdate {
    pub fn status(status: SignalStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ── Intake response ─────────────────────────────────────────────────

/// Terminal status reported back to the intake caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStatus {
    /// Scored below the threshold; no fan-out happened.
    LowPriority,
    Completed,
    Failed,
}

/// One fan-out step as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub tool: String,
    pub action: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub simulated: bool,
}

/// Result of processing one signal through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeResponse {
    pub signal_id: Uuid,
    pub status: IntakeStatus,
    pub priority_score: f64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepSummary>,
}
