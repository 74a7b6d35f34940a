//! Error types for the operations command center.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::tools::action::{ToolAction, ToolKind};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Intake rejections. Raised before a signal record exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown signal source: '{0}'")]
    UnknownSource(String),

    #[error("Metadata must be a JSON object, got {0}")]
    InvalidMetadata(String),
}

/// Scorer faults. The engine never surfaces these; it substitutes a neutral score.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Scorer {scorer} failed: {reason}")]
    Failed { scorer: String, reason: String },

    #[error("Scorer task aborted: {0}")]
    Aborted(String),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Classification of an adapter failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterErrorKind {
    /// Connection refused, DNS, TLS, broken pipe.
    Transport,
    /// The per-call timeout elapsed.
    Timeout(Duration),
    /// The remote tool answered with an error.
    Remote { status: Option<u16> },
    /// Credentials rejected.
    Auth,
    /// No adapter configured for this tool.
    Unconfigured,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Timeout(after) => write!(f, "timeout after {after:?}"),
            Self::Remote { status: Some(code) } => write!(f, "remote status {code}"),
            Self::Remote { status: None } => write!(f, "remote"),
            Self::Auth => write!(f, "auth"),
            Self::Unconfigured => write!(f, "unconfigured"),
        }
    }
}

/// A failed call against one external tool.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{tool} {action} failed ({kind}): {cause}")]
pub struct AdapterError {
    pub tool: ToolKind,
    pub action: ToolAction,
    pub kind: AdapterErrorKind,
    pub cause: String,
}

impl AdapterError {
    pub fn new(
        tool: ToolKind,
        action: ToolAction,
        kind: AdapterErrorKind,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            tool,
            action,
            kind,
            cause: cause.into(),
        }
    }

    pub fn timeout(tool: ToolKind, action: ToolAction, after: Duration) -> Self {
        Self::new(
            tool,
            action,
            AdapterErrorKind::Timeout(after),
            "call exceeded per-attempt timeout",
        )
    }

    pub fn unconfigured(tool: ToolKind, action: ToolAction) -> Self {
        Self::new(
            tool,
            action,
            AdapterErrorKind::Unconfigured,
            "no adapter configured",
        )
    }

    /// Network, timeout, and 5xx-class failures. Auth and 4xx are permanent.
    pub fn is_transient(&self) -> bool {
        match &self.kind {
            AdapterErrorKind::Transport | AdapterErrorKind::Timeout(_) => true,
            AdapterErrorKind::Remote { status: Some(code) } => *code >= 500 || *code == 429,
            AdapterErrorKind::Remote { status: None } => true,
            AdapterErrorKind::Auth | AdapterErrorKind::Unconfigured => false,
        }
    }
}

/// Fatal per-signal errors: abort the remaining pipeline for that signal only.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Signal {id} cannot move from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
