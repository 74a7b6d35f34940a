//! Closed set of external tools and the actions the core may invoke on them.
//!
//! Wire names follow the `{TOOL}_{ACTION}` convention (e.g. `TRELLO_CREATE_CARD`)
//! but are always derived from the enum, never assembled from free-form strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One logical external collaboration tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    TaskBoard,
    KnowledgeBase,
    Chat,
    Mail,
    Spreadsheet,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        Self::TaskBoard,
        Self::KnowledgeBase,
        Self::Chat,
        Self::Mail,
        Self::Spreadsheet,
    ];

    /// Symbolic tool name used in logs and execution records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskBoard => "task-board",
            Self::KnowledgeBase => "knowledge-base",
            Self::Chat => "chat",
            Self::Mail => "mail",
            Self::Spreadsheet => "spreadsheet",
        }
    }

    /// Upper-case provider prefix used by the tool router.
    pub fn wire_prefix(&self) -> &'static str {
        match self {
            Self::TaskBoard => "TRELLO",
            Self::KnowledgeBase => "NOTION",
            Self::Chat => "SLACK",
            Self::Mail => "GMAIL",
            Self::Spreadsheet => "GOOGLESHEETS",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("Unknown tool: {s}"))
    }
}

/// A (tool, action) pair. Each variant belongs to exactly one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolAction {
    CreateCard,
    CreatePage,
    SendMessage,
    SearchEmails,
    GetEmail,
    ReadRange,
}

impl ToolAction {
    pub const ALL: [ToolAction; 6] = [
        Self::CreateCard,
        Self::CreatePage,
        Self::SendMessage,
        Self::SearchEmails,
        Self::GetEmail,
        Self::ReadRange,
    ];

    /// The tool this action is dispatched to.
    pub fn tool(&self) -> ToolKind {
        match self {
            Self::CreateCard => ToolKind::TaskBoard,
            Self::CreatePage => ToolKind::KnowledgeBase,
            Self::SendMessage => ToolKind::Chat,
            Self::SearchEmails | Self::GetEmail => ToolKind::Mail,
            Self::ReadRange => ToolKind::Spreadsheet,
        }
    }

    /// Lower-case action name, as stored in execution records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateCard => "create_card",
            Self::CreatePage => "create_page",
            Self::SendMessage => "send_message",
            Self::SearchEmails => "search_emails",
            Self::GetEmail => "get_email",
            Self::ReadRange => "read_range",
        }
    }

    /// Router action identifier, e.g. `SLACK_SEND_MESSAGE`.
    pub fn wire_name(&self) -> String {
        format!(
            "{}_{}",
            self.tool().wire_prefix(),
            self.name().to_ascii_uppercase()
        )
    }

    /// Response key holding the id of the artifact this action creates.
    pub fn artifact_key(&self) -> &'static str {
        match self {
            Self::SendMessage => "ts",
            _ => "id",
        }
    }
}

impl fmt::Display for ToolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}
