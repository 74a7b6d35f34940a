//! Fan-out step payloads and the static owner table.
//!
//! Builders read the in-flight signal, so artifacts created by earlier steps
//! show up in the payloads of later ones.

use serde_json::{Value, json};

use crate::config::ToolTargets;
use crate::signal::model::{Signal, SignalUpdate, truncate_chars};
use crate::tools::action::ToolAction;

/// A side-effecting fan-out step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutStep {
    TaskCard,
    KnowledgePage,
    ChatAlert,
}

impl FanoutStep {
    pub fn action(self) -> ToolAction {
        match self {
            Self::TaskCard => ToolAction::CreateCard,
            Self::KnowledgePage => ToolAction::CreatePage,
            Self::ChatAlert => ToolAction::SendMessage,
        }
    }
}

/// Fan-out steps, in execution order.
pub const FANOUT_STEPS: [FanoutStep; 3] = [
    FanoutStep::TaskCard,
    FanoutStep::KnowledgePage,
    FanoutStep::ChatAlert,
];

/// Owner used when no row of [`ASSIGNMENT_TABLE`] matches.
pub const DEFAULT_OWNER: &str = "operations@company.com";

/// signal_type → owner.
pub const ASSIGNMENT_TABLE: &[(&str, &str)] = &[
    ("customer_complaint", "support@company.com"),
    ("urgent_email", "manager@company.com"),
    ("deadline", "project-lead@company.com"),
    ("system_alert", "devops@company.com"),
    ("financial", "finance@company.com"),
];

const CARD_EXCERPT_CHARS: usize = 1000;
const PAGE_TITLE_CHARS: usize = 100;
const UNASSIGNED: &str = "Unassigned";

pub fn assign_owner(signal_type: &str) -> &'static str {
    ASSIGNMENT_TABLE
        .iter()
        .find(|(kind, _)| *kind == signal_type)
        .map(|(_, owner)| *owner)
        .unwrap_or(DEFAULT_OWNER)
}

/// Parameters for `step` against the current signal state.
pub fn build_params(step: FanoutStep, signal: &Signal, targets: &ToolTargets) -> Value {
    match step {
        FanoutStep::TaskCard => task_card(signal, targets),
        FanoutStep::KnowledgePage => knowledge_page(signal, targets),
        FanoutStep::ChatAlert => chat_alert(signal, targets),
    }
}

/// Signal patch recording an artifact id produced by `step`.
pub fn artifact_update(step: FanoutStep, artifact_id: String) -> SignalUpdate {
    match step {
        FanoutStep::TaskCard => SignalUpdate {
            task_item_id: Some(artifact_id),
            ..Default::default()
        },
        FanoutStep::KnowledgePage => SignalUpdate {
            doc_id: Some(artifact_id),
            ..Default::default()
        },
        FanoutStep::ChatAlert => SignalUpdate {
            chat_message_id: Some(artifact_id),
            ..Default::default()
        },
    }
}

fn detected(signal: &Signal) -> String {
    signal.detected_at.format("%Y-%m-%d %H:%M").to_string()
}

fn text_or_empty(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or_default()
}

fn task_card(signal: &Signal, targets: &ToolTargets) -> Value {
    let band = signal.band();
    let desc = format!(
        "**Priority:** {score}/10\n\n\
         **Source:** {source}\n\
         **From:** {sender}\n\
         **Detected:** {detected}\n\n\
         **AI Summary:**\n{summary}\n\n\
         **Reasoning:**\n{reasoning}\n\n\
         **Recommended Action:**\n{action}\n\n\
         **Details:**\n{details}\n",
        score = signal.priority_score,
        source = signal.source,
        sender = signal.sender,
        detected = detected(signal),
        summary = text_or_empty(&signal.ai_summary),
        reasoning = text_or_empty(&signal.ai_reasoning),
        action = text_or_empty(&signal.recommended_action),
        details = signal.description_excerpt(CARD_EXCERPT_CHARS),
    );

    json!({
        "name": format!("[P{}] {}", signal.priority_score.floor() as i64, signal.subject),
        "desc": desc,
        "idList": targets.lane_for(band),
        "lane": band.lane(),
        "pos": "top",
    })
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

fn knowledge_page(signal: &Signal, targets: &ToolTargets) -> Value {
    let mut properties = json!({
        "Name": { "title": rich_text(&truncate_chars(&signal.subject, PAGE_TITLE_CHARS)) },
        "Priority": { "number": signal.priority_score },
        "Status": { "select": { "name": "In Progress" } },
        "Source": { "select": { "name": signal.source.display_name() } },
        "Assigned": {
            "rich_text": rich_text(signal.assigned_to.as_deref().unwrap_or(UNASSIGNED))
        },
    });
    if let (Some(card_id), Some(map)) = (&signal.artifacts.task_item_id, properties.as_object_mut()) {
        map.insert("Task Card".into(), json!({ "rich_text": rich_text(card_id) }));
    }

    let block = |kind: &str, content: &str| {
        json!({
            "object": "block",
            "type": kind,
            kind: { "rich_text": rich_text(content) },
        })
    };

    json!({
        "parent": { "database_id": targets.knowledge_base_database_id },
        "properties": properties,
        "children": [
            block("heading_2", "AI Analysis"),
            block("paragraph", text_or_empty(&signal.ai_summary)),
            block("heading_2", "Recommended Action"),
            block("paragraph", text_or_empty(&signal.recommended_action)),
        ],
    })
}

fn mrkdwn(label: &str, value: &str) -> Value {
    json!({ "type": "mrkdwn", "text": format!("*{label}:*\n{value}") })
}

fn chat_alert(signal: &Signal, targets: &ToolTargets) -> Value {
    let band = signal.band();
    let section = |label: &str, value: &str| json!({ "type": "section", "text": mrkdwn(label, value) });

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("{} New High-Priority Signal", band.emoji()),
            }
        }),
        json!({
            "type": "section",
            "fields": [
                mrkdwn("Priority", &format!("{}/10", signal.priority_score)),
                mrkdwn("Source", signal.source.display_name()),
                mrkdwn("From", &signal.sender),
                mrkdwn("Detected", &detected(signal)),
            ]
        }),
        section("Subject", &signal.subject),
        section("AI Summary", text_or_empty(&signal.ai_summary)),
        section("Recommended Action", text_or_empty(&signal.recommended_action)),
        section("Assigned To", signal.assigned_to.as_deref().unwrap_or(UNASSIGNED)),
    ];

    let tracking: Vec<String> = [
        signal.artifacts.task_item_id.as_ref().map(|id| format!("Task card `{id}`")),
        signal.artifacts.doc_id.as_ref().map(|id| format!("Knowledge page `{id}`")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !tracking.is_empty() {
        blocks.push(section("Tracking", &tracking.join("\n")));
    }

    blocks.push(json!({ "type": "divider" }));
    blocks.push(json!({
        "type": "context",
        "elements": [ { "type": "mrkdwn", "text": format!("Signal ID: `{}`", signal.id) } ]
    }));

    json!({
        "channel": targets.chat_channel_id,
        "text": format!("{} {}", band.emoji(), text_or_empty(&signal.ai_summary)),
        "blocks": blocks,
    })
}
