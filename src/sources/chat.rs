//! Chat webhook events → raw signals.

use serde_json::{Value, json};

use crate::signal::model::{RawSignal, SignalSource};

/// Convert a chat event callback (`{event: {type, text, user, channel}}`).
///
/// Only plain user `message` events produce a signal. Bot posts and
/// message subtypes (edits, joins) are ignored so the service's own alerts
/// never loop back in, as are empty messages.
pub fn chat_event_to_signal(payload: &Value) -> Option<RawSignal> {
    let event = payload.get("event")?;
    if event["type"] != "message" || event.get("bot_id").is_some() || event.get("subtype").is_some() {
        return None;
    }

    let text = event["text"].as_str().unwrap_or_default();
    if text.trim().is_empty() {
        return None;
    }
    let user = event["user"].as_str().unwrap_or_default();
    let channel = event["channel"].as_str().unwrap_or_default();

    Some(
        RawSignal::new(
            SignalSource::Chat.as_str(),
            "slack_message",
            format!("Slack message from {user}"),
            text,
        )
        .with_sender(user)
        .with_metadata(json!({
            "channel": channel,
            "event_type": "message",
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_event_becomes_signal() {
        let payload = json!({
            "event": { "type": "message", "text": "prod is down", "user": "U1", "channel": "C9" }
        });
        let raw = chat_event_to_signal(&payload).unwrap();
        assert_eq!(raw.source, "chat");
        assert_eq!(raw.signal_type, "slack_message");
        assert_eq!(raw.subject, "Slack message from U1");
        assert_eq!(raw.sender, "U1");
        assert_eq!(raw.metadata.unwrap()["channel"], "C9");
    }

    #[test]
    fn other_events_are_ignored() {
        assert!(chat_event_to_signal(&json!({})).is_none());
        assert!(chat_event_to_signal(&json!({ "event": { "type": "reaction_added" } })).is_none());
        assert!(
            chat_event_to_signal(&json!({
                "event": { "type": "message", "text": "alert", "bot_id": "B1" }
            }))
            .is_none()
        );
        assert!(
            chat_event_to_signal(&json!({
                "event": { "type": "message", "text": "", "user": "U1" }
            }))
            .is_none()
        );
    }
}
