//! Mail messages → raw signals.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tracing::debug;

use crate::signal::model::{DESCRIPTION_MAX_CHARS, RawSignal, SignalSource, truncate_chars};

const COMPLAINT_KEYWORDS: &[&str] = &[
    "complaint",
    "issue",
    "problem",
    "dissatisfied",
    "disappointed",
    "terrible",
    "awful",
];
const URGENT_KEYWORDS: &[&str] = &["urgent", "asap", "immediate", "critical", "emergency"];
const DEADLINE_KEYWORDS: &[&str] = &["deadline", "due date", "overdue", "expired"];

const NO_SUBJECT: &str = "No Subject";
const UNKNOWN_SENDER: &str = "Unknown";
const BODY_UNAVAILABLE: &str = "Email body could not be extracted";

/// Classify a message by keyword. First match wins:
/// complaint (subject or body), urgent (subject only), deadline (subject or
/// body), system alert (no-reply sender or "alert" in subject).
pub fn classify_email(subject: &str, body: &str, sender: &str) -> &'static str {
    let subject = subject.to_lowercase();
    let body = body.to_lowercase();
    let either = |words: &[&str]| words.iter().any(|w| subject.contains(w) || body.contains(w));

    if either(COMPLAINT_KEYWORDS) {
        "customer_complaint"
    } else if URGENT_KEYWORDS.iter().any(|w| subject.contains(w)) {
        "urgent_email"
    } else if either(DEADLINE_KEYWORDS) {
        "deadline"
    } else if sender.to_lowercase().contains("noreply") || subject.contains("alert") {
        "system_alert"
    } else {
        "general_email"
    }
}

/// Build a signal from a full message as returned by the mail tool's get
/// action (`{id, labelIds, payload: {headers, body, parts}}`).
pub fn email_to_signal(message: &Value) -> RawSignal {
    let payload = &message["payload"];
    let header = |name: &str| {
        payload["headers"]
            .as_array()
            .and_then(|headers| {
                headers
                    .iter()
                    .find(|h| h["name"].as_str().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            })
            .and_then(|h| h["value"].as_str())
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    };

    let subject = header("Subject").unwrap_or_else(|| NO_SUBJECT.into());
    let sender = header("From").unwrap_or_else(|| UNKNOWN_SENDER.into());
    let date = header("Date").unwrap_or_default();
    let body = extract_body(payload).unwrap_or_else(|| BODY_UNAVAILABLE.into());
    let signal_type = classify_email(&subject, &body, &sender);

    debug!(signal_type, sender = %sender, "Converted mail message");

    RawSignal::new(
        SignalSource::Mail.as_str(),
        signal_type,
        subject,
        truncate_chars(&body, DESCRIPTION_MAX_CHARS),
    )
    .with_sender(sender)
    .with_metadata(json!({
        "email_id": message["id"],
        "date": date,
        "labels": message.get("labelIds").cloned().unwrap_or_else(|| json!([])),
    }))
}

/// Plain-text body: the top-level body if present, else the first
/// non-blank `text/plain` part.
fn extract_body(payload: &Value) -> Option<String> {
    if let Some(text) = payload["body"]["data"].as_str().and_then(decode_part) {
        return Some(text);
    }
    payload["parts"]
        .as_array()?
        .iter()
        .filter(|part| part["mimeType"] == "text/plain")
        .find_map(|part| part["body"]["data"].as_str().and_then(decode_part))
}

fn decode_part(data: &str) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    (!text.trim().is_empty()).then_some(text)
}
