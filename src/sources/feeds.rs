//! Polling feeds that read the mail and spreadsheet tools.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::error::AdapterError;
use crate::signal::model::RawSignal;
use crate::sources::SignalFeed;
use crate::sources::mail::email_to_signal;
use crate::sources::spreadsheet::{
    WATCHED_RANGES, operations_rows_to_signals, task_rows_to_signals, value_range_rows,
};
use crate::tools::action::ToolAction;
use crate::tools::retry::RetryPolicy;
use crate::tools::toolset::ToolSet;

/// Unread messages received within the lookback window.
pub struct MailFeed {
    tools: ToolSet,
    retry: RetryPolicy,
    lookback: ChronoDuration,
    search_limit: u32,
    per_poll: usize,
}

impl MailFeed {
    pub fn new(tools: ToolSet, retry: RetryPolicy) -> Self {
        Self {
            tools,
            retry,
            lookback: ChronoDuration::minutes(5),
            search_limit: 50,
            per_poll: 10,
        }
    }

    fn search_query(&self) -> String {
        let after = Utc::now() - self.lookback;
        format!("is:unread after:{}", after.format("%Y/%m/%d"))
    }
}

#[async_trait]
impl SignalFeed for MailFeed {
    fn name(&self) -> &str {
        "mail"
    }

    async fn poll(&self) -> Result<Vec<RawSignal>, AdapterError> {
        let search = json!({ "query": self.search_query(), "maxResults": self.search_limit });
        let found = self
            .tools
            .call(&self.retry, ToolAction::SearchEmails, &search)
            .await
            .map_err(|e| e.last)?;

        let ids: Vec<String> = found.value.data["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m["id"].as_str().map(str::to_string))
                    .take(self.per_poll)
                    .collect()
            })
            .unwrap_or_default();
        info!(feed = "mail", found = ids.len(), "Unread messages found");

        let mut signals = Vec::with_capacity(ids.len());
        for id in ids {
            match self
                .tools
                .call(&self.retry, ToolAction::GetEmail, &json!({ "id": id }))
                .await
            {
                Ok(message) => signals.push(email_to_signal(&message.value.data)),
                Err(e) => warn!(feed = "mail", email_id = %id, error = %e, "Skipping message"),
            }
        }
        Ok(signals)
    }
}

/// Overdue operations rows and open high-priority tasks.
pub struct SpreadsheetFeed {
    tools: ToolSet,
    retry: RetryPolicy,
    spreadsheet_id: String,
}

impl SpreadsheetFeed {
    pub fn new(tools: ToolSet, retry: RetryPolicy, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            tools,
            retry,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }
}

#[async_trait]
impl SignalFeed for SpreadsheetFeed {
    fn name(&self) -> &str {
        "spreadsheet"
    }

    async fn poll(&self) -> Result<Vec<RawSignal>, AdapterError> {
        let params = json!({ "spreadsheetId": self.spreadsheet_id, "ranges": WATCHED_RANGES });
        let read = self
            .tools
            .call(&self.retry, ToolAction::ReadRange, &params)
            .await
            .map_err(|e| e.last)?;

        let data = &read.value.data;
        let mut signals = operations_rows_to_signals(&value_range_rows(data, 0), Utc::now());
        signals.extend(task_rows_to_signals(&value_range_rows(data, 1)));
        info!(feed = "spreadsheet", found = signals.len(), "Spreadsheet signals found");
        Ok(signals)
    }
}

/// Feeds for every polled tool that has a real adapter.
pub fn configured_feeds(tools: &ToolSet, retry: &RetryPolicy, spreadsheet_id: &str) -> Vec<Arc<dyn SignalFeed>> {
    use crate::tools::action::ToolKind;

    let mut feeds: Vec<Arc<dyn SignalFeed>> = Vec::new();
    if tools.is_configured(ToolKind::Mail) {
        feeds.push(Arc::new(MailFeed::new(tools.clone(), retry.clone())));
    }
    if tools.is_configured(ToolKind::Spreadsheet) && !spreadsheet_id.is_empty() {
        feeds.push(Arc::new(SpreadsheetFeed::new(tools.clone(), retry.clone(), spreadsheet_id)));
    }
    feeds
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::Value;

    use super::*;
    use crate::error::AdapterErrorKind;
    use crate::tools::action::ToolKind;
    use crate::tools::adapter::{ToolAdapter, ToolResponse};

    /// Mail tool with two unread messages; the second cannot be fetched.
    struct FakeMail;

    #[async_trait]
    impl ToolAdapter for FakeMail {
        fn tool(&self) -> ToolKind {
            ToolKind::Mail
        }

        async fn execute(&self, action: ToolAction, params: &Value) -> Result<ToolResponse, AdapterError> {
            match action {
                ToolAction::SearchEmails => {
                    assert!(params["query"].as_str().unwrap().starts_with("is:unread after:"));
                    Ok(ToolResponse::new(json!({ "messages": [{ "id": "m1" }, { "id": "m2" }] })))
                }
                ToolAction::GetEmail if params["id"] == "m1" => Ok(ToolResponse::new(json!({
                    "id": "m1",
                    "payload": {
                        "headers": [{ "name": "Subject", "value": "Urgent: invoice" }],
                        "body": { "data": URL_SAFE_NO_PAD.encode("please pay") }
                    }
                }))),
                _ => Err(AdapterError::new(
                    ToolKind::Mail,
                    action,
                    AdapterErrorKind::Remote { status: Some(404) },
                    "not found",
                )),
            }
        }
    }

    struct FakeSheet;

    #[async_trait]
    impl ToolAdapter for FakeSheet {
        fn tool(&self) -> ToolKind {
            ToolKind::Spreadsheet
        }

        async fn execute(&self, _action: ToolAction, params: &Value) -> Result<ToolResponse, AdapterError> {
            assert_eq!(params["ranges"][1], "Tasks!A1:E50");
            Ok(ToolResponse::new(json!({
                "valueRanges": [
                    { "values": [["Task", "Owner", "Due", "Status"], ["Audit", "ann", "2000-01-01", "Open"]] },
                    { "values": [["Task", "Status", "Priority"], ["Deploy", "open", "high"]] }
                ]
            })))
        }
    }

    #[tokio::test]
    async fn mail_feed_skips_unfetchable_messages() {
        let tools = ToolSet::new().with_adapter(Arc::new(FakeMail));
        let feed = MailFeed::new(tools, RetryPolicy::immediate(1));
        let signals = feed.poll().await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, "urgent_email");
        assert_eq!(signals[0].content, "please pay");
    }

    #[tokio::test]
    async fn spreadsheet_feed_reads_both_sheets() {
        let tools = ToolSet::new().with_adapter(Arc::new(FakeSheet));
        let feed = SpreadsheetFeed::new(tools, RetryPolicy::immediate(1), "sheet-1");
        let signals = feed.poll().await.unwrap();
        let types: Vec<&str> = signals.iter().map(|s| s.signal_type.as_str()).collect();
        assert_eq!(types, vec!["deadline", "high_priority_task"]);
    }

    #[test]
    fn only_configured_tools_get_feeds() {
        assert!(configured_feeds(&ToolSet::new(), &RetryPolicy::default(), "sheet").is_empty());

        let tools = ToolSet::new()
            .with_adapter(Arc::new(FakeMail))
            .with_adapter(Arc::new(FakeSheet));
        assert_eq!(configured_feeds(&tools, &RetryPolicy::default(), "sheet").len(), 2);
        assert_eq!(configured_feeds(&tools, &RetryPolicy::default(), "").len(), 1);
    }
}
