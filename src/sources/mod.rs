//! Signal sources: pure converters from source-native data, and the feeds
//! that poll them.

pub mod chat;
pub mod feeds;
pub mod mail;
pub mod spreadsheet;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::signal::model::RawSignal;

pub use chat::chat_event_to_signal;
pub use feeds::{MailFeed, SpreadsheetFeed, configured_feeds};
pub use mail::{classify_email, email_to_signal};
pub use spreadsheet::{operations_rows_to_signals, task_rows_to_signals};

/// A pollable source of raw signals.
#[async_trait]
pub trait SignalFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Everything new since the last poll.
    async fn poll(&self) -> Result<Vec<RawSignal>, AdapterError>;
}
