//! `SignalStore` trait: the persistence boundary the engine writes through.
//!
//! Every call is atomic per signal and durable when it returns.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::signal::execution::{ExecutionRecord, ExecutionUpdate};
use crate::signal::model::{Signal, SignalSource, SignalStatus, SignalUpdate};

/// Default page size for signal listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Filter for [`SignalStore::list_signals`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalFilter {
    pub status: Option<SignalStatus>,
    pub source: Option<SignalSource>,
    /// `None` means [`DEFAULT_LIST_LIMIT`].
    pub limit: Option<usize>,
}

/// Aggregate counters over all stored signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub total_signals: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_source: BTreeMap<String, u64>,
    /// Mean priority score over signals past intake.
    pub average_priority: f64,
    pub high_priority_signals: u64,
    pub total_executions: u64,
    pub failed_executions: u64,
}

/// Backend-agnostic persistence for signals and their execution records.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Signals ─────────────────────────────────────────────────────

    /// Insert a new signal. Returns its id.
    async fn create_signal(&self, signal: &Signal) -> Result<Uuid, DatabaseError>;

    /// Apply a partial update. `NotFound` when the id is unknown.
    async fn update_signal(&self, id: Uuid, update: &SignalUpdate) -> Result<(), DatabaseError>;

    async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>, DatabaseError>;

    /// Signals newest first.
    async fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>, DatabaseError>;

    async fn stats(&self) -> Result<SignalStats, DatabaseError>;

    // ── Execution records ───────────────────────────────────────────

    /// Append a record to its signal's trail. Returns its id.
    async fn append_execution(&self, record: &ExecutionRecord) -> Result<Uuid, DatabaseError>;

    /// Write terminal fields onto a record. `NotFound` when the id is unknown.
    async fn update_execution(&self, id: Uuid, update: &ExecutionUpdate) -> Result<(), DatabaseError>;

    /// A signal's records in the order they were appended.
    async fn list_executions(&self, signal_id: Uuid) -> Result<Vec<ExecutionRecord>, DatabaseError>;
}
