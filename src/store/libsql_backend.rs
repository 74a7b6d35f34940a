//! libSQL backend: async `SignalStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text, metadata and payload echoes as JSON text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::signal::execution::{ExecutionRecord, ExecutionUpdate};
use crate::signal::model::{ArtifactLinks, Signal, SignalMetadata, SignalUpdate};
use crate::store::migrations;
use crate::store::traits::{DEFAULT_LIST_LIMIT, SignalFilter, SignalStats, SignalStore};

/// Score at or above which a signal counts as high priority in stats.
const HIGH_PRIORITY_SCORE: f64 = 7.0;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn opt_real(v: Option<f64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Real(v),
        None => libsql::Value::Null,
    }
}

fn opt_integer(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

/// Canonical write format: RFC 3339, UTC, fixed microsecond precision.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_datetime(v: Option<DateTime<Utc>>) -> libsql::Value {
    opt_text_owned(v.map(ts))
}

fn opt_json(v: &Option<serde_json::Value>) -> libsql::Value {
    opt_text_owned(v.as_ref().map(|v| v.to_string()))
}

fn parse_json(s: Option<String>) -> Option<serde_json::Value> {
    s.and_then(|s| serde_json::from_str(&s).ok())
}

fn query_err(op: &str) -> impl Fn(libsql::Error) -> DatabaseError + '_ {
    move |e| DatabaseError::Query(format!("{op}: {e}"))
}

const SIGNAL_COLUMNS: &str = "id, source, signal_type, subject, description, sender, metadata, \
    priority_score, ai_summary, ai_reasoning, recommended_action, assigned_to, \
    task_item_id, doc_id, chat_message_id, status, retries, error_message, \
    detected_at, processed_at, completed_at";

const EXECUTION_COLUMNS: &str = "id, signal_id, tool, action, status, request_data, response_data, \
    error_message, simulated, attempts, started_at, completed_at, duration_ms";

/// Map a libsql Row (in SIGNAL_COLUMNS order) to a Signal.
fn row_to_signal(row: &libsql::Row) -> Result<Signal, DatabaseError> {
    let err = query_err("row_to_signal");
    let id: String = row.get(0).map_err(&err)?;
    let source: String = row.get(1).map_err(&err)?;
    let metadata: String = row.get(6).map_err(&err)?;
    let status: String = row.get(15).map_err(&err)?;
    let detected_at: String = row.get(18).map_err(&err)?;

    Ok(Signal {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        source: source
            .parse()
            .map_err(|e| DatabaseError::Serialization(format!("{e}")))?,
        signal_type: row.get(2).map_err(&err)?,
        subject: row.get(3).map_err(&err)?,
        description: row.get(4).map_err(&err)?,
        sender: row.get(5).map_err(&err)?,
        metadata: serde_json::from_str::<SignalMetadata>(&metadata).unwrap_or_default(),
        priority_score: row.get(7).map_err(&err)?,
        ai_summary: row.get::<String>(8).ok(),
        ai_reasoning: row.get::<String>(9).ok(),
        recommended_action: row.get::<String>(10).ok(),
        assigned_to: row.get::<String>(11).ok(),
        artifacts: ArtifactLinks {
            task_item_id: row.get::<String>(12).ok(),
            doc_id: row.get::<String>(13).ok(),
            chat_message_id: row.get::<String>(14).ok(),
        },
        status: status.parse().map_err(DatabaseError::Serialization)?,
        retries: row.get::<i64>(16).map_err(&err)?.max(0) as u32,
        error_message: row.get::<String>(17).ok(),
        detected_at: parse_datetime(&detected_at),
        processed_at: parse_optional_datetime(&row.get::<String>(19).ok()),
        completed_at: parse_optional_datetime(&row.get::<String>(20).ok()),
    })
}

/// Map a libsql Row (in EXECUTION_COLUMNS order) to an ExecutionRecord.
fn row_to_execution(row: &libsql::Row) -> Result<ExecutionRecord, DatabaseError> {
    let err = query_err("row_to_execution");
    let id: String = row.get(0).map_err(&err)?;
    let signal_id: String = row.get(1).map_err(&err)?;
    let status: String = row.get(4).map_err(&err)?;
    let started_at: String = row.get(10).map_err(&err)?;
    let parse_uuid = |s: &str| Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(e.to_string()));

    Ok(ExecutionRecord {
        id: parse_uuid(&id)?,
        signal_id: parse_uuid(&signal_id)?,
        tool: row.get(2).map_err(&err)?,
        action: row.get(3).map_err(&err)?,
        status: status.parse().map_err(DatabaseError::Serialization)?,
        request_data: parse_json(row.get::<String>(5).ok()),
        response_data: parse_json(row.get::<String>(6).ok()),
        error_message: row.get::<String>(7).ok(),
        simulated: row.get::<i64>(8).map_err(&err)? != 0,
        attempts: row.get::<i64>(9).map_err(&err)?.max(0) as u32,
        started_at: parse_datetime(&started_at),
        completed_at: parse_optional_datetime(&row.get::<String>(11).ok()),
        duration_ms: row.get::<i64>(12).ok(),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl SignalStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Signals ─────────────────────────────────────────────────────

    async fn create_signal(&self, signal: &Signal) -> Result<Uuid, DatabaseError> {
        let metadata = serde_json::to_string(&signal.metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO signals ({SIGNAL_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
                ),
                params![
                    signal.id.to_string(),
                    signal.source.as_str(),
                    signal.signal_type.clone(),
                    signal.subject.clone(),
                    signal.description.clone(),
                    signal.sender.clone(),
                    metadata,
                    signal.priority_score,
                    opt_text_owned(signal.ai_summary.clone()),
                    opt_text_owned(signal.ai_reasoning.clone()),
                    opt_text_owned(signal.recommended_action.clone()),
                    opt_text_owned(signal.assigned_to.clone()),
                    opt_text_owned(signal.artifacts.task_item_id.clone()),
                    opt_text_owned(signal.artifacts.doc_id.clone()),
                    opt_text_owned(signal.artifacts.chat_message_id.clone()),
                    signal.status.as_str(),
                    i64::from(signal.retries),
                    opt_text_owned(signal.error_message.clone()),
                    ts(signal.detected_at),
                    opt_datetime(signal.processed_at),
                    opt_datetime(signal.completed_at),
                ],
            )
            .await
            .map_err(query_err("create_signal"))?;

        debug!(signal_id = %signal.id, source = %signal.source, "Signal inserted into DB");
        Ok(signal.id)
    }

    async fn update_signal(&self, id: Uuid, update: &SignalUpdate) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE signals SET
                    status = COALESCE(?2, status),
                    priority_score = COALESCE(?3, priority_score),
                    ai_summary = COALESCE(?4, ai_summary),
                    ai_reasoning = COALESCE(?5, ai_reasoning),
                    recommended_action = COALESCE(?6, recommended_action),
                    assigned_to = COALESCE(?7, assigned_to),
                    task_item_id = COALESCE(?8, task_item_id),
                    doc_id = COALESCE(?9, doc_id),
                    chat_message_id = COALESCE(?10, chat_message_id),
                    retries = COALESCE(?11, retries),
                    error_message = COALESCE(?12, error_message),
                    processed_at = COALESCE(?13, processed_at),
                    completed_at = COALESCE(?14, completed_at)
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    opt_text_owned(update.status.map(|s| s.as_str().to_string())),
                    opt_real(update.priority_score),
                    opt_text_owned(update.ai_summary.clone()),
                    opt_text_owned(update.ai_reasoning.clone()),
                    opt_text_owned(update.recommended_action.clone()),
                    opt_text_owned(update.assigned_to.clone()),
                    opt_text_owned(update.task_item_id.clone()),
                    opt_text_owned(update.doc_id.clone()),
                    opt_text_owned(update.chat_message_id.clone()),
                    opt_integer(update.retries.map(i64::from)),
                    opt_text_owned(update.error_message.clone()),
                    opt_datetime(update.processed_at),
                    opt_datetime(update.completed_at),
                ],
            )
            .await
            .map_err(query_err("update_signal"))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "signal".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SIGNAL_COLUMNS} FROM signals WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err("get_signal"))?;

        match rows.next().await.map_err(query_err("get_signal"))? {
            Some(row) => Ok(Some(row_to_signal(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>, DatabaseError> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT) as i64;
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SIGNAL_COLUMNS} FROM signals
                     WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR source = ?2)
                     ORDER BY detected_at DESC, rowid DESC
                     LIMIT ?3"
                ),
                params![
                    opt_text_owned(filter.status.map(|s| s.as_str().to_string())),
                    opt_text_owned(filter.source.map(|s| s.as_str().to_string())),
                    limit,
                ],
            )
            .await
            .map_err(query_err("list_signals"))?;

        let mut signals = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err("list_signals"))? {
            signals.push(row_to_signal(&row)?);
        }
        Ok(signals)
    }

    async fn stats(&self) -> Result<SignalStats, DatabaseError> {
        let conn = self.conn();
        let mut stats = SignalStats::default();

        let mut rows = conn
            .query("SELECT status, COUNT(*) FROM signals GROUP BY status", ())
            .await
            .map_err(query_err("stats"))?;
        while let Some(row) = rows.next().await.map_err(query_err("stats"))? {
            let status: String = row.get(0).map_err(query_err("stats"))?;
            let count: i64 = row.get(1).map_err(query_err("stats"))?;
            stats.total_signals += count as u64;
            stats.by_status.insert(status, count as u64);
        }

        let mut rows = conn
            .query("SELECT source, COUNT(*) FROM signals GROUP BY source", ())
            .await
            .map_err(query_err("stats"))?;
        while let Some(row) = rows.next().await.map_err(query_err("stats"))? {
            let source: String = row.get(0).map_err(query_err("stats"))?;
            let count: i64 = row.get(1).map_err(query_err("stats"))?;
            stats.by_source.insert(source, count as u64);
        }

        let mut rows = conn
            .query(
                "SELECT COALESCE(AVG(priority_score), 0.0),
                        COALESCE(SUM(CASE WHEN priority_score >= ?1 THEN 1 ELSE 0 END), 0)
                 FROM signals WHERE status != 'pending'",
                params![HIGH_PRIORITY_SCORE],
            )
            .await
            .map_err(query_err("stats"))?;
        if let Some(row) = rows.next().await.map_err(query_err("stats"))? {
            stats.average_priority = row.get::<f64>(0).unwrap_or(0.0);
            stats.high_priority_signals = row.get::<i64>(1).unwrap_or(0) as u64;
        }

        let mut rows = conn
            .query(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
                 FROM execution_records",
                (),
            )
            .await
            .map_err(query_err("stats"))?;
        if let Some(row) = rows.next().await.map_err(query_err("stats"))? {
            stats.total_executions = row.get::<i64>(0).unwrap_or(0) as u64;
            stats.failed_executions = row.get::<i64>(1).unwrap_or(0) as u64;
        }

        Ok(stats)
    }

    // ── Execution records ───────────────────────────────────────────

    async fn append_execution(&self, record: &ExecutionRecord) -> Result<Uuid, DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO execution_records (seq, {EXECUTION_COLUMNS}) VALUES (
                        (SELECT COALESCE(MAX(seq), 0) + 1 FROM execution_records WHERE signal_id = ?2),
                        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    record.id.to_string(),
                    record.signal_id.to_string(),
                    record.tool.clone(),
                    record.action.clone(),
                    record.status.as_str(),
                    opt_json(&record.request_data),
                    opt_json(&record.response_data),
                    opt_text_owned(record.error_message.clone()),
                    i64::from(record.simulated),
                    i64::from(record.attempts),
                    ts(record.started_at),
                    opt_datetime(record.completed_at),
                    opt_integer(record.duration_ms),
                ],
            )
            .await
            .map_err(query_err("append_execution"))?;

        debug!(
            execution_id = %record.id,
            signal_id = %record.signal_id,
            tool = %record.tool,
            "Execution record appended"
        );
        Ok(record.id)
    }

    async fn update_execution(
        &self,
        id: Uuid,
        update: &ExecutionUpdate,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE execution_records SET
                    status = ?2,
                    response_data = ?3,
                    error_message = ?4,
                    simulated = ?5,
                    attempts = ?6,
                    completed_at = ?7,
                    duration_ms = ?8
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.status.as_str(),
                    opt_json(&update.response_data),
                    opt_text_owned(update.error_message.clone()),
                    i64::from(update.simulated),
                    i64::from(update.attempts),
                    ts(update.completed_at),
                    update.duration_ms,
                ],
            )
            .await
            .map_err(query_err("update_execution"))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "execution_record".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_executions(&self, signal_id: Uuid) -> Result<Vec<ExecutionRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EXECUTION_COLUMNS} FROM execution_records
                     WHERE signal_id = ?1 ORDER BY seq ASC"
                ),
                params![signal_id.to_string()],
            )
            .await
            .map_err(query_err("list_executions"))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err("list_executions"))? {
            records.push(row_to_execution(&row)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::execution::ExecutionStatus;
    use crate::signal::model::{RawSignal, SignalSource, SignalStatus};
    use crate::tools::action::ToolAction;

    fn sample_signal(subject: &str) -> Signal {
        Signal::from_intake(
            &RawSignal::new("gmail", "customer_complaint", subject, "Body text")
                .with_sender("alice@example.com")
                .with_metadata(serde_json::json!({"complaint_count": 3})),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_and_get_signal_round_trips_fields() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let signal = sample_signal("Order late");
        let id = db.create_signal(&signal).await.unwrap();
        assert_eq!(id, signal.id);

        let loaded = db.get_signal(id).await.unwrap().unwrap();
        assert_eq!(loaded.subject, "Order late");
        assert_eq!(loaded.source, SignalSource::Mail);
        assert_eq!(loaded.status, SignalStatus::Pending);
        assert_eq!(loaded.metadata.number("complaint_count"), Some(3.0));
        assert!(loaded.ai_summary.is_none());
        assert_eq!(
            loaded.detected_at.timestamp_millis(),
            signal.detected_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn migrations_can_run_on_a_spawned_task() {
        let db: Arc<dyn SignalStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let task = tokio::spawn(async move { db.run_migrations().await });
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn get_unknown_signal_is_none() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.get_signal(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_signal_only_overwrites_set_fields() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let signal = sample_signal("Order late");
        db.create_signal(&signal).await.unwrap();

        db.update_signal(
            signal.id,
            &SignalUpdate {
                status: Some(SignalStatus::Processing),
                priority_score: Some(8.0),
                ai_summary: Some("HIGH PRIORITY: order late".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        db.update_signal(
            signal.id,
            &SignalUpdate {
                task_item_id: Some("card-1".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let loaded = db.get_signal(signal.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SignalStatus::Processing);
        assert_eq!(loaded.priority_score, 8.0);
        assert_eq!(loaded.ai_summary.as_deref(), Some("HIGH PRIORITY: order late"));
        assert_eq!(loaded.artifacts.task_item_id.as_deref(), Some("card-1"));
        assert!(loaded.artifacts.doc_id.is_none());
    }

    #[tokio::test]
    async fn update_unknown_signal_is_not_found() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let err = db
            .update_signal(Uuid::new_v4(), &SignalUpdate::status(SignalStatus::Failed))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn executions_keep_append_order() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let signal = sample_signal("Order late");
        db.create_signal(&signal).await.unwrap();

        let actions = [
            ToolAction::CreateCard,
            ToolAction::CreatePage,
            ToolAction::SendMessage,
        ];
        for action in actions {
            let mut rec = ExecutionRecord::start(signal.id, action, serde_json::json!({"a": 1}));
            db.append_execution(&rec).await.unwrap();
            let update = rec.succeed(serde_json::json!({"id": "x"}), true, 1);
            db.update_execution(rec.id, &update).await.unwrap();
        }

        let records = db.list_executions(signal.id).await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(names, vec!["create_card", "create_page", "send_message"]);
        assert!(records.iter().all(|r| r.status == ExecutionStatus::Success));
        assert!(records.iter().all(|r| r.simulated && r.duration_ms.is_some()));
        assert_eq!(records[0].request_data, Some(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn list_signals_filters_and_limits() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        for i in 0..3 {
            db.create_signal(&sample_signal(&format!("s{i}"))).await.unwrap();
        }
        let manual = Signal::from_intake(&RawSignal::new("manual", "t", "m", "c")).unwrap();
        db.create_signal(&manual).await.unwrap();
        db.update_signal(manual.id, &SignalUpdate::status(SignalStatus::Processing))
            .await
            .unwrap();

        let all = db.list_signals(&SignalFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);

        let mail = db
            .list_signals(&SignalFilter {
                source: Some(SignalSource::Mail),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mail.len(), 2);

        let processing = db
            .list_signals(&SignalFilter {
                status: Some(SignalStatus::Processing),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, manual.id);
    }

    #[tokio::test]
    async fn stats_count_by_status_and_source() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let a = sample_signal("a");
        let b = Signal::from_intake(&RawSignal::new("slack", "slack_message", "b", "c")).unwrap();
        db.create_signal(&a).await.unwrap();
        db.create_signal(&b).await.unwrap();
        db.update_signal(
            a.id,
            &SignalUpdate {
                status: Some(SignalStatus::Completed),
                priority_score: Some(9.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total_signals, 2);
        assert_eq!(stats.by_status.get("completed"), Some(&1));
        assert_eq!(stats.by_status.get("pending"), Some(&1));
        assert_eq!(stats.by_source.get("chat"), Some(&1));
        assert_eq!(stats.average_priority, 9.0);
        assert_eq!(stats.high_priority_signals, 1);
        assert_eq!(stats.total_executions, 0);
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ops.db");
        let signal = sample_signal("persisted");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.create_signal(&signal).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.get_signal(signal.id).await.unwrap().is_some());
    }
}
