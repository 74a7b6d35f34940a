//! HTTP surface: health, intake, signal queries, statistics, chat webhook.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, Error};
use crate::orchestrator::OrchestrationEngine;
use crate::signal::execution::ExecutionRecord;
use crate::signal::model::{IntakeResponse, RawSignal, Signal, SignalSource, SignalStatus};
use crate::sources::chat_event_to_signal;
use crate::store::traits::{SignalFilter, SignalStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state for the API routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrchestrationEngine>,
    pub store: Arc<dyn SignalStore>,
}

impl AppState {
    pub fn new(engine: Arc<OrchestrationEngine>) -> Self {
        let store = engine.store();
        Self { engine, store }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }
        error_response(status, self.to_string())
    }
}

// ── Health ──────────────────────────────────────────────────────────

fn health_body(status: &str) -> Json<Value> {
    Json(json!({
        "status": status,
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION,
    }))
}

/// GET /
async fn root() -> impl IntoResponse {
    health_body("operational")
}

/// GET /health
async fn health() -> impl IntoResponse {
    health_body("healthy")
}

// ── Signals ─────────────────────────────────────────────────────────

/// POST /api/signals
///
/// Processes the signal synchronously and returns the pipeline result.
async fn create_signal(
    State(state): State<AppState>,
    Json(raw): Json<RawSignal>,
) -> Result<Json<IntakeResponse>, Error> {
    info!(source = %raw.source, signal_type = %raw.signal_type, "Signal submitted via API");
    Ok(Json(state.engine.intake(raw).await?))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    status: Option<String>,
    source: Option<String>,
}

fn signal_summary(s: &Signal) -> Value {
    json!({
        "signal_id": s.id,
        "source": s.source,
        "type": s.signal_type,
        "priority_score": s.priority_score,
        "status": s.status,
        "subject": s.subject,
        "summary": s.ai_summary,
        "assigned_to": s.assigned_to,
        "detected_at": s.detected_at.to_rfc3339(),
        "task_item_id": s.artifacts.task_item_id,
        "doc_id": s.artifacts.doc_id,
    })
}

/// GET /api/signals?limit&status&source
async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, Error> {
    let status = match params.status.as_deref().map(str::parse::<SignalStatus>).transpose() {
        Ok(s) => s,
        Err(e) => return Ok(error_response(StatusCode::BAD_REQUEST, e)),
    };
    let source = match params.source.as_deref().map(str::parse::<SignalSource>).transpose() {
        Ok(s) => s,
        Err(e) => return Ok(error_response(StatusCode::BAD_REQUEST, e.to_string())),
    };
    let filter = SignalFilter {
        status,
        source,
        limit: params.limit,
    };

    let signals = state.store.list_signals(&filter).await?;
    Ok(Json(signals.iter().map(signal_summary).collect::<Vec<_>>()).into_response())
}

fn execution_summary(e: &ExecutionRecord) -> Value {
    json!({
        "id": e.id,
        "tool": e.tool,
        "action": e.action,
        "status": e.status,
        "attempts": e.attempts,
        "simulated": e.simulated,
        "error_message": e.error_message,
        "started_at": e.started_at.to_rfc3339(),
        "completed_at": e.completed_at.map(|t| t.to_rfc3339()),
        "duration_ms": e.duration_ms,
    })
}

/// GET /api/signals/{id}
async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Error> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(error_response(StatusCode::BAD_REQUEST, format!("Invalid signal id: {id}")));
    };

    let Some(signal) = state.store.get_signal(id).await? else {
        return Ok(error_response(StatusCode::NOT_FOUND, "Signal not found"));
    };
    let executions = state.store.list_executions(id).await?;

    Ok(Json(json!({
        "signal_id": signal.id,
        "source": signal.source,
        "type": signal.signal_type,
        "priority_score": signal.priority_score,
        "status": signal.status,
        "subject": signal.subject,
        "description": signal.description,
        "sender": signal.sender,
        "metadata": signal.metadata,
        "ai_summary": signal.ai_summary,
        "ai_reasoning": signal.ai_reasoning,
        "recommended_action": signal.recommended_action,
        "assigned_to": signal.assigned_to,
        "task_item_id": signal.artifacts.task_item_id,
        "doc_id": signal.artifacts.doc_id,
        "chat_message_id": signal.artifacts.chat_message_id,
        "retries": signal.retries,
        "error_message": signal.error_message,
        "detected_at": signal.detected_at.to_rfc3339(),
        "processed_at": signal.processed_at.map(|t| t.to_rfc3339()),
        "completed_at": signal.completed_at.map(|t| t.to_rfc3339()),
        "task_executions": executions.iter().map(execution_summary).collect::<Vec<_>>(),
    }))
    .into_response())
}

/// GET /api/stats
async fn stats(State(state): State<AppState>) -> Result<Json<Value>, Error> {
    let stats = state.store.stats().await?;
    let mut body = serde_json::to_value(&stats)
        .map_err(|e| DatabaseError::Serialization(format!("stats: {e}")))?;
    if let Some(map) = body.as_object_mut() {
        map.insert("priority_threshold".into(), json!(state.engine.priority_threshold()));
        map.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
    }
    Ok(Json(body))
}

/// Demo complaint used by the test-signal endpoint.
pub fn demo_signal() -> RawSignal {
    RawSignal::new(
        "manual",
        "customer_complaint",
        "Test: Customer unhappy with delivery delay",
        "Dear Support,\n\n\
         I am extremely disappointed with the service. My order #12345 was supposed \
         to arrive 3 days ago but I still haven't received it. This is unacceptable.\n\
         I need this resolved immediately or I want a full refund.\n\n\
         This is my third complaint about this issue and nobody has responded properly.\n\n\
         Regards,\nFrustrated Customer",
    )
    .with_sender("customer@example.com")
    .with_metadata(json!({
        "order_id": "12345",
        "delay_days": 3,
        "complaint_count": 3,
    }))
}

/// POST /api/test-signal
async fn test_signal(State(state): State<AppState>) -> Result<Json<Value>, Error> {
    let result = state.engine.intake(demo_signal()).await?;
    Ok(Json(json!({
        "message": "Test signal created and processed",
        "result": result,
    })))
}

// ── Webhooks ────────────────────────────────────────────────────────

/// POST /webhooks/slack
///
/// Answers URL verification challenges; `message` events are processed as
/// chat signals, everything else is acknowledged and ignored.
async fn chat_webhook(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    if payload["type"] == "url_verification" {
        return Json(json!({ "challenge": payload["challenge"] })).into_response();
    }

    let Some(raw) = chat_event_to_signal(&payload) else {
        return Json(json!({ "status": "ignored" })).into_response();
    };
    info!("Chat message received via webhook");

    match state.engine.intake(raw).await {
        Ok(result) => Json(json!({ "status": "ok", "signal_id": result.signal_id })).into_response(),
        Err(e) => {
            warn!(error = %e, "Chat webhook signal rejected");
            Json(json!({ "status": "error", "message": e.to_string() })).into_response()
        }
    }
}

/// Build the full API router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/signals", post(create_signal).get(list_signals))
        .route("/api/signals/{id}", get(get_signal))
        .route("/api/stats", get(stats))
        .route("/api/test-signal", post(test_signal))
        .route("/webhooks/slack", post(chat_webhook))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
