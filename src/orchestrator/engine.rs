//! Per-signal orchestration: intake → score → gate → fan-out → aggregate → finalize.
//!
//! One signal is processed start to finish before the next. Fan-out steps
//! run sequentially so each step sees the artifacts of the ones before it
//! and the execution trail is a causal log.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{OpsConfig, ToolTargets};
use crate::error::{EngineError, ValidationError};
use crate::orchestrator::fanout::{
    FANOUT_STEPS, FanoutStep, artifact_update, assign_owner, build_params,
};
use crate::scoring::scorer::{MAX_SCORE, PriorityScorer, ScoreOutcome};
use crate::signal::execution::ExecutionRecord;
use crate::signal::model::{
    IntakeResponse, IntakeStatus, RawSignal, Signal, SignalStatus, SignalUpdate, StepSummary,
};
use crate::store::traits::SignalStore;
use crate::tools::action::ToolAction;
use crate::tools::retry::RetryPolicy;
use crate::tools::toolset::ToolSet;

const MSG_LOW_PRIORITY: &str = "Signal below priority threshold";
const MSG_COMPLETED: &str = "Signal processed and orchestrated";
const MSG_PARTIAL: &str = "Signal processed with failed actions";
const MSG_FATAL: &str = "Signal processing failed";

/// Drives signals through scoring and the ordered tool fan-out.
pub struct OrchestrationEngine {
    scorer: Arc<dyn PriorityScorer>,
    tools: ToolSet,
    retry: RetryPolicy,
    store: Arc<dyn SignalStore>,
    targets: ToolTargets,
    priority_threshold: u8,
    shutdown: Arc<AtomicBool>,
}

/// Outcome of the fan-out phase for one signal.
struct FanoutOutcome {
    steps: Vec<StepSummary>,
    cancelled_before: Option<ToolAction>,
}

impl FanoutOutcome {
    /// AND over the three side-effecting steps. Unstarted steps count as failed.
    fn succeeded(&self) -> bool {
        self.steps.len() == FANOUT_STEPS.len() && self.steps.iter().all(|s| s.success)
    }

    fn error_message(&self) -> Option<String> {
        if let Some(action) = self.cancelled_before {
            return Some(format!("Processing cancelled before {action}"));
        }
        let failed: Vec<String> = self
            .steps
            .iter()
            .filter_map(|s| s.error.as_ref().map(|e| format!("{}: {e}", s.action)))
            .collect();
        (!failed.is_empty()).then(|| failed.join("; "))
    }
}

impl OrchestrationEngine {
    pub fn new(
        scorer: Arc<dyn PriorityScorer>,
        tools: ToolSet,
        retry: RetryPolicy,
        store: Arc<dyn SignalStore>,
        targets: ToolTargets,
        priority_threshold: u8,
    ) -> Self {
        Self {
            scorer,
            tools,
            retry,
            store,
            targets,
            priority_threshold,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire an engine from configuration.
    pub fn from_config(
        config: &OpsConfig,
        scorer: Arc<dyn PriorityScorer>,
        tools: ToolSet,
        store: Arc<dyn SignalStore>,
    ) -> Self {
        Self::new(
            scorer,
            tools,
            config.retry.clone(),
            store,
            config.targets.clone(),
            config.priority_threshold,
        )
    }

    /// Share a shutdown flag. Once set, no new fan-out step or signal starts.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn store(&self) -> Arc<dyn SignalStore> {
        Arc::clone(&self.store)
    }

    pub fn priority_threshold(&self) -> u8 {
        self.priority_threshold
    }

    /// The flag this engine observes between steps and signals.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    // ── Entry points ────────────────────────────────────────────────

    /// Validate and fully process one raw signal.
    ///
    /// Only validation errors are returned as `Err`; every signal that
    /// passes validation ends in a terminal status reported in the response.
    pub async fn intake(&self, raw: RawSignal) -> Result<IntakeResponse, ValidationError> {
        let mut signal = Signal::from_intake(&raw)?;
        info!(
            signal_id = %signal.id,
            source = %signal.source,
            signal_type = %signal.signal_type,
            "Signal received"
        );

        match self.process(&mut signal).await {
            Ok(response) => Ok(response),
            Err(e) => Ok(self.fail_fatally(&mut signal, e).await),
        }
    }

    /// Process signals one after another. A failure never stops the batch;
    /// cancellation stops it between signals.
    pub async fn process_batch(
        &self,
        raws: Vec<RawSignal>,
    ) -> Vec<Result<IntakeResponse, ValidationError>> {
        let total = raws.len();
        let mut results = Vec::with_capacity(total);
        for raw in raws {
            if self.is_cancelled() {
                warn!(
                    processed = results.len(),
                    skipped = total - results.len(),
                    "Shutdown requested, stopping batch"
                );
                break;
            }
            let result = self.intake(raw).await;
            if let Err(ref e) = result {
                warn!(error = %e, "Rejected signal in batch");
            }
            results.push(result);
        }
        results
    }

    // ── Pipeline ────────────────────────────────────────────────────

    async fn process(&self, signal: &mut Signal) -> Result<IntakeResponse, EngineError> {
        self.store.create_signal(signal).await?;

        let outcome = self.score(signal).await;
        info!(
            signal_id = %signal.id,
            score = outcome.score,
            reasoning = %outcome.reasoning,
            "Signal scored"
        );
        self.transition(
            signal,
            SignalStatus::Processing,
            SignalUpdate {
                priority_score: Some(outcome.score),
                ai_summary: Some(outcome.summary.clone()),
                ai_reasoning: Some(outcome.reasoning.clone()),
                recommended_action: Some(outcome.recommended_action.clone()),
                ..Default::default()
            },
        )
        .await?;

        if outcome.score < f64::from(self.priority_threshold) {
            info!(
                signal_id = %signal.id,
                score = outcome.score,
                threshold = self.priority_threshold,
                "Below threshold, skipping fan-out"
            );
            let now = Utc::now();
            self.transition(
                signal,
                SignalStatus::Completed,
                SignalUpdate {
                    processed_at: Some(now),
                    completed_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;
            return Ok(IntakeResponse {
                signal_id: signal.id,
                status: IntakeStatus::LowPriority,
                priority_score: outcome.score,
                message: MSG_LOW_PRIORITY.into(),
                summary: Some(outcome.summary),
                error: None,
                steps: Vec::new(),
            });
        }

        let fanout = self.fan_out(signal).await?;

        if fanout.cancelled_before.is_none() {
            self.assign(signal).await?;
        }

        let success = fanout.succeeded();
        let error = fanout.error_message();
        info!(
            signal_id = %signal.id,
            success,
            steps = fanout.steps.len(),
            "Fan-out aggregated"
        );

        let now = Utc::now();
        let (status, intake_status, message) = if success {
            (SignalStatus::Completed, IntakeStatus::Completed, MSG_COMPLETED)
        } else {
            (SignalStatus::Failed, IntakeStatus::Failed, MSG_PARTIAL)
        };
        self.transition(
            signal,
            status,
            SignalUpdate {
                error_message: error.clone(),
                processed_at: Some(now),
                completed_at: Some(now),
                ..Default::default()
            },
        )
        .await?;
        info!(signal_id = %signal.id, status = %status, "Signal finalized");

        Ok(IntakeResponse {
            signal_id: signal.id,
            status: intake_status,
            priority_score: signal.priority_score,
            message: message.into(),
            summary: signal.ai_summary.clone(),
            error,
            steps: fanout.steps,
        })
    }

    /// Run the scorer on the blocking pool; any error or panic yields the
    /// neutral fallback.
    async fn score(&self, signal: &Signal) -> ScoreOutcome {
        let scorer = Arc::clone(&self.scorer);
        let snapshot = signal.clone();
        let name = scorer.name().to_string();

        match tokio::task::spawn_blocking(move || scorer.score(&snapshot)).await {
            Ok(Ok(outcome)) if outcome.score.is_finite() => ScoreOutcome {
                score: outcome.score.clamp(0.0, MAX_SCORE),
                ..outcome
            },
            Ok(Ok(outcome)) => {
                warn!(signal_id = %signal.id, scorer = %name, score = outcome.score, "Scorer returned a non-finite score, using fallback");
                ScoreOutcome::fallback()
            }
            Ok(Err(e)) => {
                warn!(signal_id = %signal.id, scorer = %name, error = %e, "Scoring failed, using fallback");
                ScoreOutcome::fallback()
            }
            Err(e) => {
                warn!(signal_id = %signal.id, scorer = %name, error = %e, "Scorer task aborted, using fallback");
                ScoreOutcome::fallback()
            }
        }
    }

    async fn fan_out(&self, signal: &mut Signal) -> Result<FanoutOutcome, EngineError> {
        let mut steps = Vec::with_capacity(FANOUT_STEPS.len());
        for step in FANOUT_STEPS {
            let action = step.action();
            if self.is_cancelled() {
                warn!(signal_id = %signal.id, next = %action, "Shutdown observed, not starting further steps");
                return Ok(FanoutOutcome {
                    steps,
                    cancelled_before: Some(action),
                });
            }
            steps.push(self.run_step(signal, step).await?);
        }
        Ok(FanoutOutcome {
            steps,
            cancelled_before: None,
        })
    }

    /// One fan-out step: append a record, call the tool under the retry
    /// policy, close the record, persist the artifact id on success.
    async fn run_step(
        &self,
        signal: &mut Signal,
        step: FanoutStep,
    ) -> Result<StepSummary, EngineError> {
        let action = step.action();
        let params = build_params(step, signal, &self.targets);
        let mut record = ExecutionRecord::start(signal.id, action, params.clone());
        self.store.append_execution(&record).await?;
        info!(signal_id = %signal.id, tool = %action.tool(), action = %action, "Step started");

        let (update, summary, artifact) = match self.tools.call(&self.retry, action, &params).await {
            Ok(retried) => {
                let artifact = retried.value.artifact_id(action.artifact_key());
                let update = record.succeed(
                    retried.value.data.clone(),
                    retried.value.simulated,
                    retried.attempts,
                );
                let summary = StepSummary {
                    tool: action.tool().name().into(),
                    action: action.name().into(),
                    success: true,
                    artifact_id: artifact.clone(),
                    error: None,
                    simulated: retried.value.simulated,
                };
                (update, summary, artifact)
            }
            Err(exhausted) => {
                let message = exhausted.last.to_string();
                error!(
                    signal_id = %signal.id,
                    action = %action,
                    attempts = exhausted.attempts,
                    error = %message,
                    "Step failed"
                );
                let update = record.fail(message.clone(), exhausted.attempts);
                let summary = StepSummary {
                    tool: action.tool().name().into(),
                    action: action.name().into(),
                    success: false,
                    artifact_id: None,
                    error: Some(message),
                    simulated: false,
                };
                (update, summary, None)
            }
        };

        self.store.update_execution(record.id, &update).await?;
        info!(
            signal_id = %signal.id,
            action = %action,
            success = summary.success,
            simulated = summary.simulated,
            duration_ms = update.duration_ms,
            "Step finished"
        );

        if let Some(id) = artifact {
            let patch = artifact_update(step, id);
            self.store.update_signal(signal.id, &patch).await?;
            signal.apply(&patch);
        }
        Ok(summary)
    }

    /// Static owner lookup. No external call.
    async fn assign(&self, signal: &mut Signal) -> Result<(), EngineError> {
        let owner = assign_owner(&signal.signal_type);
        let patch = SignalUpdate {
            assigned_to: Some(owner.to_string()),
            ..Default::default()
        };
        self.store.update_signal(signal.id, &patch).await?;
        signal.apply(&patch);
        info!(signal_id = %signal.id, assigned_to = owner, "Signal assigned");
        Ok(())
    }

    /// Persist a status change after checking it is a legal forward move.
    async fn transition(
        &self,
        signal: &mut Signal,
        next: SignalStatus,
        mut update: SignalUpdate,
    ) -> Result<(), EngineError> {
        if !signal.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                id: signal.id,
                from: signal.status.to_string(),
                to: next.to_string(),
            });
        }
        update.status = Some(next);
        self.store.update_signal(signal.id, &update).await?;
        signal.apply(&update);
        debug!(signal_id = %signal.id, status = %next, "Signal status updated");
        Ok(())
    }

    /// Abort handling: mark failed, bump retries, record the message.
    async fn fail_fatally(&self, signal: &mut Signal, err: EngineError) -> IntakeResponse {
        let message = err.to_string();
        error!(signal_id = %signal.id, error = %message, "Signal processing aborted");

        let update = SignalUpdate {
            status: Some(SignalStatus::Failed),
            retries: Some(signal.retries + 1),
            error_message: Some(message.clone()),
            ..Default::default()
        };
        if signal.status.can_transition_to(SignalStatus::Failed) {
            match self.store.update_signal(signal.id, &update).await {
                Ok(()) => signal.apply(&update),
                Err(e) => error!(signal_id = %signal.id, error = %e, "Failed to record signal failure"),
            }
        }

        IntakeResponse {
            signal_id: signal.id,
            status: IntakeStatus::Failed,
            priority_score: signal.priority_score,
            message: MSG_FATAL.into(),
            summary: signal.ai_summary.clone(),
            error: Some(message),
            steps: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::error::{AdapterError, AdapterErrorKind, DatabaseError, ScoringError};
    use crate::scoring::scorer::RuleScorer;
    use crate::signal::execution::{ExecutionStatus, ExecutionUpdate};
    use crate::store::LibSqlBackend;
    use crate::store::traits::{SignalFilter, SignalStats};
    use crate::tools::action::ToolKind;
    use crate::tools::adapter::{ToolAdapter, ToolResponse};

    /// Adapter that fails its first `fail_first` calls, then answers with an id.
    struct ScriptedAdapter {
        tool: ToolKind,
        fail_first: u32,
        calls: AtomicU32,
        log: Arc<Mutex<Vec<ToolAction>>>,
    }

    impl ScriptedAdapter {
        fn new(tool: ToolKind, fail_first: u32, log: Arc<Mutex<Vec<ToolAction>>>) -> Arc<Self> {
            Arc::new(Self {
                tool,
                fail_first,
                calls: AtomicU32::new(0),
                log,
            })
        }
    }

    #[async_trait]
    impl ToolAdapter for ScriptedAdapter {
        fn tool(&self) -> ToolKind {
            self.tool
        }

        async fn execute(
            &self,
            action: ToolAction,
            _params: &serde_json::Value,
        ) -> Result<ToolResponse, AdapterError> {
            self.log.lock().unwrap().push(action);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                return Err(AdapterError::new(
                    self.tool,
                    action,
                    AdapterErrorKind::Remote { status: Some(500) },
                    format!("scripted failure {n}"),
                ));
            }
            let key = action.artifact_key();
            Ok(ToolResponse::new(serde_json::json!({ key: format!("{}-{n}", self.tool) })))
        }
    }

    struct Harness {
        engine: OrchestrationEngine,
        store: Arc<LibSqlBackend>,
        log: Arc<Mutex<Vec<ToolAction>>>,
    }

    async fn harness_with(failures: HashMap<ToolKind, u32>, scorer: Arc<dyn PriorityScorer>) -> Harness {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolSet::new();
        for kind in [ToolKind::TaskBoard, ToolKind::KnowledgeBase, ToolKind::Chat] {
            let fail_first = failures.get(&kind).copied().unwrap_or(0);
            tools = tools.with_adapter(ScriptedAdapter::new(kind, fail_first, log.clone()));
        }
        let engine = OrchestrationEngine::new(
            scorer,
            tools,
            RetryPolicy::immediate(3),
            store.clone(),
            ToolTargets::default(),
            7,
        );
        Harness { engine, store, log }
    }

    async fn harness(failures: HashMap<ToolKind, u32>) -> Harness {
        harness_with(failures, Arc::new(RuleScorer::default_rules())).await
    }

    fn emergency() -> RawSignal {
        RawSignal::new(
            "manual",
            "system_alert",
            "EMERGENCY: System DOWN",
            "Critical issue affecting production",
        )
        .with_metadata(serde_json::json!({}))
    }

    fn inquiry() -> RawSignal {
        RawSignal::new("manual", "general", "General inquiry", "Just wondering about pricing")
            .with_sender("user@example.com")
            .with_metadata(serde_json::json!({}))
    }

    #[tokio::test]
    async fn below_threshold_makes_no_tool_calls() {
        let h = harness(HashMap::new()).await;
        let resp = h.engine.intake(inquiry()).await.unwrap();

        assert_eq!(resp.status, IntakeStatus::LowPriority);
        assert!(resp.priority_score <= 6.0);
        assert_eq!(resp.message, MSG_LOW_PRIORITY);
        assert!(h.log.lock().unwrap().is_empty());
        assert!(h.store.list_executions(resp.signal_id).await.unwrap().is_empty());

        let stored = h.store.get_signal(resp.signal_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SignalStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn critical_signal_fans_out_in_order() {
        let h = harness(HashMap::new()).await;
        let resp = h.engine.intake(emergency()).await.unwrap();

        assert_eq!(resp.status, IntakeStatus::Completed);
        assert!(resp.priority_score >= 9.0);
        assert!(resp.summary.as_deref().unwrap().starts_with("CRITICAL"));
        assert_eq!(
            *h.log.lock().unwrap(),
            vec![ToolAction::CreateCard, ToolAction::CreatePage, ToolAction::SendMessage]
        );

        let records = h.store.list_executions(resp.signal_id).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status == ExecutionStatus::Success));
        assert_eq!(
            records[0].request_data.as_ref().unwrap()["lane"],
            "Critical"
        );
        // The page step sees the card created before it.
        assert_eq!(
            records[1].request_data.as_ref().unwrap()["properties"]["Task Card"]["rich_text"][0]["text"]["content"],
            "task-board-1"
        );

        let stored = h.store.get_signal(resp.signal_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SignalStatus::Completed);
        assert!(stored.ai_reasoning.unwrap().contains("Critical system issue detected"));
        assert_eq!(stored.artifacts.task_item_id.as_deref(), Some("task-board-1"));
        assert_eq!(stored.artifacts.doc_id.as_deref(), Some("knowledge-base-1"));
        assert_eq!(stored.artifacts.chat_message_id.as_deref(), Some("chat-1"));
        assert_eq!(stored.assigned_to.as_deref(), Some("devops@company.com"));
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn one_failed_step_fails_signal_but_keeps_other_artifacts() {
        let h = harness(HashMap::from([(ToolKind::KnowledgeBase, 10)])).await;
        let resp = h.engine.intake(emergency()).await.unwrap();

        assert_eq!(resp.status, IntakeStatus::Failed);
        assert_eq!(resp.steps.len(), 3);
        assert!(resp.error.as_deref().unwrap().contains("scripted failure 3"));

        let records = h.store.list_executions(resp.signal_id).await.unwrap();
        let statuses: Vec<ExecutionStatus> = records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ExecutionStatus::Success, ExecutionStatus::Failed, ExecutionStatus::Success]
        );
        assert_eq!(records[1].attempts, 3);

        let stored = h.store.get_signal(resp.signal_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SignalStatus::Failed);
        assert!(stored.artifacts.task_item_id.is_some());
        assert!(stored.artifacts.doc_id.is_none());
        assert!(stored.artifacts.chat_message_id.is_some());
        assert_eq!(stored.retries, 0);
    }

    #[tokio::test]
    async fn transient_failures_recover_within_budget() {
        let h = harness(HashMap::from([(ToolKind::TaskBoard, 2)])).await;
        let resp = h.engine.intake(emergency()).await.unwrap();

        assert_eq!(resp.status, IntakeStatus::Completed);
        let records = h.store.list_executions(resp.signal_id).await.unwrap();
        assert_eq!(records[0].attempts, 3);
        assert_eq!(records[0].status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn unconfigured_tools_use_flagged_fallback() {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let engine = OrchestrationEngine::new(
            Arc::new(RuleScorer::default_rules()),
            ToolSet::new(),
            RetryPolicy::immediate(3),
            store.clone(),
            ToolTargets::default(),
            7,
        );
        let resp = engine.intake(emergency()).await.unwrap();
        assert_eq!(resp.status, IntakeStatus::Completed);
        assert!(resp.steps.iter().all(|s| s.simulated));

        let records = store.list_executions(resp.signal_id).await.unwrap();
        assert!(records.iter().all(|r| r.simulated && r.attempts == 0));
    }

    struct FailingScorer;

    impl PriorityScorer for FailingScorer {
        fn name(&self) -> &str {
            "failing"
        }

        fn score(&self, _signal: &Signal) -> Result<ScoreOutcome, ScoringError> {
            Err(ScoringError::Failed {
                scorer: "failing".into(),
                reason: "model unavailable".into(),
            })
        }
    }

    struct PanickingScorer;

    impl PriorityScorer for PanickingScorer {
        fn name(&self) -> &str {
            "panicking"
        }

        fn score(&self, _signal: &Signal) -> Result<ScoreOutcome, ScoringError> {
            panic!("scorer bug")
        }
    }

    #[tokio::test]
    async fn scorer_error_uses_neutral_fallback() {
        let h = harness_with(HashMap::new(), Arc::new(FailingScorer)).await;
        let resp = h.engine.intake(emergency()).await.unwrap();

        assert_eq!(resp.status, IntakeStatus::LowPriority);
        assert_eq!(resp.priority_score, 5.0);
        let stored = h.store.get_signal(resp.signal_id).await.unwrap().unwrap();
        assert_eq!(stored.ai_reasoning.as_deref(), Some("Priority analysis failed"));
        assert_eq!(stored.recommended_action.as_deref(), Some("Manual review required"));
    }

    #[tokio::test]
    async fn scorer_panic_uses_neutral_fallback() {
        let h = harness_with(HashMap::new(), Arc::new(PanickingScorer)).await;
        let resp = h.engine.intake(emergency()).await.unwrap();
        assert_eq!(resp.status, IntakeStatus::LowPriority);
        assert_eq!(resp.priority_score, 5.0);
    }

    #[tokio::test]
    async fn intake_is_not_deduplicating() {
        let h = harness(HashMap::new()).await;
        let a = h.engine.intake(inquiry()).await.unwrap();
        let b = h.engine.intake(inquiry()).await.unwrap();
        assert_ne!(a.signal_id, b.signal_id);
    }

    #[tokio::test]
    async fn invalid_intake_creates_nothing() {
        let h = harness(HashMap::new()).await;
        let err = h
            .engine
            .intake(RawSignal::new("manual", "t", "", "body"))
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("subject"));
        assert!(h.store.list_signals(&SignalFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_before_fanout_starts_no_steps() {
        let h = harness(HashMap::new()).await;
        let flag = Arc::new(AtomicBool::new(true));
        let engine = h.engine.with_shutdown(flag);
        let resp = engine.intake(emergency()).await.unwrap();

        assert_eq!(resp.status, IntakeStatus::Failed);
        assert!(resp.error.as_deref().unwrap().contains("cancelled"));
        assert!(h.log.lock().unwrap().is_empty());
        assert!(h.store.list_executions(resp.signal_id).await.unwrap().is_empty());
    }

    /// Task-board adapter that requests shutdown while its call is in flight.
    struct ShutdownDuringCard {
        flag: Arc<AtomicBool>,
        log: Arc<Mutex<Vec<ToolAction>>>,
    }

    #[async_trait]
    impl ToolAdapter for ShutdownDuringCard {
        fn tool(&self) -> ToolKind {
            ToolKind::TaskBoard
        }

        async fn execute(
            &self,
            action: ToolAction,
            _params: &serde_json::Value,
        ) -> Result<ToolResponse, AdapterError> {
            self.log.lock().unwrap().push(action);
            self.flag.store(true, Ordering::SeqCst);
            Ok(ToolResponse::new(serde_json::json!({ "id": "card-1" })))
        }
    }

    #[tokio::test]
    async fn shutdown_mid_fanout_keeps_dispatched_step_only() {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));
        let flag = Arc::new(AtomicBool::new(false));
        let tools = ToolSet::new()
            .with_adapter(Arc::new(ShutdownDuringCard {
                flag: flag.clone(),
                log: log.clone(),
            }))
            .with_adapter(ScriptedAdapter::new(ToolKind::KnowledgeBase, 0, log.clone()))
            .with_adapter(ScriptedAdapter::new(ToolKind::Chat, 0, log.clone()));
        let engine = OrchestrationEngine::new(
            Arc::new(RuleScorer::default_rules()),
            tools,
            RetryPolicy::immediate(3),
            store.clone(),
            ToolTargets::default(),
            7,
        )
        .with_shutdown(flag);

        let resp = engine.intake(emergency()).await.unwrap();
        assert_eq!(resp.status, IntakeStatus::Failed);
        assert_eq!(*log.lock().unwrap(), vec![ToolAction::CreateCard]);

        let records = store.list_executions(resp.signal_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "create_card");
        assert_eq!(records[0].status, ExecutionStatus::Success);

        let signal = store.get_signal(resp.signal_id).await.unwrap().unwrap();
        assert_eq!(signal.status, SignalStatus::Failed);
        assert_eq!(signal.artifacts.task_item_id.as_deref(), Some("card-1"));
        assert!(signal.artifacts.doc_id.is_none());
        assert!(signal.assigned_to.is_none());
        assert_eq!(
            signal.error_message.as_deref(),
            Some("Processing cancelled before NOTION_CREATE_PAGE")
        );
    }

    #[tokio::test]
    async fn batch_isolates_failures_and_stops_on_shutdown() {
        let h = harness(HashMap::new()).await;
        let results = h
            .engine
            .process_batch(vec![
                inquiry(),
                RawSignal::new("fax", "t", "s", "c"),
                emergency(),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().status, IntakeStatus::Completed);

        let flag = Arc::new(AtomicBool::new(true));
        let engine = h.engine.with_shutdown(flag);
        assert!(engine.process_batch(vec![inquiry()]).await.is_empty());
    }

    /// Store whose `append_execution` always fails.
    struct BrokenTrailStore {
        inner: LibSqlBackend,
    }

    #[async_trait]
    impl SignalStore for BrokenTrailStore {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            self.inner.run_migrations().await
        }
        async fn create_signal(&self, signal: &Signal) -> Result<Uuid, DatabaseError> {
            self.inner.create_signal(signal).await
        }
        async fn update_signal(&self, id: Uuid, update: &SignalUpdate) -> Result<(), DatabaseError> {
            self.inner.update_signal(id, update).await
        }
        async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>, DatabaseError> {
            self.inner.get_signal(id).await
        }
        async fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>, DatabaseError> {
            self.inner.list_signals(filter).await
        }
        async fn stats(&self) -> Result<SignalStats, DatabaseError> {
            self.inner.stats().await
        }
        async fn append_execution(&self, _record: &ExecutionRecord) -> Result<Uuid, DatabaseError> {
            Err(DatabaseError::Query("disk full".into()))
        }
        async fn update_execution(&self, id: Uuid, update: &ExecutionUpdate) -> Result<(), DatabaseError> {
            self.inner.update_execution(id, update).await
        }
        async fn list_executions(&self, signal_id: Uuid) -> Result<Vec<ExecutionRecord>, DatabaseError> {
            self.inner.list_executions(signal_id).await
        }
    }

    #[tokio::test]
    async fn fatal_error_aborts_remaining_steps_and_counts_retry() {
        let store = Arc::new(BrokenTrailStore {
            inner: LibSqlBackend::new_memory().await.unwrap(),
        });
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = ToolSet::new().with_adapter(ScriptedAdapter::new(ToolKind::TaskBoard, 0, log.clone()));
        let engine = OrchestrationEngine::new(
            Arc::new(RuleScorer::default_rules()),
            tools,
            RetryPolicy::immediate(3),
            store.clone(),
            ToolTargets::default(),
            7,
        );

        let resp = engine.intake(emergency()).await.unwrap();
        assert_eq!(resp.status, IntakeStatus::Failed);
        assert!(resp.error.as_deref().unwrap().contains("disk full"));
        assert!(log.lock().unwrap().is_empty());

        let stored = store.get_signal(resp.signal_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SignalStatus::Failed);
        assert_eq!(stored.retries, 1);
        assert!(stored.error_message.unwrap().contains("disk full"));
    }
}
