//! Background loop draining signal feeds into the engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Interval, MissedTickBehavior};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::orchestrator::engine::OrchestrationEngine;
use crate::sources::SignalFeed;

/// Running monitor. Dropping it leaves the loop running; call [`stop`](Self::stop).
pub struct MonitorHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl MonitorHandle {
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Request shutdown and wait for the loop to exit. A signal already
    /// inside a fan-out step finishes that step first.
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Monitor task ended abnormally");
        }
    }
}

/// Spawn the monitor. The engine's own shutdown flag is shared, so stopping
/// the monitor also stops in-flight processing between steps.
pub fn spawn_monitor(
    engine: Arc<OrchestrationEngine>,
    feeds: Vec<Arc<dyn SignalFeed>>,
    every: Duration,
) -> MonitorHandle {
    let shutdown = engine.shutdown_flag();
    let wake = Arc::new(Notify::new());
    let wake_rx = Arc::clone(&wake);

    let handle = tokio::spawn(async move {
        info!(
            feeds = feeds.len(),
            interval_secs = every.as_secs(),
            "Monitor started"
        );
        let mut tick = cycle_interval(every);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = wake_rx.notified() => {}
            }

            if engine.is_cancelled() {
                info!("Monitor shutting down");
                return;
            }

            run_cycle(&engine, &feeds).await;
        }
    });

    MonitorHandle {
        handle,
        shutdown,
        wake,
    }
}

/// First tick fires immediately; a cycle that overruns pushes the next one
/// back instead of bursting.
fn cycle_interval(every: Duration) -> Interval {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

/// Poll every feed once and process what they return, one signal at a
/// time. A failing feed is logged and skipped. Returns the number of
/// signals processed.
pub async fn run_cycle(engine: &OrchestrationEngine, feeds: &[Arc<dyn SignalFeed>]) -> usize {
    let mut processed = 0;
    for feed in feeds {
        if engine.is_cancelled() {
            break;
        }
        let raws = match feed.poll().await {
            Ok(raws) => raws,
            Err(e) => {
                warn!(feed = feed.name(), error = %e, "Feed poll failed");
                continue;
            }
        };
        if raws.is_empty() {
            continue;
        }
        info!(feed = feed.name(), count = raws.len(), "Processing signals from feed");
        processed += engine.process_batch(raws).await.len();
    }
    processed
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::config::ToolTargets;
    use crate::error::{AdapterError, AdapterErrorKind};
    use crate::scoring::RuleScorer;
    use crate::signal::model::RawSignal;
    use crate::store::{LibSqlBackend, SignalFilter, SignalStore};
    use crate::tools::{RetryPolicy, ToolAction, ToolKind, ToolSet};

    struct StaticFeed {
        signals: Vec<RawSignal>,
        polls: AtomicUsize,
    }

    impl StaticFeed {
        fn new(n: usize) -> Arc<Self> {
            let signals = (0..n)
                .map(|i| RawSignal::new("manual", "general", format!("note {i}"), "fyi"))
                .collect();
            Arc::new(Self {
                signals,
                polls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SignalFeed for StaticFeed {
        fn name(&self) -> &str {
            "static"
        }

        async fn poll(&self) -> Result<Vec<RawSignal>, AdapterError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(self.signals.clone())
        }
    }

    struct BrokenFeed;

    #[async_trait]
    impl SignalFeed for BrokenFeed {
        fn name(&self) -> &str {
            "broken"
        }

        async fn poll(&self) -> Result<Vec<RawSignal>, AdapterError> {
            Err(AdapterError::new(
                ToolKind::Mail,
                ToolAction::SearchEmails,
                AdapterErrorKind::Transport,
                "connection refused",
            ))
        }
    }

    async fn engine() -> (Arc<OrchestrationEngine>, Arc<LibSqlBackend>) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let engine = OrchestrationEngine::new(
            Arc::new(RuleScorer::default_rules()),
            ToolSet::simulated(),
            RetryPolicy::immediate(1),
            store.clone(),
            ToolTargets::default(),
            7,
        );
        (Arc::new(engine), store)
    }

    #[tokio::test]
    async fn overrunning_cycle_delays_next_tick() {
        let tick = cycle_interval(Duration::from_secs(60));
        assert_eq!(tick.missed_tick_behavior(), MissedTickBehavior::Delay);
        assert_eq!(tick.period(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn failing_feed_does_not_block_others() {
        let (engine, store) = engine().await;
        let feeds: Vec<Arc<dyn SignalFeed>> = vec![Arc::new(BrokenFeed), StaticFeed::new(2)];
        assert_eq!(run_cycle(&engine, &feeds).await, 2);
        assert_eq!(store.list_signals(&SignalFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_cycle_processes_nothing() {
        let (engine, store) = engine().await;
        engine.shutdown_flag().store(true, Ordering::SeqCst);
        let feeds: Vec<Arc<dyn SignalFeed>> = vec![StaticFeed::new(3)];
        assert_eq!(run_cycle(&engine, &feeds).await, 0);
        assert!(store.list_signals(&SignalFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawned_monitor_runs_immediately_and_stops_promptly() {
        let (engine, store) = engine().await;
        let feed = StaticFeed::new(1);
        let feeds: Vec<Arc<dyn SignalFeed>> = vec![feed.clone()];
        let monitor = spawn_monitor(engine, feeds, Duration::from_secs(3600));

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.list_signals(&SignalFilter::default()).await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first cycle ran");

        tokio::time::timeout(Duration::from_secs(5), monitor.stop())
            .await
            .expect("monitor stopped");
        assert_eq!(feed.polls.load(Ordering::SeqCst), 1);
    }
}
