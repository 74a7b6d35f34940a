use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ops_command::api::{AppState, api_routes};
use ops_command::config::OpsConfig;
use ops_command::orchestrator::{OrchestrationEngine, spawn_monitor};
use ops_command::scoring::RuleScorer;
use ops_command::sources::configured_feeds;
use ops_command::store::{LibSqlBackend, SignalStore};
use ops_command::tools::ToolSet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OpsConfig::from_env().context("invalid configuration")?;

    // ── Logging: stderr plus a daily file ───────────────────────────────
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "operations.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    eprintln!("📡 Ops Command v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Priority threshold: {}", config.priority_threshold);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn SignalStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Tools ────────────────────────────────────────────────────────────
    let tools = ToolSet::from_config(&config);
    eprintln!(
        "   Tools: {}",
        if config.simulate_tools {
            "simulated"
        } else if config.router.is_some() {
            "tool router"
        } else {
            "unconfigured (fallback responses)"
        }
    );

    // ── Engine + monitor ─────────────────────────────────────────────────
    let engine = Arc::new(OrchestrationEngine::from_config(
        &config,
        Arc::new(RuleScorer::default_rules()),
        tools.clone(),
        Arc::clone(&store),
    ));

    let feeds = configured_feeds(&tools, &config.retry, &config.targets.spreadsheet_id);
    eprintln!(
        "   Feeds: {}",
        if feeds.is_empty() {
            "none".to_string()
        } else {
            feeds.iter().map(|f| f.name().to_string()).collect::<Vec<_>>().join(", ")
        }
    );
    let monitor = spawn_monitor(Arc::clone(&engine), feeds, config.monitor_interval);

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = api_routes(AppState::new(Arc::clone(&engine)));
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    eprintln!("   API: http://{addr}\n");
    tracing::info!(addr = %addr, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    monitor.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
