use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use ripple_log::MemoryLog;
use ripple_pipeline::{Pipeline, PipelineConfig, SessionRegistry};
use ripple_server::{AppState, HealthReporter, ServerConfig};
use ripple_store::{Database, EventStore};
use ripple_telemetry::TelemetryConfig;

#[derive(Parser, Debug)]
#[command(name = "ripple", about = "CDC event pipeline service")]
struct Cli {
    /// HTTP/WebSocket listen port.
    #[arg(long, default_value_t = 8081)]
    port: u16,

    /// SQLite database path. Defaults to ~/.ripple/ripple.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log topic carrying the event stream.
    #[arg(long, default_value = "llm-events")]
    topic: String,

    /// Partition count for the in-process log.
    #[arg(long, default_value_t = 4)]
    partitions: u32,

    /// Upstream inference backend probed by /health.
    #[arg(long)]
    upstream_url: Option<String>,

    /// Default log filter (RUST_LOG overrides).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    ripple_telemetry::init(&TelemetryConfig {
        log_level: cli.log_level.clone(),
        json: cli.json_logs,
    });

    tracing::info!("starting ripple");

    // Clients are built once here and injected; failures at this stage are
    // fatal and abort startup.
    let db_path = match cli.db {
        Some(path) => path,
        None => default_home().join(".ripple").join("ripple.db"),
    };
    let db = Database::open(&db_path)
        .with_context(|| format!("open database at {}", db_path.display()))?;
    let store = Arc::new(EventStore::new(db.clone()));

    let log = Arc::new(MemoryLog::new(cli.partitions));
    let registry = Arc::new(SessionRegistry::new(256));

    let pipeline = Pipeline::new(
        Arc::clone(&log) as Arc<dyn ripple_log::EventLog>,
        store.clone(),
        registry.clone(),
        PipelineConfig {
            topic: cli.topic,
            poll_wait: Duration::from_secs(1),
            fanout_capacity: 1024,
        },
    );
    pipeline.start().await.context("start pipeline")?;

    let state = AppState {
        producer: Arc::new(pipeline.producer()),
        store,
        registry,
        health: Arc::new(HealthReporter::new(log, db, cli.upstream_url)),
    };

    let handle = ripple_server::start(ServerConfig { port: cli.port }, state)
        .await
        .context("bind server")?;
    tracing::info!(port = handle.port, "ripple ready");

    tokio::signal::ctrl_c().await.context("listen for ctrl+c")?;

    tracing::info!("shutting down");
    pipeline.stop().await;

    Ok(())
}

fn default_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
