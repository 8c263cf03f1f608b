mod config;
mod plan;
mod profile;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tiered_coordination::events::{EventFilter, FilteredReceiver};
use tiered_coordination::{
    ConsultationCache, ContextStore, EventBus, EventKind, ExecutionOrchestrator, JsonFileStore,
    JsonlSink, KeywordClassifier, MemoryRecordStore, ParallelExecutor, RecordStatus,
    SharedRecordStore,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use config::RunnerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Work-item plan (JSON, or YAML with a .yaml/.yml extension)
    #[arg(long)]
    plan: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for persisted cache, context and execution records
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Append telemetry events to this JSON-lines file
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Pretty-print the execution record
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = RunnerConfig::load(args.config.as_deref())?;
    let items = plan::load_plan(&args.plan)?;
    info!(
        items = items.len(),
        consultants = config.consultants.len(),
        max_parallel = config.orchestrator.max_parallel,
        "Tiered runner starting"
    );

    let store: SharedRecordStore = match &args.state_dir {
        Some(dir) => Arc::new(
            JsonFileStore::open(dir)
                .await
                .with_context(|| format!("Failed to open state dir {}", dir.display()))?,
        ),
        None => Arc::new(MemoryRecordStore::new()),
    };

    let mut bus = EventBus::new();
    if let Some(path) = &args.telemetry {
        bus = bus.with_sink(Arc::new(JsonlSink::new(path)));
    }
    let events = bus.shared();
    let watcher = tokio::spawn(log_escalations(events.subscribe_filtered(
        EventFilter::new().kinds(vec![
            EventKind::TierTransition,
            EventKind::HandoffRejected,
            EventKind::BatchAborted,
        ]),
    )));

    let cache = ConsultationCache::new(&config.orchestrator).with_store(store.clone());
    let warmed = cache
        .warm_from_store()
        .await
        .context("Failed to load cached consultations")?;
    let cache = cache.shared();

    let context = ContextStore::load(store.clone())
        .await
        .context("Failed to load project context")?
        .with_events(events.clone())
        .shared();

    let registry = profile::build_registry(&config.consultants)?;
    let classifier = KeywordClassifier::new(&config.classifier)?;
    let orchestrator = ExecutionOrchestrator::new(
        config.orchestrator.clone(),
        Arc::new(registry),
        Arc::new(classifier),
    )?
    .with_cache(cache.clone())
    .with_context(context)
    .with_events(events)
    .shared();

    let executor = ParallelExecutor::new(orchestrator).with_store(store);
    let record = executor.execute_set(items).await?;

    let purged = cache.evict_expired().await;
    if let Some(ttl) = cache.adjust_ttl() {
        info!(ttl_ms = ttl, "Cache TTL adjusted for next run");
    }
    let stats = cache.stats().await;
    watcher.abort();
    info!(
        warmed,
        purged,
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        status = %record.status,
        "Run finished"
    );

    let output = if args.pretty {
        serde_json::to_string_pretty(&record)?
    } else {
        serde_json::to_string(&record)?
    };
    println!("{output}");

    if record.status == RecordStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Log escalations and aborts as they happen
async fn log_escalations(mut receiver: FilteredReceiver) {
    loop {
        match receiver.recv().await {
            Ok(event) => match event.kind {
                EventKind::TierTransition => info!(
                    item_id = event.item_id().unwrap_or("-"),
                    from = %event.data["from"],
                    to = %event.data["to"],
                    trigger = %event.data["trigger"],
                    "Tier transition"
                ),
                _ => warn!(event_type = event.event_type(), data = %event.data, "Run event"),
            },
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Escalation log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
