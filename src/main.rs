//! enviro-ingest binary entrypoint.
//! Loads config and the location table, then runs exactly one ingest pass.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use enviro_ingest::clock::{SystemClock, TokioPacer};
use enviro_ingest::ingest::sink::{LogSink, RecordSink};
use enviro_ingest::locations::load_regions_from;
use enviro_ingest::provider::HttpTransport;
use enviro_ingest::{build_orchestrator, IngestConfig, Region};

/// Compact logs by default; `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("enviro_ingest=info,ingest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[cfg(feature = "postgres")]
async fn build_sink(cfg: &IngestConfig, regions: &[Region]) -> Result<Arc<dyn RecordSink>> {
    use enviro_ingest::ingest::postgres::PostgresSink;

    let Some(url) = cfg.storage.database_url.as_deref() else {
        tracing::warn!("no database_url configured, records will only be logged");
        return Ok(Arc::new(LogSink));
    };
    let sink = PostgresSink::connect(url).await?;
    if cfg.storage.create_tables {
        sink.prepare_tables(regions).await?;
    }
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "postgres"))]
async fn build_sink(cfg: &IngestConfig, _regions: &[Region]) -> Result<Arc<dyn RecordSink>> {
    if cfg.storage.database_url.is_some() {
        tracing::warn!("built without the `postgres` feature, records will only be logged");
    }
    Ok(Arc::new(LogSink))
}

/// Flip the shutdown flag on Ctrl+C; the run stops at the next location boundary.
fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, stopping after the current location");
            let _ = tx.send(true);
        }
        // keep the sender alive so the pause between regions stays cancellable
        std::future::pending::<()>().await;
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = IngestConfig::load_default()
        .and_then(IngestConfig::resolve_secrets)
        .context("loading ingest config")?;
    let regions = load_regions_from(&cfg.locations_path)?;

    tracing::info!(
        locations_path = %cfg.locations_path.display(),
        regions = regions.len(),
        calls_per_window = cfg.limits.calls_per_window,
        region_pause_secs = cfg.limits.region_pause_secs,
        "config loaded"
    );

    let transport = Arc::new(HttpTransport::new(cfg.provider.request_timeout())?);
    let sink = build_sink(&cfg, &regions).await?;
    let orchestrator = build_orchestrator(
        &cfg,
        transport,
        sink,
        Arc::new(SystemClock),
        Arc::new(TokioPacer),
    );

    let summary = orchestrator
        .run_until_cancelled(&regions, spawn_shutdown_listener())
        .await;

    tracing::info!(
        persisted = summary.persisted,
        skipped = summary.skipped,
        sink_errors = summary.sink_errors,
        cancelled = summary.cancelled,
        "done"
    );
    Ok(())
}
