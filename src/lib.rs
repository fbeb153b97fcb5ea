// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod clock;
pub mod config;
pub mod ingest;
pub mod locations;
pub mod provider;
pub mod rate_limit;

// ---- Re-exports for stable public API ----
pub use crate::config::IngestConfig;
pub use crate::ingest::aggregate::LocationAggregator;
pub use crate::ingest::sink::RecordSink;
pub use crate::ingest::types::{NormalizedRecord, RunSummary};
pub use crate::ingest::BatchOrchestrator;
pub use crate::locations::{Location, Region};
pub use crate::provider::{Fetched, ProviderClient};
pub use crate::rate_limit::RateLimiter;

use std::sync::Arc;

use crate::clock::{Clock, Pacer};
use crate::provider::ProviderTransport;

/// Wire limiter, client and aggregator into an orchestrator from config.
///
/// The same `pacer` drives rate-limit waits and the pause between regions.
pub fn build_orchestrator(
    cfg: &IngestConfig,
    transport: Arc<dyn ProviderTransport>,
    sink: Arc<dyn RecordSink>,
    clock: Arc<dyn Clock>,
    pacer: Arc<dyn Pacer>,
) -> BatchOrchestrator {
    let limiter = Arc::new(RateLimiter::new(
        cfg.limits.calls_per_window,
        clock,
        pacer.clone(),
    ));
    let client = ProviderClient::new(cfg.provider.clone(), transport, limiter);
    BatchOrchestrator::new(
        LocationAggregator::new(client),
        sink,
        pacer,
        cfg.limits.region_pause(),
    )
}
