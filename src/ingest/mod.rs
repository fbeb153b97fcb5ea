// src/ingest/mod.rs
pub mod aggregate;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sink;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::Pacer;
use crate::ingest::aggregate::LocationAggregator;
use crate::ingest::sink::RecordSink;
use crate::ingest::types::RunSummary;
use crate::locations::{location_count, Location, Region};

/// One-time metrics registration (so series have descriptions once a recorder exists).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_provider_calls_total", "Provider requests issued.");
        describe_counter!(
            "ingest_rate_limit_waits_total",
            "Times the rate budget was spent and a caller waited for the next minute."
        );
        describe_counter!(
            "ingest_source_failures_total",
            "Fetches that failed (transport, HTTP status or body), by endpoint."
        );
        describe_counter!(
            "ingest_source_unavailable_total",
            "Fetches that answered without usable data, by endpoint."
        );
        describe_counter!("ingest_records_persisted_total", "Records stored by the sink.");
        describe_counter!(
            "ingest_locations_skipped_total",
            "Locations skipped because weather was missing."
        );
        describe_counter!("ingest_sink_errors_total", "Sink insert failures.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix timestamp of the last finished ingest run."
        );
    });
}

/// Walks regions in order, one location at a time, and hands each record to the sink.
pub struct BatchOrchestrator {
    aggregator: LocationAggregator,
    sink: Arc<dyn RecordSink>,
    pacer: Arc<dyn Pacer>,
    region_pause: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        aggregator: LocationAggregator,
        sink: Arc<dyn RecordSink>,
        pacer: Arc<dyn Pacer>,
        region_pause: Duration,
    ) -> Self {
        Self {
            aggregator,
            sink,
            pacer,
            region_pause,
        }
    }

    /// Single pass that cannot be cancelled.
    pub async fn run_once(&self, regions: &[Region]) -> RunSummary {
        let (_tx, rx) = watch::channel(false);
        self.run_until_cancelled(regions, rx).await
    }

    /// Single pass over every region.
    ///
    /// `shutdown` flipping to `true` stops the run before the next location
    /// (or during the pause between regions). A location already being fetched
    /// always finishes, so no half-built record is ever stored.
    pub async fn run_until_cancelled(
        &self,
        regions: &[Region],
        mut shutdown: watch::Receiver<bool>,
    ) -> RunSummary {
        ensure_metrics_described();

        let mut summary = RunSummary::default();
        info!(
            target: "ingest",
            regions = regions.len(),
            locations = location_count(regions),
            sink = self.sink.name(),
            "ingest run started"
        );

        'regions: for (i, region) in regions.iter().enumerate() {
            if i > 0 && self.pause_between_regions(&mut shutdown).await {
                summary.cancelled = true;
                break;
            }

            summary.regions += 1;
            info!(
                target: "ingest",
                region = %region.name,
                locations = region.locations.len(),
                "region started"
            );

            for location in &region.locations {
                if *shutdown.borrow() {
                    summary.cancelled = true;
                    break 'regions;
                }
                summary.locations += 1;
                self.ingest_location(&region.name, location, &mut summary).await;
            }
        }

        if summary.cancelled {
            warn!(target: "ingest", ?summary, "ingest run cancelled");
        } else {
            info!(target: "ingest", ?summary, "ingest run finished");
        }
        gauge!("ingest_pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        summary
    }

    async fn ingest_location(&self, region: &str, location: &Location, summary: &mut RunSummary) {
        let Some(record) = self.aggregator.collect(region, location).await else {
            warn!(
                target: "ingest",
                region,
                location_id = location.id,
                location = %location.name,
                "no weather data, location skipped"
            );
            counter!("ingest_locations_skipped_total").increment(1);
            summary.skipped += 1;
            return;
        };

        match self.sink.insert(&record).await {
            Ok(()) => {
                info!(
                    target: "ingest",
                    region,
                    location_id = record.location_id,
                    location = %record.location_name,
                    temperature = record.temperature,
                    aqi = ?record.air_quality_index,
                    "record stored"
                );
                counter!("ingest_records_persisted_total").increment(1);
                summary.persisted += 1;
            }
            Err(e) => {
                error!(
                    target: "ingest",
                    region,
                    location_id = record.location_id,
                    error = ?e,
                    "sink insert failed"
                );
                counter!("ingest_sink_errors_total").increment(1);
                summary.sink_errors += 1;
            }
        }
    }

    /// Returns `true` if shutdown was requested before or during the pause.
    async fn pause_between_regions(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return true;
        }
        info!(
            target: "ingest",
            pause_secs = self.region_pause.as_secs(),
            "pausing before next region"
        );
        let stop_requested = async {
            let stopped = shutdown.wait_for(|stop| *stop).await.is_ok();
            if !stopped {
                // Sender gone: nobody can cancel any more.
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = self.pacer.pause(self.region_pause) => false,
            _ = stop_requested => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{RecordingPacer, SystemClock};
    use crate::config::ProviderConfig;
    use crate::ingest::sink::MemorySink;
    use crate::provider::{Endpoint, ProviderClient, StaticTransport};
    use crate::rate_limit::RateLimiter;
    use serde_json::json;

    fn region(name: &str, ids: &[i64]) -> Region {
        Region {
            name: name.into(),
            locations: ids
                .iter()
                .map(|&id| Location {
                    id,
                    name: format!("loc-{id}"),
                    lat: 10.0 + id as f64,
                    lon: 70.0,
                })
                .collect(),
        }
    }

    /// Signals when a pause starts, then never finishes it.
    struct HangingPacer(tokio::sync::Notify);

    #[async_trait::async_trait]
    impl Pacer for HangingPacer {
        async fn pause(&self, _duration: Duration) {
            self.0.notify_one();
            std::future::pending::<()>().await;
        }
    }

    fn orchestrator(sink: Arc<MemorySink>, pacer: Arc<dyn Pacer>) -> BatchOrchestrator {
        let transport = StaticTransport::new().with(
            Endpoint::Weather,
            json!({"main": {"temp": 20.0, "humidity": 50}, "wind": {"speed": 2.0}}),
        );
        let limiter = Arc::new(RateLimiter::new(60, Arc::new(SystemClock), pacer.clone()));
        let client = ProviderClient::new(ProviderConfig::default(), Arc::new(transport), limiter);
        BatchOrchestrator::new(
            LocationAggregator::new(client),
            sink,
            pacer,
            Duration::from_secs(120),
        )
    }

    #[tokio::test]
    async fn pause_only_between_regions() {
        let sink = Arc::new(MemorySink::new());
        let pacer = Arc::new(RecordingPacer::new());
        let orch = orchestrator(sink.clone(), pacer.clone());

        let summary = orch
            .run_once(&[region("a", &[1, 2]), region("b", &[3]), region("c", &[4])])
            .await;

        assert_eq!(summary.persisted, 4);
        assert_eq!(summary.regions, 3);
        assert!(!summary.cancelled);
        assert_eq!(pacer.pauses(), vec![Duration::from_secs(120); 2]);
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_run() {
        let sink = Arc::new(MemorySink::failing_for(&["a"]));
        let pacer = Arc::new(RecordingPacer::new());
        let orch = orchestrator(sink.clone(), pacer);

        let summary = orch
            .run_once(&[region("a", &[1, 2]), region("b", &[3])])
            .await;

        assert_eq!(summary.sink_errors, 2);
        assert_eq!(summary.persisted, 1);
        assert_eq!(sink.snapshot()[0].region, "b");
    }

    #[tokio::test]
    async fn already_cancelled_stores_nothing() {
        let sink = Arc::new(MemorySink::new());
        let pacer = Arc::new(RecordingPacer::new());
        let orch = orchestrator(sink.clone(), pacer);

        let (_tx, rx) = watch::channel(true);
        let summary = orch.run_until_cancelled(&[region("a", &[1])], rx).await;

        assert!(summary.cancelled);
        assert_eq!(summary.locations, 0);
        assert!(sink.snapshot().is_empty());
    }

    #[tokio::test]
    async fn shutdown_interrupts_region_pause() {
        let sink = Arc::new(MemorySink::new());
        let pacer = Arc::new(HangingPacer(tokio::sync::Notify::new()));
        let orch = orchestrator(sink.clone(), pacer.clone());

        let (tx, rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            pacer.0.notified().await;
            tx.send(true).is_ok()
        });

        let regions = [region("a", &[1, 2]), region("b", &[3])];
        let run = orch.run_until_cancelled(&regions, rx);
        let summary = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run still waiting in the region pause");

        assert!(stopper.await.unwrap());
        assert!(summary.cancelled);
        assert_eq!(summary.regions, 1);
        assert_eq!(summary.persisted, 2);
        assert!(sink.snapshot().iter().all(|r| r.region == "a"));
    }

    #[test]
    fn metrics_are_described_once() {
        ensure_metrics_described();
        ensure_metrics_described();
    }
}
