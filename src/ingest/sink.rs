// src/ingest/sink.rs
use anyhow::Result;

use crate::ingest::types::NormalizedRecord;

/// Durable destination for normalized records, partitioned by `record.region`.
///
/// The pipeline never deduplicates: a location listed twice is inserted twice,
/// and a second run inserts everything again.
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    async fn insert(&self, record: &NormalizedRecord) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Dry-run sink: logs each record instead of storing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait::async_trait]
impl RecordSink for LogSink {
    async fn insert(&self, record: &NormalizedRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        tracing::info!(
            target: "ingest",
            region = %record.region,
            location_id = record.location_id,
            record = %json,
            "record (dry run)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// --- Test helper ---
/// Keeps every inserted record in memory. Regions listed in `failing` reject inserts.
#[derive(Default)]
pub struct MemorySink {
    pub records: std::sync::Mutex<Vec<NormalizedRecord>>,
    pub failing: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(regions: &[&str]) -> Self {
        Self {
            records: std::sync::Mutex::new(vec![]),
            failing: regions.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn snapshot(&self) -> Vec<NormalizedRecord> {
        self.records.lock().expect("memory sink mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl RecordSink for MemorySink {
    async fn insert(&self, record: &NormalizedRecord) -> Result<()> {
        if self.failing.iter().any(|r| r == &record.region) {
            anyhow::bail!("table {} unavailable", record.region);
        }
        self.records.lock().expect("memory sink mutex poisoned").push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
