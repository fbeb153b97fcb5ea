//! # Clock & Pacer
//! Wall-clock access and suspension points for the ingest pipeline.
//!
//! Every delay the pipeline takes (rate-limit waits, the pause between
//! regions) goes through a [`Pacer`], and every "what second is it" question
//! goes through a [`Clock`]. Production wires [`SystemClock`] + [`TokioPacer`];
//! tests swap in [`FixedClock`] + [`RecordingPacer`] so nothing actually sleeps.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real UTC clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("fixed clock mutex poisoned");
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("fixed clock mutex poisoned")
    }
}

/// Suspends the caller for a duration.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Cooperative timer on the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested pauses and returns immediately.
///
/// When built with [`RecordingPacer::driving`], each pause also advances the
/// given clock, so a rate limiter sees time move the way it would in production.
#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
    clock: Option<std::sync::Arc<FixedClock>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driving(clock: std::sync::Arc<FixedClock>) -> Self {
        Self {
            pauses: Mutex::new(Vec::new()),
            clock: Some(clock),
        }
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .expect("recording pacer mutex poisoned")
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses
            .lock()
            .expect("recording pacer mutex poisoned")
            .push(duration);
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn fixed_clock_advances() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 15).unwrap();
        let clock = FixedClock::new(t0);
        clock.advance(Duration::from_secs(45));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 6, 1, 7, 1, 0).unwrap());
    }

    #[tokio::test]
    async fn recording_pacer_moves_driven_clock() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(t0));
        let pacer = RecordingPacer::driving(clock.clone());

        pacer.pause(Duration::from_secs(120)).await;
        pacer.pause(Duration::from_secs(3)).await;

        assert_eq!(
            pacer.pauses(),
            vec![Duration::from_secs(120), Duration::from_secs(3)]
        );
        assert_eq!(pacer.total(), Duration::from_secs(123));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 6, 1, 7, 2, 3).unwrap());
    }
}
