//! # Rate Limiter
//! Provider-wide call budget shared by every fetcher.
//!
//! The window is the calendar minute, not a true sliding window: once the
//! budget is spent, the next caller waits until the wall clock reaches the next
//! minute boundary (`60 - current second`), then the counter starts over.
//! Near a boundary this can over- or under-throttle a little; the provider
//! tolerates that.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use metrics::counter;
use tokio::sync::Mutex;
use tracing::info;

use crate::clock::{Clock, Pacer};

/// Default provider quota: 60 calls per minute.
pub const DEFAULT_CALLS_PER_WINDOW: u32 = 60;

/// Calls spent in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub calls: u32,
    /// When the current window was (re)opened. `None` until the first reset.
    pub window_reset_at: Option<DateTime<Utc>>,
}

/// Shared, internally synchronized rate limiter.
///
/// The budget lock is held across the wait, so concurrent callers queue up
/// behind the one that hit the limit instead of racing the reset.
pub struct RateLimiter {
    capacity: u32,
    budget: Mutex<RateBudget>,
    clock: Arc<dyn Clock>,
    pacer: Arc<dyn Pacer>,
}

impl RateLimiter {
    /// `capacity` of 0 is treated as 1.
    pub fn new(capacity: u32, clock: Arc<dyn Clock>, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            capacity: capacity.max(1),
            budget: Mutex::new(RateBudget {
                calls: 0,
                window_reset_at: None,
            }),
            clock,
            pacer,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Count one provider call, waiting out the minute first if the budget is spent.
    ///
    /// Returns how long the caller was suspended (zero in the common case).
    pub async fn acquire(&self) -> Duration {
        let mut budget = self.budget.lock().await;

        let mut waited = Duration::ZERO;
        if budget.calls >= self.capacity {
            let now = self.clock.now();
            waited = Duration::from_secs(seconds_until_next_minute(now));
            info!(
                target: "ingest",
                calls = budget.calls,
                wait_secs = waited.as_secs(),
                "rate limit reached, waiting for next window"
            );
            counter!("ingest_rate_limit_waits_total").increment(1);

            self.pacer.pause(waited).await;

            budget.calls = 0;
            budget.window_reset_at = Some(self.clock.now());
        }

        budget.calls += 1;
        counter!("ingest_provider_calls_total").increment(1);
        waited
    }

    /// Copy of the current budget, for diagnostics and tests.
    pub async fn snapshot(&self) -> RateBudget {
        *self.budget.lock().await
    }
}

fn seconds_until_next_minute(now: DateTime<Utc>) -> u64 {
    // Leap seconds report 60; never go negative.
    60u64.saturating_sub(u64::from(now.second()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, RecordingPacer};
    use chrono::TimeZone;

    fn limiter_at(
        capacity: u32,
        at: DateTime<Utc>,
    ) -> (RateLimiter, Arc<FixedClock>, Arc<RecordingPacer>) {
        let clock = Arc::new(FixedClock::new(at));
        let pacer = Arc::new(RecordingPacer::driving(clock.clone()));
        let limiter = RateLimiter::new(capacity, clock.clone(), pacer.clone());
        (limiter, clock, pacer)
    }

    #[test]
    fn seconds_until_boundary() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 42).unwrap();
        assert_eq!(seconds_until_next_minute(t), 18);
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
        assert_eq!(seconds_until_next_minute(t), 60);
    }

    #[tokio::test]
    async fn sixty_calls_pass_then_sixty_first_waits() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 20).unwrap();
        let (limiter, clock, pacer) = limiter_at(60, t0);

        for _ in 0..60 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(limiter.snapshot().await.calls, 60);
        assert!(pacer.pauses().is_empty());

        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_secs(40));
        assert_eq!(pacer.pauses(), vec![Duration::from_secs(40)]);

        let budget = limiter.snapshot().await;
        assert_eq!(budget.calls, 1, "the unblocked call counts in the new window");
        assert_eq!(budget.window_reset_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 59).unwrap();
        let (limiter, _clock, pacer) = limiter_at(0, t0);
        assert_eq!(limiter.capacity(), 1);

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert_eq!(limiter.acquire().await, Duration::from_secs(1));
        assert_eq!(pacer.pauses().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_never_exceed_capacity() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 30).unwrap();
        let (limiter, _clock, pacer) = limiter_at(5, t0);
        let limiter = Arc::new(limiter);

        let mut handles = Vec::new();
        for _ in 0..12 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.acquire().await }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // 12 calls at capacity 5 -> two resets, 2 calls in the last window.
        assert_eq!(pacer.pauses().len(), 2);
        assert_eq!(limiter.snapshot().await.calls, 2);
    }
}
