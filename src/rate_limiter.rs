//! Per-host fair FIFO rate limiting (§5 "Rate-limit gate per host").
//!
//! One token is minted per `interval`; callers awaiting `acquire()` are
//! served in arrival order. This avoids the ad-hoc `tokio::time::sleep`
//! calls scattered through a naive client: every caller queues behind the
//! same ticking gate instead of racing a timer of its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A single-token-per-interval gate shared by every caller hitting one host.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Instant>>,
    interval: Duration,
}

impl RateLimiter {
    /// `interval` is the minimum spacing between grants, e.g. 1 request/sec
    /// is `Duration::from_secs(1)`.
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Instant::now() - interval)),
            interval,
        }
    }

    /// Block until this caller's turn, honoring FIFO order via the mutex's
    /// own wait queue. Cancellable: dropping the future before it resolves
    /// releases no token and leaves the gate untouched.
    pub async fn acquire(&self) {
        let mut last = self.inner.lock().await;
        let now = Instant::now();
        let earliest_next = *last + self.interval;
        if earliest_next > now {
            tokio::time::sleep(earliest_next - now).await;
        }
        *last = Instant::now();
    }
}

/// Exponential backoff schedule for 429/503 responses (§4.2): 1s, 2s, 4s,
/// capped at 30s, up to `max_retries` attempts.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX).min(30);
    Duration::from_secs(secs)
}
