//! Global request pacing.
//!
//! One [`RateLimiter`] is constructed per process and shared by reference
//! through the HTTP client; there is no hidden module-level clock. The limit
//! applies across all origins: with the sequential execution model that makes
//! total run throughput `rate_limit_rps` regardless of how many sources are
//! involved, which keeps the limiter trivially correct.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-interval limiter: every caller waits until at least
/// `1000 / requests_per_second` milliseconds have passed since the previous
/// turn was granted.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        RateLimiter {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second),
            last: Mutex::new(None),
        }
    }

    /// Wait for this caller's turn. The lock is held across the sleep so
    /// concurrent callers serialize instead of stampeding.
    pub async fn wait_turn(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let due = prev + self.min_interval;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep(due - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}
