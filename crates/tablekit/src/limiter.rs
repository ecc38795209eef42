use std::time::Duration;

use async_trait::async_trait;
use tablekit_core::storage::RateLimiter;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Lets one item through per `interval`.
#[derive(Debug)]
pub struct IntervalLimiter {
    interval: Duration,
    next: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(None),
        }
    }

    /// A limiter allowing `per_second` items per second.
    pub fn per_second(per_second: u32) -> Self {
        Self::new(Duration::from_secs(1) / per_second.max(1))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for IntervalLimiter {
    async fn wait(&self) {
        let mut next = self.next.lock().await;
        if let Some(at) = *next {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.interval);
    }
}
