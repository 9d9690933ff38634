//! Pluggable backoff strategies for rate-limited retries.

use rand::Rng;
use std::time::Duration;

/// Strategy deciding how long to wait before the next retry round.
///
/// The default is [`RandomizedBackoff`]; callers with different needs
/// (constant, exponential, jittered) can plug their own via
/// [`ClientBuilder::backoff`](crate::ClientBuilder::backoff).
pub trait Backoff: Send + Sync {
    /// Delay to apply after the given attempt (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Uniformly random delay between 1ms and a configured ceiling,
/// independent of the attempt number. This is what the CrUX rate
/// limiter responds well to: it throttles per-minute quotas, so
/// spreading retries over a wide window matters more than growing them.
#[derive(Debug, Clone)]
pub struct RandomizedBackoff {
    max_delay: Duration,
}

impl RandomizedBackoff {
    /// Create a strategy with the given delay ceiling.
    pub fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }
}

impl Backoff for RandomizedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        let max_ms = (self.max_delay.as_millis() as u64).max(1);
        Duration::from_millis(rand::rng().random_range(1..=max_ms))
    }
}
