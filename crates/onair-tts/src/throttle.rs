//! Request throttling.
//!
//! Spaces outgoing synthesis requests so that bursts of prefetch work do
//! not trip the service's rate limiter.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default minimum spacing between two synthesis requests.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum-interval limiter shared by all callers of one gateway.
///
/// Each caller reserves the next free slot, then sleeps until it. Slots are
/// handed out in call order, so concurrent callers are spaced at least
/// `min_interval` apart.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for this caller's turn. Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        if self.min_interval.is_zero() {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = next.map_or(now, |at| at.max(now));
            *next = Some(slot + self.min_interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
        slot - now
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
