//! Dual token-bucket rate limiting for the Telegram adapter.
//!
//! One bucket per second, one per minute; both must have a token before a
//! call proceeds. Process-wide, shared via `Arc`, fair (FIFO).

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};

type Bucket = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Two independent quotas that must both admit a call.
pub struct DualBucket {
    per_second: Bucket,
    per_minute: Bucket,
}

impl DualBucket {
    pub fn new(rps: u32, rpm: u32) -> Self {
        let rps = NonZeroU32::new(rps.max(1)).unwrap();
        let rpm = NonZeroU32::new(rpm.max(1)).unwrap();
        Self {
            per_second: Bucket::direct(Quota::per_second(rps)),
            per_minute: Bucket::direct(Quota::per_minute(rpm)),
        }
    }

    /// Waits until both buckets admit a call. The per-minute bucket is
    /// usually the binding constraint so it is awaited first.
    pub async fn acquire(&self) {
        self.per_minute.until_ready().await;
        self.per_second.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_does_not_panic_under_single_caller() {
        let bucket = DualBucket::new(5, 30);
        bucket.acquire().await;
        bucket.acquire().await;
    }
}
