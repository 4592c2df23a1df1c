//! Rate limiting utilities

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter keyed by race id
pub type RaceLimiter = DefaultKeyedRateLimiter<u64>;

/// Create a keyed rate limiter with the specified requests per second
pub fn create_race_limiter(requests_per_second: u32) -> Arc<RaceLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

/// Per-race accelerate limiter shared by all HTTP handlers
#[derive(Clone)]
pub struct AccelerateRateLimiter {
    limiter: Arc<RaceLimiter>,
}

impl AccelerateRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            limiter: create_race_limiter(requests_per_second),
        }
    }

    /// Check if an accelerate request for `race_id` is allowed
    pub fn check(&self, race_id: u64) -> bool {
        self.limiter.check_key(&race_id).is_ok()
    }

    /// Drop state for races that have been quiet long enough to be full again
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}
