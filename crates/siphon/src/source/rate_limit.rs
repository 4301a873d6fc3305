//! Proactive rate limiting for fetch workers.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default fetch rate in requests per second.
///
/// Conservative; bulk-sync sources typically throttle well below what a
/// handful of parallel workers can generate.
pub const DEFAULT_FETCH_RPS: u32 = 5;

/// A shared rate limiter applied before each gateway call.
///
/// The limit is global across the worker pool, not per worker, so the pool
/// size can be tuned independently of how hard the source is hit.
///
/// # Example
///
/// ```ignore
/// use siphon::source::FetchRateLimiter;
///
/// let limiter = FetchRateLimiter::new(10); // 10 requests per second
///
/// // Before each fetch:
/// limiter.wait().await;
/// gateway.fetch(...).await?;
/// ```
#[derive(Clone)]
pub struct FetchRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl FetchRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A zero rate is clamped to 1 request per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(1).unwrap());
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}
