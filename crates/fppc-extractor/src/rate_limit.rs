//! Page-level rate limiting for vision-OCR calls (spec 4.4 step 5: "one page
//! per request, with page-level rate limiting"). Built the way the crawler
//! side of the ecosystem wraps `governor`: a direct, not-keyed limiter over
//! the default clock, awaited with `until_ready` before each request.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;

type DirectLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

#[derive(Clone)]
pub struct PageRateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl PageRateLimiter {
    pub fn new(pages_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(pages_per_second).unwrap_or(nonzero!(1u32)));
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Block until a permit for the next page render/OCR request is available.
    pub async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}
