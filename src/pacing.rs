use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use crate::extractors::traits::host_of;

/// Enforces a minimum gap between requests to the same host.
///
/// Each host gets its own single-cell GCRA bucket, so a caller is never let
/// through earlier than `min_spacing` after the previous request to that
/// host, however the calls are interleaved. A zero spacing disables pacing.
pub struct HostPacer {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl HostPacer {
    pub fn new(min_spacing: Duration) -> Self {
        let limiter = Quota::with_period(min_spacing)
            .map(|quota| RateLimiter::keyed(quota.allow_burst(NonZeroU32::MIN)));

        Self { limiter }
    }

    /// Wait until a request to `url`'s host is allowed. Returns how long it waited.
    /// URLs without a parsable host are not paced.
    pub async fn wait_if_needed(&self, url: &str) -> Duration {
        let Some(limiter) = &self.limiter else {
            return Duration::ZERO;
        };
        let Some(host) = host_of(url) else {
            return Duration::ZERO;
        };

        if limiter.check_key(&host).is_ok() {
            return Duration::ZERO;
        }

        let started = Instant::now();
        limiter.until_key_ready(&host).await;
        let waited = started.elapsed();
        tracing::debug!("Paced {} for {:?}", host, waited);

        limiter.retain_recent();
        waited
    }
}
