//! Per-client request budget over fixed time windows.
//!
//! Counters live in the shared cache under `ratelimit:{client}:{window}`, so
//! every instance behind a load balancer draws from the same budget.

use crate::cache::CacheStore;
use crate::errors::{ServiceError, ServiceResult};
use crate::utils::clock::Clock;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Over budget; `retry_after` seconds until the window rolls over.
    Limited { retry_after: u64 },
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window_seconds: u64,
}

impl RateLimiter {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        limit: u32,
        window_seconds: u64,
    ) -> Self {
        Self {
            cache,
            clock,
            limit,
            window_seconds: window_seconds.max(1),
        }
    }

    /// Counts one request for `client` and reports whether it fits the budget.
    pub async fn check(&self, client: &str) -> ServiceResult<RateDecision> {
        let now = self.clock.now().timestamp().max(0) as u64;
        let window = now / self.window_seconds;
        let retry_after = (window + 1) * self.window_seconds - now;

        let count = self
            .cache
            .increment(
                &format!("ratelimit:{client}:{window}"),
                Duration::from_secs(self.window_seconds),
            )
            .await
            .map_err(|e| ServiceError::internal_error(format!("Cache error: {e}")))?;

        if count > u64::from(self.limit) {
            Ok(RateDecision::Limited { retry_after })
        } else {
            Ok(RateDecision::Allowed)
        }
    }
}
