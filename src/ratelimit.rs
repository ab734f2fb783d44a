// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-client-IP rate limiting, 100 requests / 60s sliding window
//! (spec.md §6), built on `governor` the way the teacher's
//! `search::rate_limiter::SearchRateLimiter` wraps it for a single-key
//! quota — this one keys the limiter per `IpAddr` instead.

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

type KeyedLimiter = GovRateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl IpRateLimiter {
    /// `requests_per_window` requests per 60 seconds, per source IP.
    pub fn new(requests_per_window: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_window).unwrap_or(NonZeroU32::new(100).unwrap());
        let quota = Quota::per_minute(rpm);
        Self {
            limiter: Arc::new(GovRateLimiter::keyed(quota)),
        }
    }

    fn check(&self, ip: IpAddr) -> Result<(), u64> {
        match self.limiter.check_key(&ip) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait.as_secs().max(1))
            }
        }
    }
}

impl Default for IpRateLimiter {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Axum middleware enforcing the per-IP quota. Registered ahead of routing
/// so no handler can forget it.
pub async fn enforce(
    State(limiter): State<IpRateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    match limiter.check(addr.ip()) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", retry_after_secs.to_string())],
            "rate limit exceeded",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_ips_have_independent_budgets() {
        let limiter = IpRateLimiter::new(1);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_err());
        assert!(limiter.check(b).is_ok());
    }
}
