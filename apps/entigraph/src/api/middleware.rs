//! # Middleware Module
//!
//! Global rate limiting for the Entigraph HTTP API, configured through
//! `api.rate_limit` (or `ENTIGRAPH_RATE_LIMIT`) in requests per second.

use crate::config::DEFAULT_RATE_LIMIT;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a global rate limiter allowing `requests_per_second`.
///
/// Zero falls back to the default quota; callers that want no limit skip
/// the layer instead.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RATE_LIMIT))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Rate limiting middleware.
///
/// Returns 429 Too Many Requests once the quota is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    match limiter.check() {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_within_quota() {
        let limiter = create_rate_limiter(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn zero_uses_default_quota() {
        let limiter = create_rate_limiter(0);
        for _ in 0..DEFAULT_RATE_LIMIT {
            assert!(limiter.check().is_ok());
        }
    }
}
