//! Rate limiting middleware.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::error::ApiError;

/// Shared rate limiter type.
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Used when a zero quota slips through.
const FALLBACK_RPM: NonZeroU32 = match NonZeroU32::new(60) {
    Some(rpm) => rpm,
    None => NonZeroU32::MIN,
};

/// Create a process-wide rate limiter with the given requests-per-minute quota.
#[must_use]
pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_RPM));
    Arc::new(RateLimiter::direct(quota))
}

/// Rejects requests over quota with `429 Too Many Requests`.
pub async fn rate_limit(limiter: SharedRateLimiter, request: Request, next: Next) -> Response {
    match limiter.check() {
        Ok(()) => next.run(request).await,
        Err(_) => ApiError::RateLimitExceeded.into_response(),
    }
}
