//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use contentforge_common::{config::RateLimitConfig, errors::AppError};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter; zero values are raised to one
pub fn create_rate_limiter(config: &RateLimitConfig) -> Arc<GlobalRateLimiter> {
    let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst).unwrap_or(per_second);

    Arc::new(RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: Arc<GlobalRateLimiter>,
    limit: u32,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => AppError::RateLimited { limit }.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_enforced() {
        let limiter = create_rate_limiter(&RateLimitConfig {
            requests_per_second: 1,
            burst: 2,
            enabled: true,
        });

        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_config_still_admits_requests() {
        let limiter = create_rate_limiter(&RateLimitConfig {
            requests_per_second: 0,
            burst: 0,
            enabled: true,
        });
        assert!(limiter.check().is_ok());
    }
}
