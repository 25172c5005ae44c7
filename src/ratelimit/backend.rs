//! Rate limiter trait for abstracting over store types.

use async_trait::async_trait;

use crate::error::RateLimitError;

/// Trait for rate limiter implementations.
///
/// [`RateLimiter`](super::RateLimiter) is generic over its counter store;
/// this trait erases the store type so callers can hold an
/// `Arc<dyn RateLimiterBackend>`.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Count one request for `key` against every configured bucket.
    async fn validate(&self, key: &str) -> Result<(), RateLimitError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{RateLimiter, TimeWindow};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_limiter_as_trait_object() {
        let limiter: Arc<dyn RateLimiterBackend> = Arc::new(
            RateLimiter::new(Arc::new(MemoryStore::new())).with_bucket(TimeWindow::Minute, 1),
        );

        assert!(limiter.validate("client").await.is_ok());
        assert!(limiter.validate("client").await.unwrap_err().is_limit_reached());
    }
}
