//! Error types for windowlimit.

use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a counter store implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by a [`CounterStore`](crate::store::CounterStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The counter record does not exist or its time-to-live has elapsed.
    #[error("counter not found or expired")]
    NotFound,

    /// Any other store failure (network, serialization, backend fault).
    #[error("store backend error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    /// Wrap an arbitrary backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Backend(err.into())
    }

    /// Whether this is the cache-miss condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Outcome of a failed [`RateLimiter::validate`](crate::ratelimit::RateLimiter::validate).
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// A bucket's quota is exhausted for the current window.
    #[error("Limit reached for '{key}': {limit} per {window:?}")]
    LimitReached {
        /// Subject key that was rejected
        key: String,
        /// Window of the exhausted bucket
        window: Duration,
        /// Configured limit of the exhausted bucket
        limit: u64,
    },

    /// The counter store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RateLimitError {
    pub fn is_limit_reached(&self) -> bool {
        matches!(self, RateLimitError::LimitReached { .. })
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self, RateLimitError::Store(_))
    }
}

/// Main error type for configuration and I/O.
#[derive(Error, Debug)]
pub enum WindowLimitError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for WindowLimitError {
    fn from(err: config::ConfigError) -> Self {
        WindowLimitError::Config(err.to_string())
    }
}

/// Result type alias for windowlimit configuration operations.
pub type Result<T> = std::result::Result<T, WindowLimitError>;
