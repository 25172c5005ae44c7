//! Windowlimit - multi-window fixed-window rate limiting
//!
//! A [`RateLimiter`] enforces several (window, limit) buckets per subject key
//! at once, e.g. 100 per minute and 1000 per hour. Quota counters live in an
//! external [`CounterStore`] that provides atomic decrement with expiry, so
//! many processes can share one limit.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;

pub use error::{RateLimitError, StoreError, WindowLimitError};
pub use ratelimit::{RateLimiter, RateLimiterBackend};
pub use store::{CounterStore, MemoryStore};
