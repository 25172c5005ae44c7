//! Multi-window rate limiting over a counter store.

mod backend;
mod bucket;
mod key;
mod limiter;

pub use backend::RateLimiterBackend;
pub use bucket::{Bucket, BucketSet, TimeWindow};
pub use key::{StoreKey, DEFAULT_NAMESPACE};
pub use limiter::RateLimiter;
