//! Core rate limiter implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, instrument, trace, warn};

use super::bucket::{Bucket, BucketSet};
use super::key::{StoreKey, DEFAULT_NAMESPACE};
use crate::config::LimiterConfig;
use crate::error::{RateLimitError, StoreError};
use crate::store::CounterStore;

/// Multi-window fixed-window rate limiter.
///
/// Holds a set of buckets (window -> limit) and enforces all of them for
/// every subject key. Counters live in the store `S`; the limiter itself has
/// no per-key state.
///
/// The bucket set is guarded by a read-write lock, so buckets may be changed
/// while other tasks validate. Configuration is still expected to be done
/// before traffic arrives: a `validate` already in flight keeps using the
/// buckets it started with.
pub struct RateLimiter<S> {
    store: Arc<S>,
    namespace: String,
    buckets: RwLock<HashMap<Duration, u64>>,
}

impl<S: CounterStore> RateLimiter<S> {
    /// Create a rate limiter with no buckets in the default namespace.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_namespace(store, DEFAULT_NAMESPACE)
    }

    /// Create a rate limiter whose store keys are prefixed with `namespace`.
    pub fn with_namespace(store: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Create a rate limiter from configuration.
    pub fn from_config(store: Arc<S>, config: &LimiterConfig) -> Self {
        Self::with_namespace(store, config.namespace.clone()).with_buckets(config.bucket_map())
    }

    /// Builder form of [`add_bucket`](Self::add_bucket).
    pub fn with_bucket(self, window: impl Into<Duration>, limit: u64) -> Self {
        self.add_bucket(window, limit);
        self
    }

    /// Builder form of [`set_buckets`](Self::set_buckets).
    pub fn with_buckets(self, buckets: HashMap<Duration, u64>) -> Self {
        self.set_buckets(buckets);
        self
    }

    /// Insert or replace the bucket for `window`.
    pub fn add_bucket(&self, window: impl Into<Duration>, limit: u64) -> &Self {
        let bucket = Bucket::new(window, limit);
        warn_if_invalid(&bucket);
        self.buckets.write().insert(bucket.window, bucket.limit);
        self
    }

    /// Replace the whole bucket set in one step.
    pub fn set_buckets(&self, buckets: HashMap<Duration, u64>) -> &Self {
        for (&window, &limit) in &buckets {
            warn_if_invalid(&Bucket::new(window, limit));
        }
        *self.buckets.write() = buckets;
        self
    }

    /// Remove the bucket for `window`; no-op when absent.
    pub fn del_bucket(&self, window: impl Into<Duration>) -> &Self {
        self.buckets.write().remove(&window.into());
        self
    }

    /// Snapshot of the configured buckets.
    pub fn buckets(&self) -> BucketSet {
        BucketSet::from_map(&self.buckets.read())
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Store key used for `subject`'s counter in the `window` bucket.
    pub fn store_key(&self, subject: &str, window: Duration) -> StoreKey {
        StoreKey::new(&self.namespace, subject, window)
    }

    /// Count one request for `key` against every bucket.
    ///
    /// Returns [`RateLimitError::LimitReached`] for the first exhausted bucket
    /// and [`RateLimitError::Store`] for the first store fault. In both cases
    /// the remaining buckets are not consulted.
    ///
    /// A missing or expired counter is initialized to the bucket's limit with
    /// a time-to-live of one window, and that request is admitted without
    /// being decremented. A bucket with limit `L` therefore admits exactly
    /// `L` requests per window.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn validate(&self, key: &str) -> Result<(), RateLimitError> {
        // Never hold the lock across a store round-trip
        let buckets: Vec<(Duration, u64)> = self
            .buckets
            .read()
            .iter()
            .map(|(&window, &limit)| (window, limit))
            .collect();

        for (window, limit) in buckets {
            let store_key = self.store_key(key, window);

            trace!(store_key = %store_key, limit, "Checking bucket");

            match self.store.decrement(store_key.as_str(), 1).await {
                Ok(remaining) if remaining <= 0 => {
                    debug!(
                        store_key = %store_key,
                        window = ?window,
                        limit,
                        remaining,
                        "Rate limit reached"
                    );
                    return Err(RateLimitError::LimitReached {
                        key: key.to_string(),
                        window,
                        limit,
                    });
                }
                Ok(remaining) => {
                    trace!(store_key = %store_key, remaining, "Bucket passed");
                }
                Err(StoreError::NotFound) => {
                    debug!(
                        store_key = %store_key,
                        window = ?window,
                        limit,
                        "Initializing counter"
                    );
                    let initial = i64::try_from(limit).unwrap_or(i64::MAX);
                    if let Err(e) = self.store.set(store_key.as_str(), initial, window).await {
                        warn!(store_key = %store_key, error = %e, "Failed to initialize counter");
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    warn!(store_key = %store_key, error = %e, "Counter store error");
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }
}

/// Zero windows are rejected by the store on first use; zero limits reject
/// every request after the initializing one.
fn warn_if_invalid(bucket: &Bucket) {
    if !bucket.is_valid() {
        warn!(
            window = ?bucket.window,
            limit = bucket.limit,
            "Registering bucket with zero window or zero limit"
        );
    }
}

#[async_trait]
impl<S: CounterStore + 'static> super::backend::RateLimiterBackend for RateLimiter<S> {
    async fn validate(&self, key: &str) -> Result<(), RateLimitError> {
        RateLimiter::validate(self, key).await
    }
}
