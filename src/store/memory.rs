//! In-process counter store with per-record expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::CounterStore;
use crate::error::StoreError;

/// Number of `set` calls between sweeps of expired records.
const DEFAULT_PURGE_INTERVAL: u64 = 1024;

/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 86400);

#[derive(Debug, Clone, Copy)]
struct Record {
    value: i64,
    expires_at: Instant,
}

impl Record {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A [`CounterStore`] backed by a concurrent hash map.
///
/// Decrements hold the shard write lock for the key, so concurrent callers
/// in the same process never lose an update. Expired records are reported
/// as [`StoreError::NotFound`]. They are dropped when overwritten, and every
/// `purge_interval` calls to `set` the whole map is swept, which bounds
/// memory by the number of keys active within one window.
#[derive(Debug)]
pub struct MemoryStore {
    records: DashMap<String, Record>,
    sets: AtomicU64,
    purge_interval: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that sweeps expired records every
    /// `purge_interval` sets. Zero disables the sweep.
    pub fn with_purge_interval(purge_interval: u64) -> Self {
        Self {
            records: DashMap::new(),
            sets: AtomicU64::new(0),
            purge_interval,
        }
    }

    /// Remove every expired record, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.records.len())
    }

    /// Number of records held, expired or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn maybe_purge(&self) {
        if self.purge_interval == 0 {
            return;
        }
        let sets = self.sets.fetch_add(1, Ordering::Relaxed) + 1;
        if sets % self.purge_interval == 0 {
            let purged = self.purge_expired();
            debug!(purged, remaining = self.records.len(), "Purged expired counters");
        }
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError> {
        // A record that expires on creation would make every request an
        // initializing one
        if ttl.is_zero() {
            return Err(StoreError::backend("zero ttl"));
        }

        trace!(key = %key, value, ttl = ?ttl, "Setting counter");
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .ok_or_else(|| StoreError::backend("ttl overflows the clock"))?;

        self.records
            .insert(key.to_string(), Record { value, expires_at });
        self.maybe_purge();
        Ok(())
    }

    async fn decrement(&self, key: &str, amount: u64) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut record = self.records.get_mut(key).ok_or(StoreError::NotFound)?;
        if record.is_expired(now) {
            return Err(StoreError::NotFound);
        }

        let amount = i64::try_from(amount).map_err(StoreError::backend)?;
        record.value = record.value.saturating_sub(amount);
        Ok(record.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decrement_missing_key() {
        let store = MemoryStore::new();
        let err = store.decrement("absent", 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_then_decrement() {
        let store = MemoryStore::new();
        store.set("k", 3, Duration::from_secs(10)).await.unwrap();

        assert_eq!(store.decrement("k", 1).await.unwrap(), 2);
        assert_eq!(store.decrement("k", 2).await.unwrap(), 0);
        // Values keep going below zero until the record expires
        assert_eq!(store.decrement("k", 1).await.unwrap(), -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expires_after_ttl() {
        let store = MemoryStore::new();
        store.set("k", 5, Duration::from_secs(2)).await.unwrap();

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert_eq!(store.decrement("k", 1).await.unwrap(), 4);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(store.decrement("k", 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_expired_record() {
        let store = MemoryStore::new();
        store.set("k", 1, Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        store.set("k", 7, Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.decrement("k", 1).await.unwrap(), 6);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set("short", 1, Duration::from_secs(1)).await.unwrap();
        store.set("long", 1, Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.decrement("short", 1).await.unwrap_err().is_not_found());
        assert_eq!(store.decrement("long", 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_decrements_are_not_lost() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.set("k", 1000, Duration::from_secs(60)).await.unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        store.decrement("k", 1).await.unwrap();
                    }
                })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        assert_eq!(store.decrement("k", 0).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_set_rejects_zero_ttl() {
        let store = MemoryStore::new();
        let err = store.set("k", 5, Duration::ZERO).await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_does_not_overflow() {
        let store = MemoryStore::new();
        store
            .set("k", 5, Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(86400 * 365)).await;
        assert_eq!(store.decrement("k", 1).await.unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_sweeps_expired_records() {
        let store = MemoryStore::with_purge_interval(4);
        store.set("short", 1, Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        for key in ["a", "b"] {
            store.set(key, 1, Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(store.len(), 3);

        // Fourth set triggers the sweep
        store.set("c", 1, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.decrement("short", 1).await.unwrap_err().is_not_found());
    }
}
