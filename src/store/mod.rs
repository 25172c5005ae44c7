//! Counter store abstraction.
//!
//! The rate limiter never holds per-key state itself. Every quota counter
//! lives in a [`CounterStore`], which must make `decrement` atomic across
//! all callers sharing the store.

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Capability the rate limiter needs from its counter store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Unconditionally (re)initialize `key` to `value`, expiring after `ttl`.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically subtract `amount` from `key` and return the new value.
    ///
    /// Must return [`StoreError::NotFound`] when the record is absent or
    /// expired, and a different variant for every other failure.
    async fn decrement(&self, key: &str, amount: u64) -> Result<i64, StoreError>;
}
