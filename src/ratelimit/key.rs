//! Store key derivation.

use std::fmt;
use std::time::Duration;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "ratelimiter";

/// Key addressing one subject's counter for one bucket in the counter store.
///
/// The format is `<namespace>:<subject>:<window in nanoseconds>`. The window
/// segment is always the last one and never contains `:`, so for a given
/// namespace distinct (subject, window) pairs never produce the same key,
/// even when the subject itself contains `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(namespace: &str, subject: &str, window: Duration) -> Self {
        Self(format!("{}:{}:{}", namespace, subject, window.as_nanos()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoreKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
