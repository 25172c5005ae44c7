//! Bucket definitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named time windows for bucket configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }
}

impl From<TimeWindow> for Duration {
    fn from(window: TimeWindow) -> Self {
        window.duration()
    }
}

/// A single (window, limit) rule tracked independently per subject key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bucket {
    /// Length of the fixed window
    pub window: Duration,
    /// Requests allowed per window
    pub limit: u64,
}

impl Bucket {
    pub fn new(window: impl Into<Duration>, limit: u64) -> Self {
        Self {
            window: window.into(),
            limit,
        }
    }

    /// A bucket with a zero window or zero limit can never admit a request
    /// the way its caller intended.
    pub fn is_valid(&self) -> bool {
        !self.window.is_zero() && self.limit > 0
    }
}

/// Point-in-time copy of a limiter's buckets, ordered by window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSet {
    buckets: Vec<Bucket>,
}

impl BucketSet {
    pub(crate) fn from_map(map: &HashMap<Duration, u64>) -> Self {
        let mut buckets: Vec<Bucket> = map
            .iter()
            .map(|(&window, &limit)| Bucket { window, limit })
            .collect();
        buckets.sort_by_key(|b| b.window);
        Self { buckets }
    }

    /// Limit configured for `window`, if any.
    pub fn limit_for(&self, window: Duration) -> Option<u64> {
        self.buckets
            .iter()
            .find(|b| b.window == window)
            .map(|b| b.limit)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bucket> {
        self.buckets.iter()
    }
}

impl<'a> IntoIterator for &'a BucketSet {
    type Item = &'a Bucket;
    type IntoIter = std::slice::Iter<'a, Bucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeWindow::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeWindow::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_bucket_from_time_window() {
        let bucket = Bucket::new(TimeWindow::Minute, 100);
        assert_eq!(bucket.window, Duration::from_secs(60));
        assert!(bucket.is_valid());
    }

    #[test]
    fn test_invalid_buckets() {
        assert!(!Bucket::new(Duration::ZERO, 10).is_valid());
        assert!(!Bucket::new(TimeWindow::Second, 0).is_valid());
    }

    #[test]
    fn test_bucket_set_is_sorted_by_window() {
        let mut map = HashMap::new();
        map.insert(Duration::from_secs(3600), 1000);
        map.insert(Duration::from_secs(1), 10);
        map.insert(Duration::from_secs(60), 100);

        let set = BucketSet::from_map(&map);
        let windows: Vec<u64> = set.iter().map(|b| b.window.as_secs()).collect();
        assert_eq!(windows, vec![1, 60, 3600]);
        assert_eq!(set.limit_for(Duration::from_secs(60)), Some(100));
        assert_eq!(set.limit_for(Duration::from_secs(2)), None);
    }
}
