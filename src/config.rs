//! Configuration management for windowlimit.
//!
//! Buckets are described in the same style as Envoy rate limit rules:
//!
//! ```yaml
//! namespace: api
//! buckets:
//!   - requests_per_unit: 100
//!     unit: minute
//!   - requests_per_unit: 1000
//!     unit: hour
//!   - requests_per_unit: 10
//!     unit: second
//!     units: 5
//!     name: burst
//! logging:
//!   level: debug
//!   format: json
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, WindowLimitError};
use crate::ratelimit::{TimeWindow, DEFAULT_NAMESPACE};

/// Prefix for environment variable overrides, e.g. `WINDOWLIMIT__NAMESPACE`.
pub const ENV_PREFIX: &str = "WINDOWLIMIT";

/// Default rate limit when no buckets are configured.
const DEFAULT_LIMIT: u64 = 100;
/// Default time window when no buckets are configured.
const DEFAULT_WINDOW: TimeWindow = TimeWindow::Minute;

/// Main configuration for a rate limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Prefix of every store key written by the limiter
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Bucket rules
    #[serde(default = "default_buckets")]
    pub buckets: Vec<BucketRule>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            buckets: default_buckets(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_buckets() -> Vec<BucketRule> {
    vec![BucketRule {
        requests_per_unit: DEFAULT_LIMIT,
        unit: DEFAULT_WINDOW,
        units: 1,
        name: None,
    }]
}

/// A bucket rule: `requests_per_unit` requests every `units` × `unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRule {
    /// Number of requests allowed per window
    pub requests_per_unit: u64,
    /// The time unit
    pub unit: TimeWindow,
    /// Number of units making up one window
    #[serde(default = "default_units")]
    pub units: u32,
    /// Optional name/description for this bucket
    #[serde(default)]
    pub name: Option<String>,
}

fn default_units() -> u32 {
    1
}

impl BucketRule {
    /// Length of the window this rule describes.
    pub fn window(&self) -> Duration {
        self.unit.duration() * self.units
    }
}

/// Logging output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LimiterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LimiterConfig = serde_yaml::from_str(yaml)
            .map_err(|e| WindowLimitError::Config(format!("Failed to parse limiter config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply
    /// `WINDOWLIMIT__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading limiter configuration");
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: LimiterConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject rules a limiter cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(WindowLimitError::Config("namespace must not be empty".to_string()));
        }

        let mut seen = HashMap::new();
        for (i, rule) in self.buckets.iter().enumerate() {
            if rule.requests_per_unit == 0 {
                return Err(WindowLimitError::Config(format!(
                    "bucket {}: requests_per_unit must be positive",
                    i
                )));
            }
            if rule.units == 0 {
                return Err(WindowLimitError::Config(format!(
                    "bucket {}: units must be positive",
                    i
                )));
            }
            if let Some(prev) = seen.insert(rule.window(), i) {
                return Err(WindowLimitError::Config(format!(
                    "buckets {} and {} share the window {:?}",
                    prev,
                    i,
                    rule.window()
                )));
            }
        }
        Ok(())
    }

    /// Buckets keyed by window, as consumed by the rate limiter.
    pub fn bucket_map(&self) -> HashMap<Duration, u64> {
        self.buckets
            .iter()
            .map(|rule| (rule.window(), rule.requests_per_unit))
            .collect()
    }
}
