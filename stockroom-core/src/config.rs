//! Configuration types
//!
//! Every section has production defaults, a `from_env()` constructor reading
//! `STOCKROOM_*` variables, and a `validate()` check run at bootstrap.

use crate::constants::*;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// CACHE
// ============================================================================

/// Cache policy shared by both caching strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace prefixing every key (`product::42`).
    pub namespace: String,
    /// Whether `delete` also evicts the collection key.
    ///
    /// Off by default: deletes only evict the per-id entry, so `get_all`
    /// may keep serving the deleted record until the next create or update.
    pub evict_collection_on_delete: bool,
    /// Whether bootstrap clears the namespace before serving.
    pub clear_on_startup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            evict_collection_on_delete: false,
            clear_on_startup: true,
        }
    }
}

impl CacheConfig {
    /// Environment variables:
    /// - `STOCKROOM_CACHE_NAMESPACE` (default: `product`)
    /// - `STOCKROOM_CACHE_EVICT_ALL_ON_DELETE` (default: false)
    /// - `STOCKROOM_CACHE_CLEAR_ON_STARTUP` (default: true)
    pub fn from_env() -> Self {
        Self {
            namespace: env_string("STOCKROOM_CACHE_NAMESPACE", DEFAULT_CACHE_NAMESPACE),
            evict_collection_on_delete: env_flag("STOCKROOM_CACHE_EVICT_ALL_ON_DELETE", false),
            clear_on_startup: env_flag("STOCKROOM_CACHE_CLEAR_ON_STARTUP", true),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_evict_collection_on_delete(mut self, enabled: bool) -> Self {
        self.evict_collection_on_delete = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("cache.namespace", &self.namespace)?;
        if self.namespace.contains(CACHE_KEY_SEPARATOR) {
            return Err(ConfigError::InvalidValue {
                field: "cache.namespace".to_string(),
                value: self.namespace.clone(),
                reason: format!("must not contain '{}'", CACHE_KEY_SEPARATOR),
            });
        }
        Ok(())
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// Latency and timeout applied to record store calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Synthetic latency added to every call.
    pub latency: Duration,
    /// Hard bound on every call, latency included.
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(DEFAULT_STORE_LATENCY_MS),
            timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

impl StoreConfig {
    /// Environment variables:
    /// - `STOCKROOM_STORE_LATENCY_MS` (default: 3000)
    /// - `STOCKROOM_STORE_TIMEOUT_MS` (default: 10000)
    pub fn from_env() -> Self {
        Self {
            latency: Duration::from_millis(env_or(
                "STOCKROOM_STORE_LATENCY_MS",
                DEFAULT_STORE_LATENCY_MS,
            )),
            timeout: Duration::from_millis(env_or(
                "STOCKROOM_STORE_TIMEOUT_MS",
                DEFAULT_STORE_TIMEOUT_MS,
            )),
        }
    }

    /// No latency and a short timeout, for tests and local runs.
    pub fn development() -> Self {
        Self {
            latency: Duration::ZERO,
            timeout: Duration::from_secs(1),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() || self.timeout <= self.latency {
            return Err(ConfigError::InvalidValue {
                field: "store.timeout".to_string(),
                value: format!("{:?}", self.timeout),
                reason: format!("must be greater than store.latency ({:?})", self.latency),
            });
        }
        Ok(())
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Retry policy for message processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total delivery attempts, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Environment variables:
    /// - `STOCKROOM_RETRY_MAX_ATTEMPTS` (default: 3)
    /// - `STOCKROOM_RETRY_INITIAL_BACKOFF_MS` (default: 100)
    /// - `STOCKROOM_RETRY_MAX_BACKOFF_MS` (default: 2000)
    /// - `STOCKROOM_RETRY_BACKOFF_MULTIPLIER` (default: 2.0)
    pub fn from_env() -> Self {
        Self {
            max_attempts: env_or("STOCKROOM_RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            initial_backoff: Duration::from_millis(env_or(
                "STOCKROOM_RETRY_INITIAL_BACKOFF_MS",
                DEFAULT_INITIAL_BACKOFF_MS,
            )),
            max_backoff: Duration::from_millis(env_or(
                "STOCKROOM_RETRY_MAX_BACKOFF_MS",
                DEFAULT_MAX_BACKOFF_MS,
            )),
            backoff_multiplier: env_or(
                "STOCKROOM_RETRY_BACKOFF_MULTIPLIER",
                DEFAULT_BACKOFF_MULTIPLIER,
            ),
        }
    }

    /// Millisecond backoffs so tests exercise the retry path quickly.
    pub fn development() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_multiplier".to_string(),
                value: self.backoff_multiplier.to_string(),
                reason: "must be a finite number >= 1.0".to_string(),
            });
        }
        if self.max_backoff < self.initial_backoff {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_backoff".to_string(),
                value: format!("{:?}", self.max_backoff),
                reason: "must not be smaller than retry.initial_backoff".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Channels, transport sizing and consumer behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Channel receiving product change events.
    pub product_channel: String,
    /// Channel with the audit listener.
    pub audit_channel: String,
    /// Buffered messages per channel before slow subscribers lag.
    pub channel_capacity: usize,
    /// Partitions per channel.
    pub partitions: u32,
    /// Messages retained per channel; older ones are dropped.
    pub retention: usize,
    /// Payload marker the product handler rejects.
    pub fail_marker: String,
    pub retry: RetryConfig,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            product_channel: DEFAULT_PRODUCT_CHANNEL.to_string(),
            audit_channel: DEFAULT_AUDIT_CHANNEL.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            partitions: DEFAULT_PARTITIONS,
            retention: DEFAULT_CHANNEL_RETENTION,
            fail_marker: DEFAULT_FAIL_MARKER.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl EventConfig {
    /// Environment variables:
    /// - `STOCKROOM_PRODUCT_CHANNEL` (default: `product-topic`)
    /// - `STOCKROOM_AUDIT_CHANNEL` (default: `demo-topic`)
    /// - `STOCKROOM_CHANNEL_CAPACITY` (default: 1024)
    /// - `STOCKROOM_CHANNEL_PARTITIONS` (default: 1)
    /// - `STOCKROOM_CHANNEL_RETENTION` (default: 10000)
    /// - `STOCKROOM_FAIL_MARKER` (default: `fail`)
    /// - retry settings, see [`RetryConfig::from_env`]
    pub fn from_env() -> Self {
        Self {
            product_channel: env_string("STOCKROOM_PRODUCT_CHANNEL", DEFAULT_PRODUCT_CHANNEL),
            audit_channel: env_string("STOCKROOM_AUDIT_CHANNEL", DEFAULT_AUDIT_CHANNEL),
            channel_capacity: env_or("STOCKROOM_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY),
            partitions: env_or("STOCKROOM_CHANNEL_PARTITIONS", DEFAULT_PARTITIONS),
            retention: env_or("STOCKROOM_CHANNEL_RETENTION", DEFAULT_CHANNEL_RETENTION),
            fail_marker: env_string("STOCKROOM_FAIL_MARKER", DEFAULT_FAIL_MARKER),
            retry: RetryConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("events.product_channel", &self.product_channel)?;
        require_non_empty("events.audit_channel", &self.audit_channel)?;
        require_non_empty("events.fail_marker", &self.fail_marker)?;
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "events.channel_capacity".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.partitions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "events.partitions".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.retention < self.channel_capacity {
            return Err(ConfigError::InvalidValue {
                field: "events.retention".to_string(),
                value: self.retention.to_string(),
                reason: format!(
                    "must be at least events.channel_capacity ({})",
                    self.channel_capacity
                ),
            });
        }
        if self.product_channel.ends_with(DEAD_LETTER_SUFFIX) {
            return Err(ConfigError::InvalidValue {
                field: "events.product_channel".to_string(),
                value: self.product_channel.clone(),
                reason: "must not be a dead-letter channel".to_string(),
            });
        }
        self.retry.validate()
    }
}
