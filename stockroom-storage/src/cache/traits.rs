//! Cache transport trait and value conversion.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use stockroom_core::{CacheError, StockroomResult};

/// Key-value cache transport.
///
/// Implementations store JSON values under string keys and must be safe
/// to share across tasks. Every strategy in this crate talks to the cache
/// only through this trait, so an in-memory map and a networked cache are
/// interchangeable.
#[async_trait]
pub trait CacheTransport: Send + Sync {
    /// Get the value stored at `key`.
    async fn get(&self, key: &str) -> StockroomResult<Option<Value>>;

    /// Store `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> StockroomResult<()>;

    /// Remove `key`. Returns whether an entry was present.
    async fn delete(&self, key: &str) -> StockroomResult<bool>;

    /// Remove every key under `namespace`. Returns the number removed.
    async fn clear_namespace(&self, namespace: &str) -> StockroomResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> StockroomResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries removed by delete or clear.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Convert a cached value into `T`.
pub fn decode_value<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, CacheError> {
    serde_json::from_value(value).map_err(|e| CacheError::Conversion {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Convert `value` into its cached representation.
pub fn encode_value<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Value, CacheError> {
    serde_json::to_value(value).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
