//! In-memory cache transport backed by a concurrent map.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use stockroom_core::constants::CACHE_KEY_SEPARATOR;
use stockroom_core::{CacheError, StockroomResult};

use super::traits::{CacheStats, CacheTransport};

/// Process-local [`CacheTransport`].
///
/// Entries never expire; they leave only through `delete` or
/// `clear_namespace`. The transport can be switched into a failing mode
/// to exercise callers that must tolerate cache outages.
#[derive(Debug, Default)]
pub struct InMemoryCacheTransport {
    entries: DashMap<String, Value>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryCacheTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `CacheError::Transport`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Read an entry without touching hit or miss counters.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> StockroomResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Transport {
                reason: "cache transport marked unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl CacheTransport for InMemoryCacheTransport {
    async fn get(&self, key: &str) -> StockroomResult<Option<Value>> {
        self.check_available()?;
        let value = self.entries.get(key).map(|e| e.value().clone());
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> StockroomResult<()> {
        self.check_available()?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StockroomResult<bool> {
        self.check_available()?;
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    async fn clear_namespace(&self, namespace: &str) -> StockroomResult<u64> {
        self.check_available()?;
        let prefix = format!("{}{}", namespace, CACHE_KEY_SEPARATOR);
        // Collect first; removing while iterating would deadlock on a shard.
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0u64;
        for key in doomed {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        self.evictions.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    async fn stats(&self) -> StockroomResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
