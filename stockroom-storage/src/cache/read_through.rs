//! Read-through cache used by the declarative strategy.
//!
//! Reads check the cache first and fall back to a [`StorageFetcher`] on a
//! miss, writing the fetched value back. Absent records are not cached.
//! Cache transport failures never reach the caller: a failed read is a
//! miss, a failed write or eviction is logged and skipped.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use stockroom_core::{ProductDto, ProductId, StockroomResult};
use tracing::{debug, warn};

use super::key::CacheKeys;
use super::read::CacheRead;
use super::traits::{decode_value, encode_value, CacheStats, CacheTransport};
use crate::RecordStore;

/// Loads the value for one cache key from the record store.
#[async_trait]
pub trait StorageFetcher<T>: Send + Sync {
    async fn fetch(&self) -> StockroomResult<Option<T>>;
}

/// Fetches a single product as a DTO.
pub struct ProductByIdFetcher<'a, S: ?Sized> {
    store: &'a S,
    id: ProductId,
}

impl<'a, S: RecordStore + ?Sized> ProductByIdFetcher<'a, S> {
    pub fn new(store: &'a S, id: ProductId) -> Self {
        Self { store, id }
    }
}

#[async_trait]
impl<'a, S: RecordStore + ?Sized> StorageFetcher<ProductDto> for ProductByIdFetcher<'a, S> {
    async fn fetch(&self) -> StockroomResult<Option<ProductDto>> {
        Ok(self.store.find_by_id(self.id).await?.map(ProductDto::from))
    }
}

/// Fetches the full product collection. An empty store yields an empty
/// list, which is cached like any other value.
pub struct AllProductsFetcher<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> AllProductsFetcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<'a, S: RecordStore + ?Sized> StorageFetcher<Vec<ProductDto>> for AllProductsFetcher<'a, S> {
    async fn fetch(&self) -> StockroomResult<Option<Vec<ProductDto>>> {
        let products = self.store.find_all().await?;
        Ok(Some(products.into_iter().map(ProductDto::from).collect()))
    }
}

/// Get-or-fetch cache over a [`CacheTransport`].
#[derive(Clone)]
pub struct ReadThroughCache {
    transport: Arc<dyn CacheTransport>,
    keys: CacheKeys,
}

impl fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl ReadThroughCache {
    pub fn new(transport: Arc<dyn CacheTransport>, keys: CacheKeys) -> Self {
        Self { transport, keys }
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn transport(&self) -> &Arc<dyn CacheTransport> {
        &self.transport
    }

    /// Get the value at `key`, falling back to `storage` on a miss.
    ///
    /// Returns `Ok(None)` when the record store has nothing; only record
    /// store errors propagate.
    pub async fn get<T, S>(&self, key: &str, storage: &S) -> StockroomResult<Option<CacheRead<T>>>
    where
        T: Serialize + DeserializeOwned + Send,
        S: StorageFetcher<T> + ?Sized,
    {
        if let Some(value) = self.lookup::<T>(key).await {
            debug!(key, "Cache hit");
            return Ok(Some(CacheRead::from_cache(value)));
        }

        debug!(key, "Cache miss, loading from record store");
        match storage.fetch().await? {
            Some(value) => {
                self.put(key, &value).await;
                Ok(Some(CacheRead::from_storage(value)))
            }
            None => Ok(None),
        }
    }

    /// Read and convert the entry at `key`.
    ///
    /// Transport failures and unconvertible entries are logged and reported
    /// as a miss.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.transport.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match decode_value(key, raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Cached value could not be converted, treating as miss");
                None
            }
        }
    }

    /// Write `value` at `key`.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let encoded = match encode_value(key, value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, error = %e, "Skipping cache write");
                return;
            }
        };
        if let Err(e) = self.transport.set(key, encoded).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    /// Remove the entry at `key`. Returns whether one was removed.
    pub async fn evict(&self, key: &str) -> bool {
        match self.transport.delete(key).await {
            Ok(removed) => {
                debug!(key, removed, "Cache entry evicted");
                removed
            }
            Err(e) => {
                warn!(key, error = %e, "Cache eviction failed");
                false
            }
        }
    }

    /// Remove every entry in this cache's namespace.
    pub async fn clear(&self) -> u64 {
        let namespace = self.keys.namespace();
        match self.transport.clear_namespace(namespace).await {
            Ok(removed) => {
                debug!(namespace, removed, "Cache namespace cleared");
                removed
            }
            Err(e) => {
                warn!(namespace, error = %e, "Cache clear failed");
                0
            }
        }
    }

    pub async fn stats(&self) -> StockroomResult<CacheStats> {
        self.transport.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheTransport;
    use crate::InMemoryRecordStore;
    use serde_json::json;
    use stockroom_core::{Price, Product};

    fn setup() -> (Arc<InMemoryCacheTransport>, ReadThroughCache, InMemoryRecordStore) {
        let transport = Arc::new(InMemoryCacheTransport::new());
        let cache = ReadThroughCache::new(transport.clone(), CacheKeys::default());
        let store = InMemoryRecordStore::new();
        store
            .seed([Product {
                id: ProductId::new(1),
                name: "A".to_string(),
                price: Price::from_minor_units(10),
                category: "x".to_string(),
            }])
            .unwrap();
        (transport, cache, store)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (transport, cache, store) = setup();
        let key = cache.keys().per_id(ProductId::new(1));
        let fetcher = ProductByIdFetcher::new(&store, ProductId::new(1));

        let first = cache.get(&key, &fetcher).await.unwrap().unwrap();
        assert!(first.was_cache_miss());
        assert!(transport.contains("product::1"));

        let second = cache.get(&key, &fetcher).await.unwrap().unwrap();
        assert!(second.was_cache_hit());
        assert_eq!(first.value(), second.value());
        assert_eq!(store.calls().find_by_id, 1);
    }

    #[tokio::test]
    async fn test_absent_record_is_not_cached() {
        let (transport, cache, store) = setup();
        let key = cache.keys().per_id(ProductId::new(2));
        let fetcher = ProductByIdFetcher::new(&store, ProductId::new(2));

        assert!(cache.get(&key, &fetcher).await.unwrap().is_none());
        assert!(!transport.contains("product::2"));
        assert!(cache.get(&key, &fetcher).await.unwrap().is_none());
        assert_eq!(store.calls().find_by_id, 2);
    }

    #[tokio::test]
    async fn test_unconvertible_entry_is_a_miss() {
        let (transport, cache, store) = setup();
        let key = cache.keys().collection();
        transport.set(&key, json!("garbage")).await.unwrap();

        let read = cache
            .get(&key, &AllProductsFetcher::new(&store))
            .await
            .unwrap()
            .unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(read.value().len(), 1);
        assert_eq!(store.calls().find_all, 1);
    }

    #[tokio::test]
    async fn test_transport_outage_falls_back_to_store() {
        let (transport, cache, store) = setup();
        transport.set_unavailable(true);
        let key = cache.keys().per_id(ProductId::new(1));

        let read = cache
            .get(&key, &ProductByIdFetcher::new(&store, ProductId::new(1)))
            .await
            .unwrap()
            .unwrap();
        assert!(read.was_cache_miss());
        assert!(!cache.evict(&key).await);
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test]
    async fn test_clear_removes_namespace() {
        let (transport, cache, store) = setup();
        let key = cache.keys().collection();
        cache
            .get(&key, &AllProductsFetcher::new(&store))
            .await
            .unwrap();
        transport.set("other::1", json!(1)).await.unwrap();

        assert_eq!(cache.clear().await, 1);
        assert_eq!(transport.keys(), vec!["other::1"]);
    }
}
