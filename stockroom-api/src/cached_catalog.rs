//! Declarative Cache Coordinator
//!
//! Wraps the record store with a fixed cache policy per operation and
//! announces every successful mutation on the change channel.
//!
//! | operation   | per-id entry           | collection entry          |
//! |-------------|------------------------|---------------------------|
//! | `get_by_id` | read-through           | untouched                 |
//! | `get_all`   | untouched              | read-through              |
//! | `create`    | not populated          | evicted                   |
//! | `update`    | replaced (evicted if absent) | evicted             |
//! | `delete`    | evicted                | evicted only if configured |
//!
//! Every mutation runs store write, then cache, then publish. Only store
//! errors reach the caller.

use stockroom_core::{CacheConfig, ChangeEvent, ProductDto, ProductId, StockroomResult};
use stockroom_events::ChangeEventPublisher;
use stockroom_storage::cache::{AllProductsFetcher, ProductByIdFetcher};
use stockroom_storage::{CacheRead, CacheStats, ReadThroughCache, RecordStore};
use tracing::info;

/// Record store fronted by the declarative cache policy.
pub struct DeclarativeCacheCoordinator<S> {
    store: S,
    cache: ReadThroughCache,
    publisher: ChangeEventPublisher,
    evict_collection_on_delete: bool,
}

impl<S: RecordStore> DeclarativeCacheCoordinator<S> {
    pub fn new(
        store: S,
        cache: ReadThroughCache,
        publisher: ChangeEventPublisher,
        config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            evict_collection_on_delete: config.evict_collection_on_delete,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Get one product. Absent products are never cached.
    pub async fn get_by_id(&self, id: ProductId) -> StockroomResult<Option<ProductDto>> {
        let key = self.cache.keys().per_id(id);
        let fetcher = ProductByIdFetcher::new(&self.store, id);
        let read = self.cache.get::<ProductDto, _>(&key, &fetcher).await?;
        Ok(read.map(CacheRead::into_value))
    }

    /// Get every product in store order.
    pub async fn get_all(&self) -> StockroomResult<Vec<ProductDto>> {
        let key = self.cache.keys().collection();
        let fetcher = AllProductsFetcher::new(&self.store);
        let read = self.cache.get::<Vec<ProductDto>, _>(&key, &fetcher).await?;
        Ok(read.map(CacheRead::into_value).unwrap_or_default())
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Insert a product. Any id on `dto` is ignored.
    pub async fn create(&self, dto: ProductDto) -> StockroomResult<ProductDto> {
        let saved = self.store.insert(dto.into_new_product()).await?;

        self.cache.evict(&self.cache.keys().collection()).await;
        self.publisher
            .publish_or_log(&ChangeEvent::created(&saved))
            .await;

        info!(product_id = %saved.id, name = %saved.name, "Product created");
        Ok(ProductDto::from(saved))
    }

    /// Apply `dto`'s name and price to product `id`.
    ///
    /// Returns `None` when the product does not exist; no event is sent in
    /// that case.
    pub async fn update(&self, id: ProductId, dto: ProductDto) -> StockroomResult<Option<ProductDto>> {
        let per_id = self.cache.keys().per_id(id);

        let Some(mut product) = self.store.find_by_id(id).await? else {
            self.cache.evict(&per_id).await;
            info!(product_id = %id, "Update skipped, product not found");
            return Ok(None);
        };

        product.apply_update(&dto);
        let saved = self.store.save(product).await?;
        let updated = ProductDto::from(&saved);

        self.cache.put(&per_id, &updated).await;
        self.cache.evict(&self.cache.keys().collection()).await;
        self.publisher
            .publish_or_log(&ChangeEvent::updated(&saved))
            .await;

        info!(product_id = %id, name = %saved.name, "Product updated");
        Ok(Some(updated))
    }

    /// Delete product `id`. Deleting a missing product still evicts and
    /// announces.
    pub async fn delete(&self, id: ProductId) -> StockroomResult<()> {
        self.store.delete_by_id(id).await?;

        self.cache.evict(&self.cache.keys().per_id(id)).await;
        if self.evict_collection_on_delete {
            self.cache.evict(&self.cache.keys().collection()).await;
        }
        self.publisher
            .publish_or_log(&ChangeEvent::deleted(id))
            .await;

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    // ========================================================================
    // ADMINISTRATION
    // ========================================================================

    /// Remove every entry in the cache namespace. Returns the number removed.
    pub async fn clear_all(&self) -> u64 {
        let removed = self.cache.clear().await;
        info!(
            namespace = self.cache.keys().namespace(),
            removed,
            "Product cache cleared"
        );
        removed
    }

    /// Startup step: drop whatever a previous process left in the cache.
    pub async fn clear_on_startup(&self) -> u64 {
        let removed = self.cache.clear().await;
        info!(
            namespace = self.cache.keys().namespace(),
            removed,
            "Cache cleared on startup"
        );
        removed
    }

    pub async fn cache_stats(&self) -> StockroomResult<CacheStats> {
        self.cache.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stockroom_core::{Price, Product};
    use stockroom_events::{ChannelTransport, InMemoryBroker};
    use stockroom_storage::{CacheKeys, CacheTransport, InMemoryCacheTransport, InMemoryRecordStore};

    struct Fixture {
        records: Arc<InMemoryRecordStore>,
        transport: Arc<InMemoryCacheTransport>,
        broker: Arc<InMemoryBroker>,
        catalog: DeclarativeCacheCoordinator<Arc<InMemoryRecordStore>>,
    }

    fn fixture(config: CacheConfig) -> Fixture {
        let records = Arc::new(InMemoryRecordStore::new());
        records
            .seed([Product {
                id: ProductId::new(1),
                name: "A".to_string(),
                price: Price::from_minor_units(10),
                category: "x".to_string(),
            }])
            .unwrap();
        let transport = Arc::new(InMemoryCacheTransport::new());
        let broker = Arc::new(InMemoryBroker::default());
        let catalog = DeclarativeCacheCoordinator::new(
            records.clone(),
            ReadThroughCache::new(transport.clone(), CacheKeys::new(config.namespace.clone())),
            ChangeEventPublisher::new(broker.clone(), "product-topic"),
            &config,
        );
        Fixture {
            records,
            transport,
            broker,
            catalog,
        }
    }

    fn payloads(broker: &InMemoryBroker) -> Vec<String> {
        broker
            .published("product-topic")
            .into_iter()
            .map(|m| m.payload)
            .collect()
    }

    #[tokio::test]
    async fn test_update_replaces_entry_without_store_read() {
        let f = fixture(CacheConfig::default());
        f.catalog.get_by_id(ProductId::new(1)).await.unwrap();
        f.catalog.get_all().await.unwrap();
        f.records.reset_calls();

        let updated = f
            .catalog
            .update(
                ProductId::new(1),
                ProductDto::new("B", Price::from_minor_units(20), ""),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.category, "x");
        assert!(!f.transport.contains("product::all"));

        f.records.reset_calls();
        let read = f.catalog.get_by_id(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(read.name, "B");
        assert_eq!(read.price, Price::from_minor_units(20));
        assert_eq!(f.records.calls().reads(), 0);
        assert_eq!(payloads(&f.broker), vec!["Product updated: B"]);
    }

    #[tokio::test]
    async fn test_update_missing_evicts_and_stays_silent() {
        let f = fixture(CacheConfig::default());
        f.transport
            .set("product::5", serde_json::json!({"name": "ghost", "price": 1}))
            .await
            .unwrap();

        let result = f
            .catalog
            .update(ProductId::new(5), ProductDto::new("B", Price::from_minor_units(1), ""))
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(!f.transport.contains("product::5"));
        assert!(payloads(&f.broker).is_empty());
    }

    #[tokio::test]
    async fn test_delete_respects_collection_policy() {
        let keep = fixture(CacheConfig::default());
        keep.catalog.get_all().await.unwrap();
        keep.catalog.get_by_id(ProductId::new(1)).await.unwrap();
        keep.catalog.delete(ProductId::new(1)).await.unwrap();
        assert!(!keep.transport.contains("product::1"));
        assert!(keep.transport.contains("product::all"));

        let evict = fixture(CacheConfig::default().with_evict_collection_on_delete(true));
        evict.catalog.get_all().await.unwrap();
        evict.catalog.delete(ProductId::new(1)).await.unwrap();
        assert!(!evict.transport.contains("product::all"));
        assert_eq!(payloads(&evict.broker), vec!["Product deleted with ID: 1"]);
    }

    #[tokio::test]
    async fn test_clear_all_counts_namespace_entries() {
        let f = fixture(CacheConfig::default());
        f.catalog.get_all().await.unwrap();
        f.catalog.get_by_id(ProductId::new(1)).await.unwrap();

        assert_eq!(f.catalog.clear_all().await, 2);
        assert!(f.transport.is_empty());
        assert_eq!(f.catalog.clear_on_startup().await, 0);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_mutation() {
        let f = fixture(CacheConfig::default());
        f.broker.close();

        let created = f
            .catalog
            .create(ProductDto::new("C", Price::from_minor_units(5), "y"))
            .await
            .unwrap();
        assert_eq!(created.id, Some(ProductId::new(2)));
        assert_eq!(f.records.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_stats_track_hits() {
        let f = fixture(CacheConfig::default());
        f.catalog.get_by_id(ProductId::new(1)).await.unwrap();
        f.catalog.get_by_id(ProductId::new(1)).await.unwrap();

        let stats = f.catalog.cache_stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }
}
