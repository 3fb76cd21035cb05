//! Stockroom Storage - Record Store and Cache Layers
//!
//! Defines the record store abstraction the cache layers sit in front of,
//! an in-memory implementation with synthetic latency and call counters, a
//! timeout wrapper, and the cache module with both cache-aside strategies.

pub mod cache;
pub mod timed;

pub use cache::{
    CacheKeys, CacheRead, CacheSource, CacheStats, CacheTransport, InMemoryCacheTransport,
    ManualCacheStore, ReadThroughCache, StorageFetcher,
};
pub use timed::TimedRecordStore;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use stockroom_core::{NewProduct, Product, ProductId, StockroomResult, StorageError};

// ============================================================================
// RECORD STORE TRAIT
// ============================================================================

/// Durable persistence for product records.
///
/// The store owns identity assignment: `insert` hands out the id, `save`
/// replaces an existing record under its id. Lookups of missing records
/// return `Ok(None)`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a product by id.
    async fn find_by_id(&self, id: ProductId) -> StockroomResult<Option<Product>>;

    /// Get every product, in store iteration order.
    async fn find_all(&self) -> StockroomResult<Vec<Product>>;

    /// Persist a new product and assign its identity.
    async fn insert(&self, product: NewProduct) -> StockroomResult<Product>;

    /// Replace an existing product.
    async fn save(&self, product: Product) -> StockroomResult<Product>;

    /// Delete a product. Deleting a missing id is a no-op.
    async fn delete_by_id(&self, id: ProductId) -> StockroomResult<()>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn find_by_id(&self, id: ProductId) -> StockroomResult<Option<Product>> {
        (**self).find_by_id(id).await
    }

    async fn find_all(&self) -> StockroomResult<Vec<Product>> {
        (**self).find_all().await
    }

    async fn insert(&self, product: NewProduct) -> StockroomResult<Product> {
        (**self).insert(product).await
    }

    async fn save(&self, product: Product) -> StockroomResult<Product> {
        (**self).save(product).await
    }

    async fn delete_by_id(&self, id: ProductId) -> StockroomResult<()> {
        (**self).delete_by_id(id).await
    }
}

// ============================================================================
// CALL COUNTERS
// ============================================================================

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct StoreCallCounts {
    pub find_by_id: AtomicU64,
    pub find_all: AtomicU64,
    pub insert: AtomicU64,
    pub save: AtomicU64,
    pub delete_by_id: AtomicU64,
}

impl StoreCallCounts {
    pub fn snapshot(&self) -> StoreCallSnapshot {
        StoreCallSnapshot {
            find_by_id: self.find_by_id.load(Ordering::Relaxed),
            find_all: self.find_all.load(Ordering::Relaxed),
            insert: self.insert.load(Ordering::Relaxed),
            save: self.save.load(Ordering::Relaxed),
            delete_by_id: self.delete_by_id.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.find_by_id.store(0, Ordering::Relaxed);
        self.find_all.store(0, Ordering::Relaxed);
        self.insert.store(0, Ordering::Relaxed);
        self.save.store(0, Ordering::Relaxed);
        self.delete_by_id.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of store calls at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallSnapshot {
    pub find_by_id: u64,
    pub find_all: u64,
    pub insert: u64,
    pub save: u64,
    pub delete_by_id: u64,
}

impl StoreCallSnapshot {
    /// Reads that reached the store.
    pub fn reads(&self) -> u64 {
        self.find_by_id + self.find_all
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory record store.
///
/// Records are kept in id order. Every call sleeps for the configured
/// latency before touching the map, and the map lock is never held across
/// an await.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    products: RwLock<BTreeMap<ProductId, Product>>,
    next_id: AtomicI64,
    latency: Duration,
    unavailable: AtomicBool,
    calls: StoreCallCounts,
}

impl InMemoryRecordStore {
    /// Create an empty store with no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that sleeps `latency` on every call.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Load records with fixed ids, bypassing counters and latency.
    ///
    /// Later inserts are assigned ids above the highest seeded one.
    pub fn seed(&self, products: impl IntoIterator<Item = Product>) -> StockroomResult<()> {
        let mut map = self
            .products
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        for product in products {
            self.next_id.fetch_max(product.id.get(), Ordering::SeqCst);
            map.insert(product.id, product);
        }
        Ok(())
    }

    /// Make every subsequent call fail with `StorageError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> StoreCallSnapshot {
        self.calls.snapshot()
    }

    pub fn reset_calls(&self) {
        self.calls.reset();
    }

    /// Number of stored records, without counting as a call.
    pub fn len(&self) -> usize {
        self.products.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn enter(&self, counter: &AtomicU64) -> StockroomResult<()> {
        counter.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "record store marked unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_by_id(&self, id: ProductId) -> StockroomResult<Option<Product>> {
        self.enter(&self.calls.find_by_id).await?;
        let products = self.products.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(products.get(&id).cloned())
    }

    async fn find_all(&self) -> StockroomResult<Vec<Product>> {
        self.enter(&self.calls.find_all).await?;
        let products = self.products.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(products.values().cloned().collect())
    }

    async fn insert(&self, product: NewProduct) -> StockroomResult<Product> {
        self.enter(&self.calls.insert).await?;
        let id = ProductId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let product = product.with_id(id);
        let mut products = self
            .products
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        products.insert(id, product.clone());
        Ok(product)
    }

    async fn save(&self, product: Product) -> StockroomResult<Product> {
        self.enter(&self.calls.save).await?;
        let mut products = self
            .products
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let slot = products
            .get_mut(&product.id)
            .ok_or(StorageError::NotFound { id: product.id })?;
        *slot = product.clone();
        Ok(product)
    }

    async fn delete_by_id(&self, id: ProductId) -> StockroomResult<()> {
        self.enter(&self.calls.delete_by_id).await?;
        let mut products = self
            .products
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        products.remove(&id);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
