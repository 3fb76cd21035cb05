//! Hand-written cache-aside reads.
//!
//! Each read issues its own cache `get`, converts the raw value, and on a
//! miss loads from the record store and issues a `set`. Nothing here is
//! invalidated by writes; the declarative coordinator owns invalidation
//! and both strategies share keys, so its evictions apply here too.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use stockroom_core::{ProductDto, ProductId, StockroomResult};
use tracing::{debug, info, warn};

use super::key::CacheKeys;
use super::traits::{decode_value, encode_value, CacheTransport};
use crate::RecordStore;

/// Manual cache-aside reads over a record store.
pub struct ManualCacheStore<S> {
    store: S,
    transport: Arc<dyn CacheTransport>,
    keys: CacheKeys,
}

impl<S: RecordStore> ManualCacheStore<S> {
    pub fn new(store: S, transport: Arc<dyn CacheTransport>, keys: CacheKeys) -> Self {
        Self {
            store,
            transport,
            keys,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get one product, caching it on a miss. Absent products are not
    /// cached.
    pub async fn get_by_id(&self, id: ProductId) -> StockroomResult<Option<ProductDto>> {
        let key = self.keys.per_id(id);
        if let Some(dto) = self.read::<ProductDto>(&key).await {
            info!(key = %key, "Fetched product from cache");
            return Ok(Some(dto));
        }

        let Some(product) = self.store.find_by_id(id).await? else {
            debug!(key = %key, "Product not found in record store");
            return Ok(None);
        };

        let dto = ProductDto::from(product);
        self.write(&key, &dto).await;
        info!(key = %key, "Fetched product from record store and cached it");
        Ok(Some(dto))
    }

    /// Get every product, caching the list on a miss.
    ///
    /// A cached value that does not convert to a product list is logged
    /// and treated as a miss; the fresh list then overwrites it.
    pub async fn get_all(&self) -> StockroomResult<Vec<ProductDto>> {
        let key = self.keys.collection();
        if let Some(products) = self.read::<Vec<ProductDto>>(&key).await {
            info!(key = %key, count = products.len(), "Fetched all products from cache");
            return Ok(products);
        }

        info!(key = %key, "Cache miss, fetching all products from record store");
        let products: Vec<ProductDto> = self
            .store
            .find_all()
            .await?
            .into_iter()
            .map(ProductDto::from)
            .collect();

        self.write(&key, &products).await;
        info!(key = %key, count = products.len(), "Cached all products");
        Ok(products)
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.transport.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                return None;
            }
        };

        match decode_value(key, raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Cache conversion failed, treating as miss");
                None
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = match encode_value(key, value) {
            Ok(encoded) => self.transport.set(key, encoded).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "Cache write failed");
        }
    }
}
