//! Deadline enforcement for record store calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use stockroom_core::{NewProduct, Product, ProductId, StockroomResult, StorageError};
use tracing::warn;

use crate::RecordStore;

/// Wraps a [`RecordStore`] and fails any call that outlives `timeout`.
///
/// A timed-out call surfaces as `StorageError::Timeout`; the caller never
/// sees a partial result and the coordinator skips the cache and event
/// steps that would follow a successful write.
#[derive(Debug, Clone)]
pub struct TimedRecordStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: RecordStore> TimedRecordStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> StockroomResult<T>
    where
        F: Future<Output = StockroomResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Record store call timed out"
                );
                Err(StorageError::Timeout {
                    operation,
                    after: self.timeout,
                }
                .into())
            }
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for TimedRecordStore<S> {
    async fn find_by_id(&self, id: ProductId) -> StockroomResult<Option<Product>> {
        self.bounded("find_by_id", self.inner.find_by_id(id)).await
    }

    async fn find_all(&self) -> StockroomResult<Vec<Product>> {
        self.bounded("find_all", self.inner.find_all()).await
    }

    async fn insert(&self, product: NewProduct) -> StockroomResult<Product> {
        self.bounded("insert", self.inner.insert(product)).await
    }

    async fn save(&self, product: Product) -> StockroomResult<Product> {
        self.bounded("save", self.inner.save(product)).await
    }

    async fn delete_by_id(&self, id: ProductId) -> StockroomResult<()> {
        self.bounded("delete_by_id", self.inner.delete_by_id(id)).await
    }
}
