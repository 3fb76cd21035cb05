//! Stockroom Test Utilities
//!
//! Shared test infrastructure for the Stockroom workspace:
//! - Proptest generators for product records and requests
//! - Recording and flaky message handlers
//! - Fixtures for the seeded single-product scenario
//! - Async polling helper for background consumers

pub use stockroom_core::{
    CacheConfig, EventConfig, EventError, NewProduct, Price, Product, ProductDto, ProductId,
    RetryConfig, StockroomError, StockroomResult, StoreConfig,
};
pub use stockroom_events::{Message, MessageHandler};
pub use stockroom_storage::{InMemoryCacheTransport, InMemoryRecordStore};

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// HANDLERS
// ============================================================================

/// Records every payload it sees and never fails.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads handled so far, in delivery order.
    pub fn payloads(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, message: &Message) -> Result<(), EventError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(message.payload.clone());
        }
        Ok(())
    }
}

/// Fails the first `failures` deliveries, then succeeds.
#[derive(Debug)]
pub struct FlakyHandler {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyHandler {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for FlakyHandler {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn handle(&self, message: &Message) -> Result<(), EventError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(EventError::Processing {
                channel: message.channel.clone(),
                reason: format!("flaky failure {}", call),
            });
        }
        Ok(())
    }
}

// ============================================================================
// ASYNC HELPERS
// ============================================================================

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// elapses. Returns whether the condition was met.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Stockroom types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_product_id() -> impl Strategy<Value = ProductId> {
        (1i64..10_000).prop_map(ProductId::new)
    }

    pub fn arb_price() -> impl Strategy<Value = Price> {
        (0i64..1_000_000).prop_map(Price::from_minor_units)
    }

    /// Names that never contain the default fail marker.
    pub fn arb_product_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,12}( [A-Z][a-z]{2,8})?".prop_filter("no fail marker", |name| {
            !name.contains("fail")
        })
    }

    pub fn arb_category() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["tools", "kitchen", "garden", "office", "toys"])
            .prop_map(String::from)
    }

    /// A create request without an id.
    pub fn arb_product_dto() -> impl Strategy<Value = ProductDto> {
        (arb_product_name(), arb_price(), arb_category())
            .prop_map(|(name, price, category)| ProductDto::new(name, price, category))
    }

    pub fn arb_product() -> impl Strategy<Value = Product> {
        (arb_product_id(), arb_product_name(), arb_price(), arb_category()).prop_map(
            |(id, name, price, category)| Product {
                id,
                name,
                price,
                category,
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    /// Product `{1, "A", 10, "x"}`.
    pub fn sample_product() -> Product {
        Product {
            id: ProductId::new(1),
            name: "A".to_string(),
            price: Price::from_minor_units(10),
            category: "x".to_string(),
        }
    }

    pub fn dto(name: &str, price: i64, category: &str) -> ProductDto {
        ProductDto::new(name, Price::from_minor_units(price), category)
    }

    /// An in-memory store holding only [`sample_product`].
    pub fn seeded_store() -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        if let Err(e) = store.seed([sample_product()]) {
            panic!("seeding an empty store failed: {}", e);
        }
        store
    }

    /// Config with fast retries and no store latency.
    pub fn fast_event_config() -> EventConfig {
        EventConfig {
            retry: RetryConfig::development(),
            ..EventConfig::default()
        }
    }
}
