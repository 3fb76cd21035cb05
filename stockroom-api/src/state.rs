//! Shared application state and startup wiring.

use std::sync::Arc;

use stockroom_events::{
    AuditLogHandler, ChangeEventConsumer, ChangeEventPublisher, InMemoryBroker, ProductEventHandler,
    RetryPolicy,
};
use stockroom_core::StockroomResult;
use stockroom_storage::{
    CacheKeys, InMemoryCacheTransport, InMemoryRecordStore, ManualCacheStore, ReadThroughCache,
    TimedRecordStore,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cached_catalog::DeclarativeCacheCoordinator;
use crate::config::AppConfig;

/// Record store as seen by the cache layers: every call deadline-bounded.
pub type CatalogStore = TimedRecordStore<Arc<InMemoryRecordStore>>;

/// The declarative strategy used by the main product routes.
pub type Catalog = DeclarativeCacheCoordinator<CatalogStore>;

/// The manual strategy behind the `/manual` routes.
pub type ManualCatalog = ManualCacheStore<CatalogStore>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub manual: Arc<ManualCatalog>,
    /// Undecorated store, for call counters and seeding.
    pub records: Arc<InMemoryRecordStore>,
    /// Shared by both cache strategies.
    pub cache: Arc<InMemoryCacheTransport>,
    pub broker: Arc<InMemoryBroker>,
    pub consumer: ChangeEventConsumer,
    pub start_time: std::time::Instant,
}

crate::impl_from_ref!(Arc<Catalog>, catalog);
crate::impl_from_ref!(Arc<ManualCatalog>, manual);
crate::impl_from_ref!(Arc<InMemoryCacheTransport>, cache);
crate::impl_from_ref!(ChangeEventConsumer, consumer);
crate::impl_from_ref!(std::time::Instant, start_time);

/// A running application: its state plus the listener tasks it started.
pub struct Bootstrapped {
    pub state: AppState,
    pub consumers: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Validate configuration, build every component, clear the cache if
    /// configured, and start the product and audit listeners.
    ///
    /// Listeners run until `shutdown` flips to `true`.
    pub async fn bootstrap(
        config: &AppConfig,
        shutdown: watch::Receiver<bool>,
    ) -> StockroomResult<Bootstrapped> {
        Self::bootstrap_with(config, Arc::new(InMemoryCacheTransport::new()), shutdown).await
    }

    /// Like [`AppState::bootstrap`], but on an existing cache transport.
    ///
    /// The cache outlives the returned state, so entries written by an
    /// earlier session are visible until the startup clear removes them.
    pub async fn bootstrap_with(
        config: &AppConfig,
        cache: Arc<InMemoryCacheTransport>,
        shutdown: watch::Receiver<bool>,
    ) -> StockroomResult<Bootstrapped> {
        config.validate()?;

        let records = Arc::new(InMemoryRecordStore::with_latency(config.store.latency));
        let store = TimedRecordStore::new(records.clone(), config.store.timeout);

        let keys = CacheKeys::new(config.cache.namespace.clone());
        let broker = Arc::new(InMemoryBroker::from_config(&config.events));

        let catalog = Arc::new(DeclarativeCacheCoordinator::new(
            store.clone(),
            ReadThroughCache::new(cache.clone(), keys.clone()),
            ChangeEventPublisher::new(broker.clone(), config.events.product_channel.clone()),
            &config.cache,
        ));
        let manual = Arc::new(ManualCacheStore::new(store, cache.clone(), keys));

        if config.cache.clear_on_startup {
            catalog.clear_on_startup().await;
        }

        let consumer = ChangeEventConsumer::new(
            broker.clone(),
            RetryPolicy::from_config(&config.events.retry),
        );
        let consumers = vec![
            consumer.spawn(
                &config.events.product_channel,
                Arc::new(ProductEventHandler::new(config.events.fail_marker.clone())),
                shutdown.clone(),
            )?,
            consumer.spawn(
                &config.events.audit_channel,
                Arc::new(AuditLogHandler),
                shutdown,
            )?,
        ];

        tracing::info!(
            namespace = %config.cache.namespace,
            product_channel = %config.events.product_channel,
            audit_channel = %config.events.audit_channel,
            "Application state bootstrapped"
        );

        Ok(Bootstrapped {
            state: AppState {
                catalog,
                manual,
                records,
                cache,
                broker,
                consumer,
                start_time: std::time::Instant::now(),
            },
            consumers,
        })
    }
}
