use crate::config::Config;
use crate::model::Order;
use ingest_framework::{
    warm, BootstrapError, BusError, ConsumerStats, LookupCache, RecordStore, StreamConsumer,
    Subscriber,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What [`OrderService::start`] needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub topic: String,
    pub durable_name: String,
    pub shutdown_grace: Duration,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            topic: config.bus.topic.clone(),
            durable_name: config.bus.durable_name.clone(),
            shutdown_grace: config.shutdown_grace,
        }
    }
}

/// The service never became ready.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Cache warm-up failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("Subscription failed: {0}")]
    Subscribe(#[from] BusError),
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Consumer task failed: {0}")]
    Consumer(#[from] tokio::task::JoinError),
}

/// The composition root of the order pipeline.
///
/// `OrderService` owns:
/// - **The cache**: created here, warmed here, handed to readers through [`cache`](Self::cache)
/// - **The consumer task**: decode → store → cache for every order on the topic
/// - **Shutdown**: a cancellation token plus the consumer's task handle
///
/// # Startup order
///
/// 1. Warm the cache from the store. Failure aborts startup.
/// 2. Subscribe with the durable name.
/// 3. Spawn the consumer.
///
/// Only after [`start`](Self::start) returns is a cache handle available, so nothing can
/// read a partially warmed cache, and no streamed order can be overwritten by a bulk load
/// still in progress.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(RedbOrderStore::open("orders.redb")?);
/// let bus = InMemoryBus::default();
/// let service = OrderService::start(settings, store, &bus).await?;
///
/// let router = build_router(service.cache(), timeout);
/// // ... serve ...
///
/// service.shutdown().await?;
/// ```
pub struct OrderService {
    cache: LookupCache<Order>,
    stats: ConsumerStats,
    shutdown: CancellationToken,
    consumer: JoinHandle<()>,
    grace: Duration,
}

impl OrderService {
    pub async fn start<S, B>(
        settings: ServiceSettings,
        store: Arc<S>,
        bus: &B,
    ) -> Result<Self, StartupError>
    where
        S: RecordStore<Order> + 'static,
        B: Subscriber + ?Sized,
    {
        let cache = LookupCache::new();

        // 1. Bootstrap before anything can observe the cache
        let warmed = warm(store.as_ref(), &cache).await?;

        // 2. Durable subscription
        let subscription = bus
            .subscribe(&settings.topic, &settings.durable_name)
            .await?;

        // 3. Consumer task
        let consumer = StreamConsumer::new(subscription, store, cache.clone());
        let stats = consumer.stats();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(shutdown.clone()));

        info!(
            warmed,
            topic = %settings.topic,
            durable_name = %settings.durable_name,
            "Order service ready"
        );

        Ok(Self {
            cache,
            stats,
            shutdown,
            consumer: handle,
            grace: settings.shutdown_grace,
        })
    }

    /// Read handle for the gateway.
    pub fn cache(&self) -> LookupCache<Order> {
        self.cache.clone()
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats.clone()
    }

    /// Stops the consumer and releases the subscription and the store.
    ///
    /// The order being processed gets up to the grace period to finish. After that the
    /// task is aborted; an order that reached the store but not the cache is picked up
    /// by the next warm-up.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        info!("Shutting down order service...");
        self.shutdown.cancel();

        let mut consumer = self.consumer;
        match tokio::time::timeout(self.grace, &mut consumer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "Consumer task failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!(grace_ms = self.grace.as_millis() as u64, "Consumer did not stop in time, aborting");
                consumer.abort();
                // An aborted task reports a cancelled JoinError, which is expected here.
                let _ = consumer.await;
            }
        }

        info!(
            cached = self.stats.cached(),
            rejected = self.stats.rejected(),
            store_failed = self.stats.store_failed(),
            "Order service stopped"
        );
        Ok(())
    }
}
