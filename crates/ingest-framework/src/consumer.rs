//! # Stream Consumer
//!
//! The `StreamConsumer` is the write path of the pipeline. It owns a durable
//! [`Subscription`] and, for every delivery, runs the same three steps:
//!
//! 1. **Decode** the payload with [`Record::decode`].
//! 2. **Store** the record through the [`RecordUpserter`].
//! 3. **Cache** the record in the [`LookupCache`], only after the store accepted it.
//!
//! The cache is a derived view of the store and must never hold a record the store does
//! not have, which is why step 3 depends on step 2.
//!
//! ## Per-message state machine
//!
//! ```text
//! Received ─► Decoded ─► Stored ─► Cached      ack   (success)
//!    │           │
//!    │           └─► StoreFailed               nack  (bus may redeliver)
//!    └─► DecodeFailed                          term  (dropped for good)
//! ```
//!
//! Nothing is retried here. Redelivery is the bus's job, and `put` is an upsert, so a
//! message seen twice ends in the same state as a message seen once.
//!
//! ## Concurrency Model
//!
//! One consumer task per subscription processes deliveries sequentially, in the same
//! receive-loop shape as an actor. The store call is the only await that may block for
//! long, and it happens before the cache is touched, so no cache lock is held during I/O.

use crate::bus::{Delivery, Subscription};
use crate::cache::LookupCache;
use crate::error::IngestError;
use crate::record::Record;
use crate::store::RecordUpserter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters describing what the consumer has done so far.
///
/// Cloning shares the counters, so a handle taken before the consumer is spawned keeps
/// observing it.
#[derive(Debug, Clone, Default)]
pub struct ConsumerStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    cached: AtomicU64,
    rejected: AtomicU64,
    store_failed: AtomicU64,
}

impl ConsumerStats {
    /// Deliveries that reached the cache.
    pub fn cached(&self) -> u64 {
        self.inner.cached.load(Ordering::Acquire)
    }

    /// Deliveries rejected as undecodable.
    pub fn rejected(&self) -> u64 {
        self.inner.rejected.load(Ordering::Acquire)
    }

    /// Deliveries whose store write failed.
    pub fn store_failed(&self) -> u64 {
        self.inner.store_failed.load(Ordering::Acquire)
    }

    /// Every delivery that reached a terminal state.
    pub fn settled(&self) -> u64 {
        self.cached() + self.rejected() + self.store_failed()
    }

    fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Cached => &self.inner.cached,
            Outcome::Rejected => &self.inner.rejected,
            Outcome::StoreFailed => &self.inner.store_failed,
        };
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// Terminal state of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Stored and cached; acked.
    Cached,
    /// Undecodable; terminated.
    Rejected,
    /// Store write failed; nacked.
    StoreFailed,
}

impl Outcome {
    fn of<Id>(result: &Result<Id, IngestError>) -> Self {
        match result {
            Ok(_) => Outcome::Cached,
            Err(IngestError::Decode(_)) => Outcome::Rejected,
            Err(IngestError::Store(_)) => Outcome::StoreFailed,
        }
    }
}

/// Drives decode → store → cache for every delivery of one subscription.
pub struct StreamConsumer<T: Record> {
    subscription: Subscription,
    store: Arc<dyn RecordUpserter<T>>,
    cache: LookupCache<T>,
    stats: ConsumerStats,
}

impl<T: Record> StreamConsumer<T> {
    pub fn new(
        subscription: Subscription,
        store: Arc<dyn RecordUpserter<T>>,
        cache: LookupCache<T>,
    ) -> Self {
        Self {
            subscription,
            store,
            cache,
            stats: ConsumerStats::default(),
        }
    }

    /// A shared handle to this consumer's counters.
    pub fn stats(&self) -> ConsumerStats {
        self.stats.clone()
    }

    /// Ingests one payload: decode, store, then cache.
    ///
    /// On error nothing has been written to the cache. On a store error the store
    /// itself guarantees nothing partial was written either.
    pub async fn process(&self, payload: &[u8]) -> Result<T::Id, IngestError> {
        let record = T::decode(payload)?;
        let id = record.id().clone();
        debug!(%id, "Decoded");

        self.store.put(&record).await?;
        debug!(%id, "Stored");

        let replaced = self.cache.put(record);
        debug!(%id, replaced, "Cached");
        Ok(id)
    }

    /// Runs the receive loop until `shutdown` fires or the subscription ends.
    ///
    /// Cancellation is cooperative: it is only observed between deliveries, so the
    /// delivery being processed when `shutdown` fires is finished and settled first.
    pub async fn run(mut self, shutdown: CancellationToken) {
        // Extract just the type name (e.g., "Order" instead of "order_service::model::Order")
        let record_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        let topic = self.subscription.topic().to_string();
        let durable_name = self.subscription.durable_name().to_string();
        info!(record_type, %topic, %durable_name, "Consumer started");

        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.subscription.next() => match next {
                    Some(delivery) => delivery,
                    None => {
                        warn!(record_type, %topic, "Subscription closed by bus");
                        break;
                    }
                },
            };
            self.handle(record_type, delivery).await;
        }

        info!(
            record_type,
            %topic,
            cached = self.stats.cached(),
            rejected = self.stats.rejected(),
            store_failed = self.stats.store_failed(),
            settled = self.stats.settled(),
            "Consumer stopped"
        );
    }

    async fn handle(&self, record_type: &str, delivery: Delivery) {
        let sequence = delivery.sequence();
        let attempt = delivery.attempt();

        let result = self.process(delivery.payload()).await;
        self.stats.record(Outcome::of(&result));

        match result {
            Ok(id) => {
                info!(record_type, %id, sequence, attempt, "Record ingested");
                delivery.ack();
            }
            Err(e) if e.is_permanent() => {
                warn!(record_type, sequence, error = %e, "Rejecting undecodable message");
                delivery.term();
            }
            Err(e) => {
                error!(record_type, sequence, attempt, error = %e, "Store write failed, leaving message for redelivery");
                delivery.nack();
            }
        }
    }
}
