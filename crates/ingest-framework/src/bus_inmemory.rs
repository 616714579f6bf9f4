//! # In-Process Durable Bus
//!
//! [`InMemoryBus`] implements [`Publisher`] and [`Subscriber`] inside the process. It is
//! not a network transport; it stands in for one in tests and single-node deployments and
//! reproduces the delivery semantics the consumer has to be safe under.
//!
//! ## Semantics
//!
//! - Every published message is retained in its topic log and gets a per-topic sequence.
//! - Each durable name owns a queue. The queue lives on after the subscription is dropped,
//!   so a restarted consumer resumes where the previous one stopped.
//! - A durable name seen for the first time starts from the beginning of the topic log.
//! - One message is in flight per subscription. The next one is sent only after the
//!   previous delivery is settled.
//! - `Nack` (or a dropped delivery) puts the message back at the head of the queue after
//!   [`BusConfig::redelivery_delay`]. After [`BusConfig::max_deliveries`] attempts it is
//!   dropped and logged.
//! - `Term` drops the message immediately.
//! - The topic log is kept for the lifetime of the bus and never truncated, so memory
//!   grows with the number of messages published. [`InMemoryBus::backlog`] reports what a
//!   durable name still has queued.
//!
//! Each subscription is served by its own pump task. The topic map is guarded by a
//! `parking_lot::Mutex` that is never held across an `.await`.

use crate::bus::{Delivery, Publisher, Settlement, Subscriber, Subscription};
use crate::error::BusError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Redelivery policy of the bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Total delivery attempts per message, first delivery included.
    pub max_deliveries: u32,
    /// Pause before a nacked message is offered again.
    pub redelivery_delay: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            redelivery_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
struct Message {
    sequence: u64,
    payload: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Pending {
    message: Arc<Message>,
    /// Attempts already made.
    attempts: u32,
}

struct DurableState {
    queue: VecDeque<Pending>,
    generation: u64,
    active: bool,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct TopicState {
    log: Vec<Arc<Message>>,
    durables: HashMap<String, DurableState>,
}

enum Next {
    Ready(Pending),
    Empty,
    Superseded,
}

struct Inner {
    topics: Mutex<HashMap<String, TopicState>>,
    config: BusConfig,
    shutdown: CancellationToken,
}

impl Inner {
    fn next(&self, topic: &str, durable_name: &str, generation: u64) -> Next {
        let mut topics = self.topics.lock();
        let Some(durable) = topics
            .get_mut(topic)
            .and_then(|t| t.durables.get_mut(durable_name))
        else {
            return Next::Superseded;
        };
        if durable.generation != generation {
            return Next::Superseded;
        }
        match durable.queue.pop_front() {
            Some(pending) => Next::Ready(pending),
            None => Next::Empty,
        }
    }

    fn requeue_front(&self, topic: &str, durable_name: &str, pending: Pending) {
        let mut topics = self.topics.lock();
        if let Some(durable) = topics
            .get_mut(topic)
            .and_then(|t| t.durables.get_mut(durable_name))
        {
            durable.queue.push_front(pending);
            durable.notify.notify_one();
        }
    }

    fn release(&self, topic: &str, durable_name: &str, generation: u64) {
        let mut topics = self.topics.lock();
        if let Some(durable) = topics
            .get_mut(topic)
            .and_then(|t| t.durables.get_mut(durable_name))
        {
            if durable.generation == generation {
                durable.active = false;
            }
        }
    }
}

/// An in-process bus with durable subscriptions and explicit acknowledgement.
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl InMemoryBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: Mutex::new(HashMap::new()),
                config,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Messages waiting for the given durable subscription, in-flight one excluded.
    pub fn backlog(&self, topic: &str, durable_name: &str) -> usize {
        let topics = self.inner.topics.lock();
        topics
            .get(topic)
            .and_then(|t| t.durables.get(durable_name))
            .map_or(0, |d| d.queue.len())
    }

    /// Stops every pump and refuses further publishes. Open subscriptions end with `None`.
    pub fn close(&self) {
        info!("Bus closing");
        self.inner.shutdown.cancel();
    }

    async fn pump(
        inner: Arc<Inner>,
        topic: String,
        durable_name: String,
        generation: u64,
        notify: Arc<Notify>,
        sender: mpsc::Sender<Delivery>,
    ) {
        debug!(%topic, %durable_name, generation, "Pump started");

        loop {
            let pending = match inner.next(&topic, &durable_name, generation) {
                Next::Ready(pending) => pending,
                Next::Superseded => break,
                Next::Empty => {
                    tokio::select! {
                        _ = notify.notified() => continue,
                        _ = sender.closed() => break,
                        _ = inner.shutdown.cancelled() => break,
                    }
                }
            };

            let attempt = pending.attempts + 1;
            let sequence = pending.message.sequence;
            let (delivery, settled) =
                Delivery::new(pending.message.payload.clone(), sequence, attempt);

            if sender.send(delivery).await.is_err() {
                // Subscriber went away before taking it; the message was never seen.
                inner.requeue_front(&topic, &durable_name, pending);
                break;
            }

            match settled.await.unwrap_or(Settlement::Nack) {
                Settlement::Ack => {
                    debug!(%topic, %durable_name, sequence, attempt, "Acked");
                }
                Settlement::Term => {
                    warn!(%topic, %durable_name, sequence, attempt, "Terminated, not redelivering");
                }
                Settlement::Nack if attempt >= inner.config.max_deliveries => {
                    error!(%topic, %durable_name, sequence, attempt, "Max deliveries reached, dropping message");
                }
                Settlement::Nack => {
                    debug!(%topic, %durable_name, sequence, attempt, "Nacked, scheduling redelivery");
                    inner.requeue_front(
                        &topic,
                        &durable_name,
                        Pending {
                            message: pending.message,
                            attempts: attempt,
                        },
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(inner.config.redelivery_delay) => {}
                        _ = sender.closed() => break,
                        _ = inner.shutdown.cancelled() => break,
                    }
                }
            }
        }

        inner.release(&topic, &durable_name, generation);
        debug!(%topic, %durable_name, generation, "Pump stopped");
    }
}

#[async_trait]
impl Publisher for InMemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<u64, BusError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(BusError::Closed);
        }

        let mut topics = self.inner.topics.lock();
        let state = topics.entry(topic.to_string()).or_default();
        let sequence = state.log.len() as u64 + 1;
        let message = Arc::new(Message { sequence, payload });
        state.log.push(Arc::clone(&message));

        for durable in state.durables.values_mut() {
            durable.queue.push_back(Pending {
                message: Arc::clone(&message),
                attempts: 0,
            });
            durable.notify.notify_one();
        }

        debug!(topic, sequence, "Published");
        Ok(sequence)
    }
}

#[async_trait]
impl Subscriber for InMemoryBus {
    async fn subscribe(&self, topic: &str, durable_name: &str) -> Result<Subscription, BusError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(BusError::Closed);
        }

        let (generation, notify) = {
            let mut topics = self.inner.topics.lock();
            let state = topics.entry(topic.to_string()).or_default();
            let log = &state.log;
            let durable = state
                .durables
                .entry(durable_name.to_string())
                .or_insert_with(|| DurableState {
                    queue: log
                        .iter()
                        .map(|message| Pending {
                            message: Arc::clone(message),
                            attempts: 0,
                        })
                        .collect(),
                    generation: 0,
                    active: false,
                    notify: Arc::new(Notify::new()),
                });

            if durable.active {
                return Err(BusError::DurableInUse {
                    topic: topic.to_string(),
                    durable_name: durable_name.to_string(),
                });
            }
            durable.active = true;
            durable.generation += 1;
            (durable.generation, Arc::clone(&durable.notify))
        };

        let (sender, receiver) = mpsc::channel(1);
        tokio::spawn(Self::pump(
            Arc::clone(&self.inner),
            topic.to_string(),
            durable_name.to_string(),
            generation,
            notify,
            sender,
        ));

        info!(topic, durable_name, "Subscribed");
        Ok(Subscription::new(topic, durable_name, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_bus(max_deliveries: u32) -> InMemoryBus {
        InMemoryBus::new(BusConfig {
            max_deliveries,
            redelivery_delay: Duration::from_millis(5),
        })
    }

    async fn next(sub: &mut Subscription) -> Delivery {
        tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("timed out waiting for delivery")
            .expect("subscription closed")
    }

    #[tokio::test]
    async fn test_delivers_in_publish_order() {
        let bus = fast_bus(3);
        let mut sub = bus.subscribe("orders", "d1").await.unwrap();

        bus.publish("orders", b"a".to_vec()).await.unwrap();
        bus.publish("orders", b"b".to_vec()).await.unwrap();

        let first = next(&mut sub).await;
        assert_eq!(first.payload(), b"a");
        assert_eq!(first.sequence(), 1);
        first.ack();

        let second = next(&mut sub).await;
        assert_eq!(second.payload(), b"b");
        second.ack();
    }

    #[tokio::test]
    async fn test_new_durable_starts_from_retained_log() {
        let bus = fast_bus(3);
        bus.publish("orders", b"early".to_vec()).await.unwrap();

        let mut sub = bus.subscribe("orders", "late-joiner").await.unwrap();
        let delivery = next(&mut sub).await;
        assert_eq!(delivery.payload(), b"early");
        delivery.ack();
    }

    #[tokio::test]
    async fn test_backlog_counts_queued_messages() {
        let bus = fast_bus(3);
        let mut sub = bus.subscribe("orders", "d1").await.unwrap();
        assert_eq!(bus.backlog("orders", "d1"), 0);

        for payload in [b"a", b"b", b"c"] {
            bus.publish("orders", payload.to_vec()).await.unwrap();
        }

        // "a" is in flight and held unsettled, so the pump cannot take another.
        let first = next(&mut sub).await;
        assert_eq!(bus.backlog("orders", "d1"), 2);

        first.ack();
        let second = next(&mut sub).await;
        assert_eq!(second.payload(), b"b");
        assert_eq!(bus.backlog("orders", "d1"), 1);
        assert_eq!(bus.backlog("orders", "unknown"), 0);
        assert_eq!(bus.backlog("other-topic", "d1"), 0);
        second.ack();
    }

    #[tokio::test]
    async fn test_nack_redelivers_same_message() {
        let bus = fast_bus(3);
        let mut sub = bus.subscribe("orders", "d1").await.unwrap();
        bus.publish("orders", b"a".to_vec()).await.unwrap();

        let first = next(&mut sub).await;
        assert_eq!(first.attempt(), 1);
        first.nack();

        let again = next(&mut sub).await;
        assert_eq!(again.sequence(), 1);
        assert_eq!(again.attempt(), 2);
        assert!(again.redelivered());
        again.ack();
    }

    #[tokio::test]
    async fn test_term_is_never_redelivered() {
        let bus = fast_bus(3);
        let mut sub = bus.subscribe("orders", "d1").await.unwrap();
        bus.publish("orders", b"bad".to_vec()).await.unwrap();
        bus.publish("orders", b"good".to_vec()).await.unwrap();

        next(&mut sub).await.term();
        let following = next(&mut sub).await;
        assert_eq!(following.payload(), b"good");
        following.ack();
    }

    #[tokio::test]
    async fn test_message_dropped_after_max_deliveries() {
        let bus = fast_bus(2);
        let mut sub = bus.subscribe("orders", "d1").await.unwrap();
        bus.publish("orders", b"poison".to_vec()).await.unwrap();
        bus.publish("orders", b"next".to_vec()).await.unwrap();

        next(&mut sub).await.nack();
        next(&mut sub).await.nack();

        let following = next(&mut sub).await;
        assert_eq!(following.payload(), b"next");
        following.ack();
    }

    #[tokio::test]
    async fn test_durable_survives_resubscribe() {
        let bus = fast_bus(5);
        let mut sub = bus.subscribe("orders", "d1").await.unwrap();
        bus.publish("orders", b"a".to_vec()).await.unwrap();

        // Taken but never settled: the consumer "crashed".
        let unsettled = next(&mut sub).await;
        drop(unsettled);
        drop(sub);

        bus.publish("orders", b"b".to_vec()).await.unwrap();

        let mut resumed = loop {
            match bus.subscribe("orders", "d1").await {
                Ok(sub) => break sub,
                Err(BusError::DurableInUse { .. }) => tokio::task::yield_now().await,
                Err(e) => panic!("unexpected error: {e}"),
            }
        };

        let first = next(&mut resumed).await;
        assert_eq!(first.payload(), b"a");
        assert!(first.redelivered());
        first.ack();

        let second = next(&mut resumed).await;
        assert_eq!(second.payload(), b"b");
        second.ack();
    }

    #[tokio::test]
    async fn test_second_active_subscriber_is_refused() {
        let bus = fast_bus(3);
        let _sub = bus.subscribe("orders", "d1").await.unwrap();
        let err = bus.subscribe("orders", "d1").await.err().unwrap();
        assert_eq!(
            err,
            BusError::DurableInUse {
                topic: "orders".into(),
                durable_name: "d1".into()
            }
        );
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let bus = fast_bus(3);
        let mut sub = bus.subscribe("orders", "d1").await.unwrap();
        bus.close();

        let ended = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap();
        assert!(ended.is_none());
        assert_eq!(
            bus.publish("orders", Vec::new()).await.unwrap_err(),
            BusError::Closed
        );
    }
}
