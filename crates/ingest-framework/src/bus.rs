//! # Message Bus Capabilities
//!
//! This module defines the seam between the pipeline and whatever message bus delivers
//! records. The transport itself is out of scope; the pipeline only relies on:
//!
//! - **Durable subscriptions**: a subscription is identified by `(topic, durable_name)`.
//!   Unsettled messages survive a consumer restart and are delivered again.
//! - **At-least-once delivery**: a message may arrive more than once.
//! - **Explicit settlement**: every [`Delivery`] carries a one-shot reply channel, in the
//!   same request/response style used for actor messages. The consumer answers exactly
//!   once with [`Settlement::Ack`], [`Settlement::Nack`] or [`Settlement::Term`].
//!
//! Dropping a `Delivery` without settling it is treated as a `Nack`.

use crate::error::BusError;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// How the consumer finished with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Processed. The bus forgets the message.
    Ack,
    /// Not processed. The bus may redeliver per its own policy.
    Nack,
    /// Rejected permanently. The bus must never redeliver it.
    Term,
}

/// One message handed to a subscriber.
#[derive(Debug)]
pub struct Delivery {
    payload: Vec<u8>,
    sequence: u64,
    attempt: u32,
    respond_to: oneshot::Sender<Settlement>,
}

impl Delivery {
    /// Creates a delivery and the receiver the bus uses to learn its settlement.
    pub fn new(
        payload: Vec<u8>,
        sequence: u64,
        attempt: u32,
    ) -> (Self, oneshot::Receiver<Settlement>) {
        let (respond_to, settled) = oneshot::channel();
        let delivery = Self {
            payload,
            sequence,
            attempt,
            respond_to,
        };
        (delivery, settled)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Bus-assigned sequence number, stable across redeliveries.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// 1 on first delivery, incremented on every redelivery.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn redelivered(&self) -> bool {
        self.attempt > 1
    }

    pub fn ack(self) {
        self.settle(Settlement::Ack);
    }

    pub fn nack(self) {
        self.settle(Settlement::Nack);
    }

    pub fn term(self) {
        self.settle(Settlement::Term);
    }

    fn settle(self, settlement: Settlement) {
        // The bus may have shut down already; nothing left to tell it.
        let _ = self.respond_to.send(settlement);
    }
}

/// A live durable subscription. Dropping it unsubscribes; the durable position is kept.
pub struct Subscription {
    topic: String,
    durable_name: String,
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub fn new(
        topic: impl Into<String>,
        durable_name: impl Into<String>,
        receiver: mpsc::Receiver<Delivery>,
    ) -> Self {
        Self {
            topic: topic.into(),
            durable_name: durable_name.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn durable_name(&self) -> &str {
        &self.durable_name
    }

    /// Waits for the next delivery. `None` once the bus has closed the subscription.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Publishes raw payloads to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<u64, BusError>;
}

/// Opens durable subscriptions.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(&self, topic: &str, durable_name: &str) -> Result<Subscription, BusError>;
}
