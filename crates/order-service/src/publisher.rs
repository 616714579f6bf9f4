//! Order publishing, used by the demo publisher and by tests that drive the bus.

use crate::model::Order;
use ingest_framework::{BusError, EncodeError, Publisher, Record};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Failed to publish order: {0}")]
    Bus(#[from] BusError),
}

/// Encodes `order` in the wire format and publishes it on `topic`. Returns the bus sequence.
pub async fn publish_order<P>(publisher: &P, topic: &str, order: &Order) -> Result<u64, PublishError>
where
    P: Publisher + ?Sized,
{
    let payload = order.encode()?;
    let sequence = publisher.publish(topic, payload).await?;
    info!(order_uid = %order.order_uid, topic, sequence, "Order published");
    Ok(sequence)
}
