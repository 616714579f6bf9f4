//! # Pipeline Errors
//!
//! This module defines the error taxonomy shared by every stage of the ingestion
//! pipeline. Each stage owns one enum, so callers can match on exactly the failures
//! that stage can produce.
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`DecodeError`] | [`Record::decode`](crate::Record::decode) | Permanent. The message is rejected. |
//! | [`EncodeError`] | [`Record::encode`](crate::Record::encode) | Surfaced to the publisher. |
//! | [`StoreError`] | [`RecordUpserter`](crate::RecordUpserter), [`RecordLoader`](crate::RecordLoader) | Transient or permanent. The message is left for redelivery. |
//! | [`BusError`] | [`Publisher`](crate::Publisher), [`Subscriber`](crate::Subscriber) | Surfaced to the caller. |
//! | [`IngestError`] | [`StreamConsumer::process`](crate::StreamConsumer::process) | Logged, consumer keeps running. |
//! | [`BootstrapError`] | [`warm`](crate::warm) | Fatal to startup. |
//!
//! A cache miss is not an error anywhere in this crate: [`LookupCache::get`](crate::LookupCache::get)
//! returns `None`.

/// A payload could not be turned into a record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid record: {0}")]
    Invalid(String),
}

/// A record could not be turned into a payload.
#[derive(Debug, thiserror::Error)]
#[error("Failed to encode record: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);

/// Errors reported by a durable store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps any backend error.
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// Errors reported by the message bus.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BusError {
    #[error("Bus closed")]
    Closed,
    #[error("Durable subscription already active: {topic}/{durable_name}")]
    DurableInUse { topic: String, durable_name: String },
}

/// Why a single delivery could not be ingested.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Permanent errors are never worth a redelivery.
    pub fn is_permanent(&self) -> bool {
        matches!(self, IngestError::Decode(_))
    }
}

/// The cache could not be populated at startup.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Failed to load records from store: {0}")]
    Load(#[source] StoreError),
}
