//! # Durable Store Capabilities
//!
//! The pipeline never talks to a database directly. It consumes two narrow capabilities:
//!
//! - [`RecordLoader`]: full scan, used once by the bootstrapper.
//! - [`RecordUpserter`]: idempotent insert-or-replace, used by the consumer.
//!
//! Implementations must make `put` atomic across everything a record owns: a concurrent
//! `load_all` sees either the previous version or the new one, never a mix. `put` must
//! also be an upsert so that redelivered messages are harmless.
//!
//! See [`MockStore`](crate::mock::MockStore) for an in-memory implementation with failure
//! injection.

use crate::error::StoreError;
use crate::record::Record;
use async_trait::async_trait;

/// Loads the authoritative record set.
#[async_trait]
pub trait RecordLoader<T: Record>: Send + Sync {
    /// Returns every stored record. Order is unspecified.
    async fn load_all(&self) -> Result<Vec<T>, StoreError>;
}

/// Persists a single record.
#[async_trait]
pub trait RecordUpserter<T: Record>: Send + Sync {
    /// Inserts the record, or replaces the stored version with the same identifier.
    async fn put(&self, record: &T) -> Result<(), StoreError>;
}

/// Both store capabilities, for collaborators that need the full store.
pub trait RecordStore<T: Record>: RecordLoader<T> + RecordUpserter<T> {}

impl<T: Record, S> RecordStore<T> for S where S: RecordLoader<T> + RecordUpserter<T> {}
