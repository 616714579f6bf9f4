//! Durable order storage.
//!
//! [`RedbOrderStore`] is the system of record. It implements the framework's
//! [`RecordLoader`](ingest_framework::RecordLoader) and
//! [`RecordUpserter`](ingest_framework::RecordUpserter) for [`Order`](crate::model::Order).

pub mod order_store;

pub use order_store::{RedbOrderStore, StorageError, StorageResult};
