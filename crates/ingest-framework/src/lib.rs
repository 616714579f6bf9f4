//! # Ingest Framework
//!
//! This crate provides the building blocks of an **ingestion-to-cache consistency
//! pipeline**: records arrive on a message stream, are durably stored, and are then
//! mirrored into an in-memory cache that serves point lookups without touching storage.
//!
//! ## Architecture Overview
//!
//! ```text
//!               ┌──────────── startup ────────────┐
//!               │  warm(store) ──► LookupCache     │
//!               └──────────────────────────────────┘
//!  Bus ──► Subscription ──► StreamConsumer ──► RecordUpserter ──► LookupCache ◄── readers
//!                              decode            (store first)      (then cache)
//! ```
//!
//! The pipeline is generic over [`Record`]. A domain crate implements `Record` for its
//! value type and a store for it; everything else is written once here.
//!
//! ## Guarantees
//!
//! - **Store, then cache**: the cache never contains a record the store has not accepted.
//! - **Idempotent ingestion**: stores upsert by identifier, so redelivery is harmless.
//! - **Bootstrap before ready**: [`warm`] completes before the consumer starts and before
//!   reads are served. A failed warm-up is fatal.
//! - **Non-blocking reads**: [`LookupCache::get`] is an in-memory lookup and never waits
//!   on I/O.
//!
//! ## Core Abstractions
//!
//! - [`Record`]: identifier + wire decoding for an ingested value.
//! - [`LookupCache`]: concurrent identifier → record map.
//! - [`RecordLoader`] / [`RecordUpserter`]: the two store capabilities the pipeline uses.
//! - [`Publisher`] / [`Subscriber`] / [`Delivery`]: the bus seam with explicit
//!   ack / nack / term.
//! - [`StreamConsumer`]: the decode → store → cache loop.
//! - [`InMemoryBus`]: an in-process durable bus.
//!
//! ## Testing
//!
//! [`mock::MockStore`] is an in-memory store with scripted failures. Together with
//! [`InMemoryBus`] it lets you exercise the full pipeline without any external service.

pub mod bootstrap;
pub mod bus;
pub mod bus_inmemory;
pub mod cache;
pub mod consumer;
pub mod error;
pub mod mock;
pub mod record;
pub mod store;

// Re-export core types for convenience
pub use bootstrap::warm;
pub use bus::{Delivery, Publisher, Settlement, Subscriber, Subscription};
pub use bus_inmemory::{BusConfig, InMemoryBus};
pub use cache::LookupCache;
pub use consumer::{ConsumerStats, StreamConsumer};
pub use error::{BootstrapError, BusError, DecodeError, EncodeError, IngestError, StoreError};
pub use record::Record;
pub use store::{RecordLoader, RecordStore, RecordUpserter};
