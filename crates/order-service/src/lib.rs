//! # Order Service
//!
//! Ingests orders from a message stream, stores them in an embedded redb database and
//! serves them by id over HTTP from an in-memory cache.
//!
//! ## Core Components
//!
//! - **[model]**: [`Order`](model::Order) and its owned [`Delivery`](model::Delivery),
//!   [`Payment`](model::Payment) and [`Item`](model::Item) rows. Implements
//!   [`Record`](ingest_framework::Record).
//! - **[storage]**: [`RedbOrderStore`](storage::RedbOrderStore), the system of record.
//! - **[gateway]**: the axum read API, backed by the cache only.
//! - **[lifecycle]**: [`OrderService`](lifecycle::OrderService), the composition root, and
//!   tracing setup.
//! - **[config]**: environment-driven [`Config`](config::Config).
//! - **[publisher]**: encodes and publishes orders onto the bus.
//!
//! The pipeline itself (consumer loop, cache, bootstrap, bus) lives in `ingest_framework`.

pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod model;
pub mod publisher;
pub mod storage;
