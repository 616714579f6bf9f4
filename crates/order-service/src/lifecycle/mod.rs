//! # Service Lifecycle & Orchestration
//!
//! This module wires the generic pipeline from `ingest_framework` to the concrete order
//! domain and owns its runtime lifecycle.
//!
//! ## The Orchestration Pattern
//!
//! Each piece of the pipeline is simple on its own: a store, a cache, a consumer loop.
//! **Starting them in the right order** is where the correctness lives:
//!
//! 1. **Store** - opened by the caller and passed in
//! 2. **Cache** - created empty, then warmed from the store
//! 3. **Subscription** - opened only after the warm-up succeeded
//! 4. **Consumer** - spawned last, with the cache and the store injected
//! 5. **Readers** - get a cache handle only from a running [`OrderService`]
//!
//! A failure in step 2 or 3 returns a [`StartupError`] and nothing is spawned.
//!
//! ## Graceful Shutdown
//!
//! 1. **Cancel** - the consumer stops taking new deliveries
//! 2. **Drain** - the in-flight order finishes, bounded by the grace period
//! 3. **Abort** - if the grace period runs out, the consumer task is aborted
//! 4. **Release** - the subscription and the store handle are dropped with the task
//!
//! An unsettled delivery goes back to the bus and is redelivered to the next consumer
//! with the same durable name.
//!
//! ## Observability & Tracing
//!
//! The [`setup_tracing`] function initializes structured logging for the whole process.
//! See the [`tracing`](self::tracing) module for formats and levels.

pub mod order_service;
pub mod tracing;

pub use self::order_service::*;
pub use self::tracing::*;
