//! # Tracing Setup
//!
//! All components log through `tracing` macros with structured fields. The subscriber is
//! installed once, at process start, by [`setup_tracing`].
//!
//! ## Output Formats
//!
//! | Environment | Format | Default level |
//! |-------------|--------|---------------|
//! | `local` | compact, human readable | `debug` |
//! | `dev` | compact, human readable | `debug` |
//! | `prod` | JSON, one object per line | `info` |
//!
//! `RUST_LOG` overrides the default level:
//!
//! ```bash
//! RUST_LOG=info cargo run -p order-service                         # Lifecycle and per-order logs
//! RUST_LOG=debug cargo run -p order-service                        # Every decode/store/cache step
//! RUST_LOG=order_service=debug,ingest_framework=info cargo run -p order-service
//! ```
//!
//! ## What gets logged
//!
//! With `info` a healthy run looks like:
//!
//! ```text
//! INFO Order store opened path="orders.redb" orders=1
//! INFO warm: Loaded orders from store count=1
//! INFO warm: Cache warmed count=1 size=1
//! INFO Subscribed topic="orders" durable_name="my-durable"
//! INFO Consumer started record_type="Order" topic=orders durable_name=my-durable
//! INFO Record ingested record_type="Order" id=wborder sequence=1 attempt=1
//! ```
//!
//! Failures carry the sequence and attempt of the delivery, so a redelivered message can
//! be followed across attempts.

use crate::config::Environment;
use tracing_subscriber::EnvFilter;

pub fn setup_tracing(environment: Environment) {
    let default_level = match environment {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match environment {
        Environment::Prod => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        Environment::Local | Environment::Dev => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false) // record_type already names the pipeline
            .compact()
            .init(),
    }
}
