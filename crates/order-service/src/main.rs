//! # Order Service binary
//!
//! 1. Load `.env` and the environment into a [`Config`]
//! 2. Set up tracing for the configured environment
//! 3. Open the redb order store
//! 4. Start the [`OrderService`] (warm-up, subscription, consumer)
//! 5. Optionally publish the demo order
//! 6. Serve the read gateway until Ctrl-C / SIGTERM
//! 7. Shut the service down
//!
//! The bus is in-process, so with no external producer the only orders that arrive are
//! the ones published by this process (`PUBLISH_DEMO_ORDER=true`).

use ingest_framework::InMemoryBus;
use order_service::config::Config;
use order_service::gateway::build_router;
use order_service::lifecycle::{setup_tracing, OrderService, ServiceSettings};
use order_service::model::Order;
use order_service::publisher::publish_order;
use order_service::storage::RedbOrderStore;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // Setup tracing once for the entire application
    setup_tracing(config.environment);

    info!(environment = ?config.environment, "Starting order service");

    let store = Arc::new(RedbOrderStore::open(&config.storage_path)?);

    info!(
        cluster_id = %config.bus.cluster_id,
        client_id = %config.bus.client_id,
        url = %config.bus.url,
        "Using in-process bus"
    );
    let bus = InMemoryBus::new(config.bus.bus_config());

    let service = OrderService::start(ServiceSettings::from(&config), store, &bus).await?;

    if config.publish_demo_order {
        publish_order(&bus, &config.bus.topic, &Order::demo("wborder")).await?;
    }

    let app = build_router(service.cache(), config.http.timeout);
    let listener = tokio::net::TcpListener::bind(&config.http.address).await?;
    info!(address = %config.http.address, "Read gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Read gateway stopped");
    service.shutdown().await?;
    let backlog = bus.backlog(&config.bus.topic, &config.bus.durable_name);
    info!(backlog, "Undelivered orders left on the bus");
    bus.close();

    info!("Application stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
