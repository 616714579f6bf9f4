//! # Read Gateway
//!
//! HTTP surface of the service. One query, served from the [`LookupCache`] only:
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api/order/{id}` | `200` with the order as JSON |
//! | unknown id | `404` `{"status":"Error","error":"id not found"}` |
//! | blank or missing id | `400` `{"status":"Error","error":"id parameter is required"}` |
//!
//! No handler touches the store, so read latency does not depend on storage latency.
//!
//! Every request gets an `x-request-id` (generated when the client did not send one,
//! echoed on the response), an HTTP trace span, permissive CORS and a timeout. A handler
//! that panics answers `500` instead of dropping the connection.

pub mod handler;

use crate::model::Order;
use axum::{routing::get, Router};
use ingest_framework::LookupCache;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use handler::GatewayError;

pub fn build_router(cache: LookupCache<Order>, request_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/api/order/{id}", get(handler::get_order))
        .route("/api/order/", get(handler::missing_id))
        .route("/api/order", get(handler::missing_id))
        .with_state(cache);

    with_middleware(routes, request_timeout)
}

fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
