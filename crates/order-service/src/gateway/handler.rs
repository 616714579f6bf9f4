use crate::model::Order;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ingest_framework::LookupCache;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("id parameter is required")]
    MissingId,

    #[error("id not found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::MissingId => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
        };

        let body = ErrorResponse {
            status: "Error",
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// `GET /api/order/{id}`: served from the cache only.
pub async fn get_order(
    State(cache): State<LookupCache<Order>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, GatewayError> {
    let id = id.trim();
    if id.is_empty() {
        debug!("Order lookup without id");
        return Err(GatewayError::MissingId);
    }

    match cache.get(id) {
        Some(order) => {
            info!(order_uid = id, "Order served");
            Ok(Json(order))
        }
        None => {
            debug!(order_uid = id, "Order not in cache");
            Err(GatewayError::NotFound)
        }
    }
}

/// `GET /api/order/` with the id segment missing.
pub async fn missing_id() -> GatewayError {
    GatewayError::MissingId
}
