use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::models::Order;
use crate::service::OrderService;
use crate::store::OrderStore;
use crate::web::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// `GET /orders/:order_uid` — the uid must be a canonical UUID string.
pub async fn get_order<S: OrderStore>(
    State(service): State<OrderService<S>>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_uid = Uuid::parse_str(&order_uid).map_err(|_| {
        tracing::warn!(value = %order_uid, "invalid order uid format");
        ApiError::BadRequest("Invalid order UID format".to_string())
    })?;

    let order = tokio::time::timeout(REQUEST_TIMEOUT, service.get_order(order_uid))
        .await
        .map_err(|_| {
            tracing::warn!(order_uid = %order_uid, "request timed out");
            ApiError::Timeout
        })?
        .map_err(|err| {
            tracing::error!(order_uid = %order_uid, error = %err, "get order failed");
            ApiError::from(err)
        })?;

    tracing::info!(order_uid = %order_uid, "order retrieved successfully");
    Ok(Json(order))
}
