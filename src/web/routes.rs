use axum::routing::get;
use axum::Router;

use crate::service::OrderService;
use crate::store::OrderStore;
use crate::web::handlers::{health, orders};
use crate::web::middleware::{metrics_middleware, request_id_middleware};

/// Build the read-surface router over the order service.
pub fn create_router<S: OrderStore + 'static>(service: OrderService<S>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/orders/:order_uid", get(orders::get_order::<S>))
        .route_layer(axum::middleware::from_fn(metrics_middleware))
        .route_layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(service)
}
