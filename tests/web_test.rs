mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{sample_order, MemoryStore};
use http_body_util::BodyExt;
use order_core::cache::LruCache;
use order_core::models::Order;
use order_core::service::OrderService;
use order_core::web::create_router;
use tower::util::ServiceExt;
use uuid::Uuid;

async fn router_with_order(order: &Order) -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LruCache::new(100, "order").unwrap());
    let service = OrderService::new(store, cache, Duration::from_secs(60));
    service.create_order(order).await.unwrap();
    create_router(service)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let router = router_with_order(&sample_order(Uuid::new_v4())).await;
    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let router = router_with_order(&sample_order(Uuid::new_v4())).await;
    let response = router.oneshot(get("/health")).await.unwrap();

    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn malformed_uid_is_bad_request() {
    let router = router_with_order(&sample_order(Uuid::new_v4())).await;
    let response = router.oneshot(get("/orders/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn unknown_uid_is_not_found() {
    let router = router_with_order(&sample_order(Uuid::new_v4())).await;
    let response = router
        .oneshot(get(&format!("/orders/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn known_uid_returns_order_json() {
    let order = sample_order(Uuid::new_v4());
    let router = router_with_order(&order).await;

    let response = router
        .oneshot(get(&format!("/orders/{}", order.order_uid)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let fetched: Order = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched, order);
}
