mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{sample_order, MemoryStore};
use order_core::cache::LruCache;
use order_core::errors::OrderError;
use order_core::models::Order;
use order_core::service::OrderService;
use uuid::Uuid;

const CACHE_TTL: Duration = Duration::from_secs(60);

fn service_with_store() -> (OrderService<MemoryStore>, Arc<MemoryStore>, Arc<LruCache<Uuid, Order>>) {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LruCache::new(100, "order").unwrap());
    let service = OrderService::new(Arc::clone(&store), Arc::clone(&cache), CACHE_TTL);
    (service, store, cache)
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let (service, _store, cache) = service_with_store();
    let order = sample_order(Uuid::new_v4());

    let created = service.create_order(&order).await.unwrap();
    assert_eq!(created, order);
    assert!(cache.has(&order.order_uid));

    let fetched = service.get_order(order.order_uid).await.unwrap();
    assert_eq!(fetched, order);
}

#[tokio::test]
async fn duplicate_create_is_idempotent() {
    let (service, store, _cache) = service_with_store();
    let order = sample_order(Uuid::new_v4());

    service.create_order(&order).await.unwrap();
    let second = service.create_order(&order).await.unwrap();

    // The duplicate call must hand back the stored record fully assembled,
    // not a stub.
    assert_eq!(second, order);
    assert_eq!(store.order_count(), 1);
}

#[tokio::test]
async fn create_rejects_incomplete_orders() {
    let (service, store, cache) = service_with_store();

    let mut no_delivery = sample_order(Uuid::new_v4());
    no_delivery.delivery = None;
    assert!(matches!(
        service.create_order(&no_delivery).await,
        Err(OrderError::InvalidData(_))
    ));

    let mut no_payment = sample_order(Uuid::new_v4());
    no_payment.payment = None;
    assert!(matches!(
        service.create_order(&no_payment).await,
        Err(OrderError::InvalidData(_))
    ));

    let mut no_items = sample_order(Uuid::new_v4());
    no_items.items.clear();
    assert!(matches!(
        service.create_order(&no_items).await,
        Err(OrderError::InvalidData(_))
    ));

    let nil_uid = sample_order(Uuid::nil());
    assert!(matches!(
        service.create_order(&nil_uid).await,
        Err(OrderError::InvalidData(_))
    ));

    assert_eq!(store.order_count(), 0);
    assert_eq!(cache.len(), 0);
}

#[tokio::test]
async fn failed_create_does_not_cache() {
    let (service, store, cache) = service_with_store();
    let order = sample_order(Uuid::new_v4());

    store.fail_next_create(OrderError::Database("40001: serialization".to_string()));
    assert!(service.create_order(&order).await.is_err());
    assert!(!cache.has(&order.order_uid));
}

#[tokio::test]
async fn second_get_hits_cache_with_zero_store_reads() {
    let (service, store, _cache) = service_with_store();
    let order = sample_order(Uuid::new_v4());
    service.create_order(&order).await.unwrap();

    // First read comes straight from the cache populated by the writer.
    let before = store.read_calls();
    service.get_order(order.order_uid).await.unwrap();
    service.get_order(order.order_uid).await.unwrap();
    assert_eq!(store.read_calls(), before);
}

#[tokio::test]
async fn get_unknown_uid_is_not_found() {
    let (service, _store, _cache) = service_with_store();
    assert_eq!(
        service.get_order(Uuid::new_v4()).await,
        Err(OrderError::DataNotFound)
    );
}

#[tokio::test]
async fn incomplete_storage_is_not_found_and_never_cached() {
    let (service, store, cache) = service_with_store();
    let order = sample_order(Uuid::new_v4());
    service.create_order(&order).await.unwrap();

    store.remove_delivery(order.order_uid);
    cache.purge();

    assert_eq!(
        service.get_order(order.order_uid).await,
        Err(OrderError::DataNotFound)
    );
    assert!(!cache.has(&order.order_uid));
}

#[tokio::test]
async fn every_read_result_is_complete() {
    let (service, _store, _cache) = service_with_store();
    let order = sample_order(Uuid::new_v4());
    service.create_order(&order).await.unwrap();

    let fetched = service.get_order(order.order_uid).await.unwrap();
    assert!(fetched.delivery.is_some());
    assert!(fetched.payment.is_some());
    assert!(!fetched.items.is_empty());
}

#[tokio::test]
async fn restore_cache_warms_complete_orders_only() {
    let (service, store, cache) = service_with_store();

    let complete = sample_order(Uuid::new_v4());
    let broken = sample_order(Uuid::new_v4());
    service.create_order(&complete).await.unwrap();
    service.create_order(&broken).await.unwrap();

    store.remove_delivery(broken.order_uid);
    cache.purge();

    service.restore_cache().await.unwrap();

    assert!(cache.has(&complete.order_uid));
    assert!(!cache.has(&broken.order_uid));
}

#[tokio::test]
async fn cached_read_survives_store_loss() {
    // Once cached, reads are served without consulting the store at all.
    let (service, store, _cache) = service_with_store();
    let order = sample_order(Uuid::new_v4());
    service.create_order(&order).await.unwrap();

    store.remove_delivery(order.order_uid);
    let fetched = service.get_order(order.order_uid).await.unwrap();
    assert_eq!(fetched, order);
}
