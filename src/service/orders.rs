use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use uuid::Uuid;

use crate::cache::LruCache;
use crate::errors::{OrderError, Result};
use crate::models::{Delivery, Item, Order, OrderRow, Payment};
use crate::store::OrderStore;

/// Per-operation deadline for each database fetch on the read path.
const FETCH_TIMEOUT: Duration = Duration::from_millis(500);

/// Operations slower than this emit a warning with the uid and duration.
const SLOW_OP_THRESHOLD: Duration = Duration::from_millis(200);

/// Order service over a store and a read-through cache.
///
/// Readers observe either no order for a uid or the fully-assembled order
/// with delivery, payment and at least one item; partial views never leave
/// this type and never enter the cache.
pub struct OrderService<S> {
    store: Arc<S>,
    cache: Arc<LruCache<Uuid, Order>>,
    cache_ttl: Duration,
}

impl<S> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: Arc<S>, cache: Arc<LruCache<Uuid, Order>>, cache_ttl: Duration) -> Self {
        cache.set_on_evicted(Arc::new(|key: &Uuid, _value: &Order| {
            tracing::info!(order_uid = %key, "cache eviction");
        }));

        Self {
            store,
            cache,
            cache_ttl,
        }
    }

    /// Persist a new order. Duplicate uids resolve idempotently: the
    /// pre-check returns the already-stored record, fully assembled,
    /// without error. A
    /// duplicate that lands between the pre-check and the commit surfaces
    /// as `ConflictingData`; the caller's retry resolves it through the
    /// pre-check on the next attempt.
    pub async fn create_order(&self, order: &Order) -> Result<Order> {
        if let Some(existing) = self.store.find_order(order.order_uid).await? {
            tracing::info!(order_uid = %order.order_uid, "order already exists, returning stored record");
            return self.assemble(existing).await;
        }

        tracing::info!(
            order_uid = %order.order_uid,
            items_count = order.items.len(),
            "create order started"
        );

        let start = Instant::now();

        validate_order(order)?;

        let created = match self.store.create_order(order).await {
            Ok(created) => created,
            Err(err) => {
                tracing::error!(order_uid = %order.order_uid, error = %err, "order creation failed");
                return Err(err);
            }
        };

        self.cache
            .put(created.order_uid, created.clone(), self.cache_ttl);

        let elapsed = start.elapsed();
        if elapsed > SLOW_OP_THRESHOLD {
            tracing::warn!(
                order_uid = %created.order_uid,
                duration_ms = elapsed.as_millis() as u64,
                "slow create_order"
            );
        }
        tracing::info!(
            order_uid = %created.order_uid,
            duration_ms = elapsed.as_millis() as u64,
            "order created successfully"
        );

        Ok(created)
    }

    /// Read an order by uid: cache hit, or assembled from storage and
    /// cached when complete.
    pub async fn get_order(&self, order_uid: Uuid) -> Result<Order> {
        let start = Instant::now();

        if let Some(cached) = self.cache.get(&order_uid) {
            tracing::info!(order_uid = %order_uid, "order served from cache");
            return Ok(cached);
        }
        tracing::debug!(order_uid = %order_uid, "cache miss");

        let order = self.fetch_from_store(order_uid).await?;
        self.cache.put(order_uid, order.clone(), self.cache_ttl);

        let elapsed = start.elapsed();
        if elapsed > SLOW_OP_THRESHOLD {
            tracing::warn!(
                order_uid = %order_uid,
                duration_ms = elapsed.as_millis() as u64,
                "slow get_order"
            );
        }
        tracing::info!(
            order_uid = %order_uid,
            items_count = order.items.len(),
            duration_ms = elapsed.as_millis() as u64,
            "order served from database"
        );

        Ok(order)
    }

    /// One-shot startup sweep: walk every stored uid through the read path
    /// so the cache starts warm. Per-uid failures are logged and skipped.
    pub async fn restore_cache(&self) -> Result<()> {
        tracing::info!("starting cache restoration from database");

        let uids = self.store.all_order_uids().await?;
        if uids.is_empty() {
            tracing::info!("no orders in database to restore cache");
            return Ok(());
        }

        let total = uids.len();
        let mut restored = 0usize;
        for uid in uids {
            match self.fetch_from_store(uid).await {
                Ok(order) => {
                    self.cache.put(uid, order, self.cache_ttl);
                    restored += 1;
                }
                Err(err) => {
                    tracing::warn!(order_uid = %uid, error = %err, "failed to fetch order for cache restoration");
                }
            }
        }

        tracing::info!(
            total_orders_in_db = total,
            restored_to_cache = restored,
            "cache restoration finished"
        );

        Ok(())
    }

    /// Header fetch under its own deadline, then the concurrent child
    /// fetches of `assemble`.
    async fn fetch_from_store(&self, order_uid: Uuid) -> Result<Order> {
        let header = timeout(FETCH_TIMEOUT, self.store.find_order(order_uid))
            .await??
            .ok_or(OrderError::DataNotFound)?;

        self.assemble(header).await
    }

    /// Concurrent child fetches for a stored header, each under its own
    /// deadline. A child's not-found is tolerated; any other child error
    /// aborts the whole read. Incomplete assemblies come back as
    /// `DataNotFound` and are never cached.
    async fn assemble(&self, header: OrderRow) -> Result<Order> {
        let order_uid = header.order_uid;

        let (delivery, payment, items) = tokio::try_join!(
            self.fetch_delivery(order_uid),
            self.fetch_payment(order_uid),
            self.fetch_items(order_uid),
        )?;

        if delivery.is_none() || payment.is_none() || items.is_empty() {
            tracing::warn!(
                order_uid = %order_uid,
                has_delivery = delivery.is_some(),
                has_payment = payment.is_some(),
                items_count = items.len(),
                "stored order is incomplete"
            );
            return Err(OrderError::DataNotFound);
        }

        Ok(header.into_order(delivery, payment, items))
    }

    async fn fetch_delivery(&self, order_uid: Uuid) -> Result<Option<Delivery>> {
        match timeout(FETCH_TIMEOUT, self.store.find_delivery(order_uid)).await? {
            Ok(delivery) => Ok(delivery),
            Err(OrderError::DataNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn fetch_payment(&self, order_uid: Uuid) -> Result<Option<Payment>> {
        match timeout(FETCH_TIMEOUT, self.store.find_payment(order_uid)).await? {
            Ok(payment) => Ok(payment),
            Err(OrderError::DataNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn fetch_items(&self, order_uid: Uuid) -> Result<Vec<Item>> {
        match timeout(FETCH_TIMEOUT, self.store.find_items(order_uid)).await? {
            Ok(items) => Ok(items),
            Err(OrderError::DataNotFound) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

fn validate_order(order: &Order) -> Result<()> {
    if order.order_uid.is_nil() {
        return Err(OrderError::InvalidData("order_uid is nil".to_string()));
    }
    if order.delivery.is_none() {
        return Err(OrderError::InvalidData("delivery is required".to_string()));
    }
    if order.payment.is_none() {
        return Err(OrderError::InvalidData("payment is required".to_string()));
    }
    if order.items.is_empty() {
        return Err(OrderError::InvalidData(
            "at least one item is required".to_string(),
        ));
    }
    Ok(())
}
