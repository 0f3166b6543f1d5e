use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::TransactionManager;
use crate::errors::{OrderError, Result};
use crate::models::{Delivery, Item, Order, OrderRow, Payment};
use crate::store::OrderStore;

/// PostgreSQL-backed order store. Reads run against the shared pool;
/// `create_order` funnels all four inserts through one transaction.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
    tx_manager: TransactionManager,
}

impl PgOrderStore {
    pub fn new(pool: PgPool, tx_manager: TransactionManager) -> Self {
        Self { pool, tx_manager }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_order(&self, order_uid: Uuid) -> Result<Option<OrderRow>> {
        OrderRow::find_by_uid(&self.pool, order_uid).await
    }

    async fn all_order_uids(&self) -> Result<Vec<Uuid>> {
        OrderRow::all_uids(&self.pool).await
    }

    async fn find_delivery(&self, order_uid: Uuid) -> Result<Option<Delivery>> {
        Delivery::find_by_order_uid(&self.pool, order_uid).await
    }

    async fn find_payment(&self, order_uid: Uuid) -> Result<Option<Payment>> {
        Payment::find_by_order_uid(&self.pool, order_uid).await
    }

    async fn find_items(&self, order_uid: Uuid) -> Result<Vec<Item>> {
        Item::list_by_order_uid(&self.pool, order_uid).await
    }

    async fn create_order(&self, order: &Order) -> Result<Order> {
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

        // The transaction closure may run more than once under retry, so it
        // owns its copy of the order and clones per attempt.
        let order = order.clone();
        let created = self
            .tx_manager
            .execute_in_transaction("create_order", move |conn| {
                let order = order.clone();
                Box::pin(async move {
                    let header = OrderRow::insert(&mut *conn, &order).await?;
                    let delivery = order
                        .delivery
                        .as_ref()
                        .ok_or_else(|| OrderError::InvalidData("delivery is required".to_string()))?;
                    let payment = order
                        .payment
                        .as_ref()
                        .ok_or_else(|| OrderError::InvalidData("payment is required".to_string()))?;
                    Delivery::insert(&mut *conn, order.order_uid, delivery).await?;
                    Payment::insert(&mut *conn, order.order_uid, payment).await?;
                    Item::insert_all(&mut *conn, order.order_uid, &order.items).await?;
                    Ok(header.into_order(
                        order.delivery.clone(),
                        order.payment.clone(),
                        order.items.clone(),
                    ))
                })
            })
            .await?;

        Ok(created)
    }
}
