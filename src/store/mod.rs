//! Persistence seam between the order service and PostgreSQL.
//!
//! `OrderStore` is the trait the service (and its tests) program against;
//! `PgOrderStore` is the production implementation composing the per-entity
//! SQL with the transaction manager.

pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Delivery, Item, Order, OrderRow, Payment};

pub use postgres::PgOrderStore;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetch the order header row, `None` when absent.
    async fn find_order(&self, order_uid: Uuid) -> Result<Option<OrderRow>>;

    /// Enumerate every stored order uid.
    async fn all_order_uids(&self) -> Result<Vec<Uuid>>;

    async fn find_delivery(&self, order_uid: Uuid) -> Result<Option<Delivery>>;

    async fn find_payment(&self, order_uid: Uuid) -> Result<Option<Payment>>;

    async fn find_items(&self, order_uid: Uuid) -> Result<Vec<Item>>;

    /// Persist the order and all sub-entities as one atomic unit. Either
    /// all four tables gain their rows or none do.
    async fn create_order(&self, order: &Order) -> Result<Order>;
}
