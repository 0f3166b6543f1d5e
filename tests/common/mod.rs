//! In-memory `OrderStore` double and order fixtures shared by the
//! integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use async_trait::async_trait;
use order_core::errors::{OrderError, Result};
use order_core::models::{Delivery, Item, Order, OrderRow, Payment};
use order_core::store::OrderStore;
use uuid::Uuid;

/// Store double backed by hash maps. Counts reads so tests can assert the
/// cache short-circuits the database, and can be armed to fail writes.
#[derive(Default)]
pub struct MemoryStore {
    orders: Mutex<HashMap<Uuid, OrderRow>>,
    deliveries: Mutex<HashMap<Uuid, Delivery>>,
    payments: Mutex<HashMap<Uuid, Payment>>,
    items: Mutex<HashMap<Uuid, Vec<Item>>>,
    read_calls: AtomicUsize,
    fail_create: Mutex<Option<OrderError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_create(&self, err: OrderError) {
        *self.fail_create.lock() = Some(err);
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn remove_delivery(&self, order_uid: Uuid) {
        self.deliveries.lock().remove(&order_uid);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_order(&self, order_uid: Uuid) -> Result<Option<OrderRow>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.orders.lock().get(&order_uid).cloned())
    }

    async fn all_order_uids(&self) -> Result<Vec<Uuid>> {
        Ok(self.orders.lock().keys().copied().collect())
    }

    async fn find_delivery(&self, order_uid: Uuid) -> Result<Option<Delivery>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.deliveries.lock().get(&order_uid).cloned())
    }

    async fn find_payment(&self, order_uid: Uuid) -> Result<Option<Payment>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payments.lock().get(&order_uid).cloned())
    }

    async fn find_items(&self, order_uid: Uuid) -> Result<Vec<Item>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.lock().get(&order_uid).cloned().unwrap_or_default())
    }

    async fn create_order(&self, order: &Order) -> Result<Order> {
        if let Some(err) = self.fail_create.lock().take() {
            return Err(err);
        }

        let mut orders = self.orders.lock();
        if orders.contains_key(&order.order_uid) {
            return Err(OrderError::ConflictingData);
        }

        orders.insert(order.order_uid, header_of(order));
        self.deliveries
            .lock()
            .insert(order.order_uid, order.delivery.clone().expect("delivery"));
        self.payments
            .lock()
            .insert(order.order_uid, order.payment.clone().expect("payment"));
        self.items.lock().insert(order.order_uid, order.items.clone());

        Ok(order.clone())
    }
}

fn header_of(order: &Order) -> OrderRow {
    OrderRow {
        order_uid: order.order_uid,
        track_number: order.track_number.clone(),
        entry: order.entry.clone(),
        locale: order.locale.clone(),
        internal_signature: order.internal_signature.clone(),
        customer_id: order.customer_id.clone(),
        delivery_service: order.delivery_service.clone(),
        shardkey: order.shardkey.clone(),
        sm_id: order.sm_id,
        date_created: order.date_created.clone(),
        oof_shard: order.oof_shard.clone(),
    }
}

/// A valid, complete order fixture.
pub fn sample_order(order_uid: Uuid) -> Order {
    Order {
        order_uid,
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Some(Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@wb.ru".to_string(),
        }),
        payment: Some(Payment {
            transaction: order_uid,
            request_id: Uuid::nil(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        }),
        items: vec![Item {
            chrt_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: Uuid::new_v4(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: "2021-11-26T06:22:19Z".to_string(),
        oof_shard: "1".to_string(),
    }
}
