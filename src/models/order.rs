use serde::{Deserialize, Serialize};
use sqlx::postgres::Postgres;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Delivery, Item, Payment};

/// Fully-assembled order as it crosses the wire and the cache boundary.
///
/// `delivery` and `payment` are optional only during assembly; a complete
/// order always carries both plus at least one item, and only complete
/// orders are cached or returned to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: Uuid,
    pub track_number: String,
    pub entry: String,
    pub delivery: Option<Delivery>,
    pub payment: Option<Payment>,
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: String,
    pub oof_shard: String,
}

impl Order {
    /// Whether every required sub-entity is attached.
    pub fn is_complete(&self) -> bool {
        self.delivery.is_some() && self.payment.is_some() && !self.items.is_empty()
    }
}

/// Header row of the `orders` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderRow {
    pub order_uid: Uuid,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: String,
    pub oof_shard: String,
}

impl OrderRow {
    /// Insert the order header, returning the stored row. A duplicate
    /// `order_uid` maps to `ConflictingData` through the error conversion.
    pub async fn insert<'e, E>(executor: E, order: &Order) -> Result<OrderRow>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature,
                                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING order_uid, track_number, entry, locale, internal_signature,
                      customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            "#,
        )
        .bind(order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(&order.date_created)
        .bind(&order.oof_shard)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Find the header row by order uid.
    pub async fn find_by_uid<'e, E>(executor: E, order_uid: Uuid) -> Result<Option<OrderRow>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT order_uid, track_number, entry, locale, internal_signature,
                   customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            FROM orders
            WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Enumerate every stored order uid, for the startup cache warmer.
    pub async fn all_uids<'e, E>(executor: E) -> Result<Vec<Uuid>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let uids = sqlx::query_scalar::<_, Uuid>("SELECT order_uid FROM orders")
            .fetch_all(executor)
            .await?;

        Ok(uids)
    }

    /// Rebuild the aggregate from the header row plus its children.
    pub fn into_order(
        self,
        delivery: Option<Delivery>,
        payment: Option<Payment>,
        items: Vec<Item>,
    ) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery,
            payment,
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order(uid: Uuid) -> Order {
        Order {
            order_uid: uid,
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
                transaction: uid,
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

    #[test]
    fn json_round_trip_preserves_wire_field_names() {
        let order = sample_order(Uuid::new_v4());
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("order_uid").is_some());
        assert!(json.get("track_number").is_some());
        assert!(json.get("internal_signature").is_some());
        assert!(json.get("oof_shard").is_some());
        assert!(json["delivery"].get("phone").is_some());
        assert!(json["payment"].get("payment_dt").is_some());
        assert!(json["items"][0].get("chrt_id").is_some());

        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn completeness_requires_all_children() {
        let uid = Uuid::new_v4();
        let complete = sample_order(uid);
        assert!(complete.is_complete());

        let mut no_delivery = sample_order(uid);
        no_delivery.delivery = None;
        assert!(!no_delivery.is_complete());

        let mut no_items = sample_order(uid);
        no_items.items.clear();
        assert!(!no_items.is_complete());
    }

    #[test]
    fn decodes_message_without_internal_signature() {
        let mut json = serde_json::to_value(sample_order(Uuid::new_v4())).unwrap();
        json.as_object_mut().unwrap().remove("internal_signature");
        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.internal_signature, "");
    }
}
