use serde::{Deserialize, Serialize};
use sqlx::postgres::Postgres;
use sqlx::{FromRow, QueryBuilder};
use uuid::Uuid;

use crate::errors::Result;

/// One order line item. Rows carry a surrogate `items_id`, generated fresh
/// on insert; it never crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: Uuid,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Item {
    /// Bulk-insert all items of one order in a single statement.
    pub async fn insert_all<'e, E>(executor: E, order_uid: Uuid, items: &[Item]) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        if items.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO items (items_id, order_uid, chrt_id, track_number, price, rid, \
             name, sale, size, total_price, nm_id, brand, status) ",
        );
        builder.push_values(items, |mut row, item| {
            row.push_bind(Uuid::new_v4())
                .push_bind(order_uid)
                .push_bind(item.chrt_id)
                .push_bind(&item.track_number)
                .push_bind(item.price)
                .push_bind(item.rid)
                .push_bind(&item.name)
                .push_bind(item.sale)
                .push_bind(&item.size)
                .push_bind(item.total_price)
                .push_bind(item.nm_id)
                .push_bind(&item.brand)
                .push_bind(item.status);
        });

        builder.build().execute(executor).await?;

        Ok(())
    }

    pub async fn list_by_order_uid<'e, E>(executor: E, order_uid: Uuid) -> Result<Vec<Item>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT chrt_id, track_number, price, rid, name, sale, size,
                   total_price, nm_id, brand, status
            FROM items
            WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }
}
