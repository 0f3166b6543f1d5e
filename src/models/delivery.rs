use serde::{Deserialize, Serialize};
use sqlx::postgres::Postgres;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::Result;

/// Delivery details for one order, keyed by `order_uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

impl Delivery {
    pub async fn insert<'e, E>(executor: E, order_uid: Uuid, delivery: &Delivery) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_order_uid<'e, E>(executor: E, order_uid: Uuid) -> Result<Option<Delivery>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let delivery = sqlx::query_as::<_, Delivery>(
            r#"
            SELECT name, phone, zip, city, address, region, email
            FROM delivery
            WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(executor)
        .await?;

        Ok(delivery)
    }
}
