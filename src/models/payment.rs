use serde::{Deserialize, Serialize};
use sqlx::postgres::Postgres;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::Result;

/// Payment details for one order, keyed by `order_uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub transaction: Uuid,
    #[serde(default = "Uuid::nil")]
    pub request_id: Uuid,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    #[serde(default)]
    pub custom_fee: i64,
}

impl Payment {
    pub async fn insert<'e, E>(executor: E, order_uid: Uuid, payment: &Payment) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO payment (order_uid, transaction, request_id, currency, provider,
                                 amount, payment_dt, bank, delivery_cost, goods_total, custom_fee)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order_uid)
        .bind(payment.transaction)
        .bind(payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_order_uid<'e, E>(executor: E, order_uid: Uuid) -> Result<Option<Payment>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT transaction, request_id, currency, provider, amount,
                   payment_dt, bank, delivery_cost, goods_total, custom_fee
            FROM payment
            WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }
}
