use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::PostgresConfig;
use crate::errors::{OrderError, Result};
use crate::resilience::BackoffPolicy;

/// Build the bounded connection pool, retrying the initial connect with
/// jittered backoff. The first attempt runs immediately; sleeps only follow
/// failures.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool> {
    let policy = BackoffPolicy::new(
        Duration::from_millis(config.base_retry_delay_ms),
        Duration::from_millis(config.max_retry_delay_ms),
        config.conn_attempts,
    )?;

    let url = config.connection_url();
    let mut last_err = None;

    for attempt in 0..config.conn_attempts {
        match PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&url)
            .await
        {
            Ok(pool) => {
                tracing::info!(
                    host = %config.host,
                    database = %config.name,
                    pool_max = config.pool_max,
                    "connected to postgres"
                );
                return Ok(pool);
            }
            Err(err) => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = config.conn_attempts,
                    retry_after_ms = delay.as_millis() as u64,
                    error = %err,
                    "postgres connection attempt failed"
                );
                last_err = Some(err);
                if attempt + 1 < config.conn_attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(OrderError::Database(format!(
        "connect after {} attempts: {}",
        config.conn_attempts,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}
