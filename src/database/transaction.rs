use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool};

use crate::errors::{OrderError, Result};
use crate::metrics::names as metric;
use crate::resilience::BackoffPolicy;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Runs closures inside a READ COMMITTED read-write transaction, retrying
/// the whole transaction on retryable failures (serialization failure,
/// deadlock, connection-class errors). Everything else surfaces
/// immediately.
#[derive(Debug, Clone)]
pub struct TransactionManager {
    pool: PgPool,
    policy: BackoffPolicy,
}

impl TransactionManager {
    pub fn new(pool: PgPool) -> Result<Self> {
        let policy = BackoffPolicy::new(
            DEFAULT_BASE_RETRY_DELAY,
            DEFAULT_MAX_RETRY_DELAY,
            DEFAULT_MAX_ATTEMPTS,
        )?;
        Ok(Self { pool, policy })
    }

    pub fn with_policy(pool: PgPool, policy: BackoffPolicy) -> Self {
        Self { pool, policy }
    }

    /// Run `f` inside one transaction; commit on success, roll back on any
    /// error. A rollback failure is logged but never masks the original
    /// error. The wall-clock duration of every outcome is observed.
    pub async fn execute_in_transaction<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send + Sync,
    {
        let start = Instant::now();
        let result = self.run_with_retry(operation, &f).await;
        metrics::histogram!(
            metric::DB_TRANSACTION_DURATION_SECONDS,
            "operation" => operation.to_string(),
        )
        .record(start.elapsed().as_secs_f64());
        result
    }

    async fn run_with_retry<T, F>(&self, operation: &str, f: &F) -> Result<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send + Sync,
    {
        let max_attempts = self.policy.max_attempts();
        let mut last_err = OrderError::Internal("transaction never attempted".to_string());

        for attempt in 0..max_attempts {
            // The failure that brought us here just happened; sleeping
            // before the attempt (first included) gives contention a
            // window to clear.
            tokio::time::sleep(self.policy.delay(attempt)).await;

            match self.attempt(operation, f).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    metrics::counter!(
                        metric::DB_TRANSACTION_RETRIES_TOTAL,
                        "operation" => operation.to_string(),
                    )
                    .increment(1);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "retrying transaction"
                    );
                    last_err = err;
                }
                Err(err) => {
                    metrics::counter!(
                        metric::DB_TRANSACTION_FAILURES_TOTAL,
                        "operation" => operation.to_string(),
                    )
                    .increment(1);
                    return Err(err);
                }
            }
        }

        metrics::counter!(
            metric::DB_TRANSACTION_FAILURES_TOTAL,
            "operation" => operation.to_string(),
        )
        .increment(1);
        Err(OrderError::Database(format!(
            "max attempts ({max_attempts}) exceeded for {operation}: {last_err}"
        )))
    }

    async fn attempt<T, F>(&self, operation: &str, f: &F) -> Result<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send + Sync,
    {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED READ WRITE")
            .execute(&mut *tx)
            .await?;

        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                // Rollback failures never mask the original error, and a
                // connection that already closed out from under us is
                // expected noise, not worth a log line.
                if let Err(rollback_err) = tx.rollback().await {
                    if !rollback_err.to_string().contains("closed") {
                        tracing::error!(
                            operation,
                            error = %rollback_err,
                            "transaction rollback failed"
                        );
                    }
                }
                Err(err)
            }
        }
    }
}
