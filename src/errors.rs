//! Error types for the order service.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    /// Order failed validation before any write was attempted: nil uid,
    /// missing delivery or payment, or an empty item list.
    #[error("invalid order data: {0}")]
    InvalidData(String),
    /// No row for the requested uid, or the stored order is missing a
    /// required sub-entity and cannot be assembled.
    #[error("data not found")]
    DataNotFound,
    /// Unique-constraint violation on insert. The writer resolves this
    /// through its duplicate pre-check; callers never see it on the
    /// idempotent path.
    #[error("data conflicts with existing data in unique column")]
    ConflictingData,
    /// A per-operation deadline elapsed.
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// The surrounding operation was cancelled by shutdown.
    #[error("operation cancelled")]
    Cancelled,
    #[error("database error: {0}")]
    Database(String),
    #[error("messaging error: {0}")]
    Messaging(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, OrderError>;

/// SQLSTATE classes that permit safely re-running a whole transaction:
/// serialization failure, deadlock, and the connection-exception class.
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", "40P01", "08000", "08001", "08003", "08004", "08006", "08007", "08P01",
];

const UNIQUE_VIOLATION_SQLSTATE: &str = "23505";

impl OrderError {
    /// Whether the error class permits re-executing the whole transaction.
    /// Timeouts and cancellation are never retryable; the caller's deadline
    /// has already elapsed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Database(msg) => {
                RETRYABLE_SQLSTATES.iter().any(|code| msg.contains(code))
                    || msg.contains("pool timed out")
                    || msg.contains("connection closed")
                    || msg.contains("io error")
            }
            OrderError::Timeout(_) | OrderError::Cancelled => false,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => OrderError::DataNotFound,
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
                if code == UNIQUE_VIOLATION_SQLSTATE {
                    OrderError::ConflictingData
                } else {
                    OrderError::Database(format!("{code}: {db_err}"))
                }
            }
            sqlx::Error::PoolTimedOut => OrderError::Database("pool timed out".to_string()),
            sqlx::Error::Io(io_err) => OrderError::Database(format!("io error: {io_err}")),
            _ => OrderError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for OrderError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        OrderError::Timeout("deadline exceeded".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_failure_is_retryable() {
        let err = OrderError::Database("40001: could not serialize access".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn deadlock_is_retryable() {
        let err = OrderError::Database("40P01: deadlock detected".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn connection_class_is_retryable() {
        let err = OrderError::Database("08006: connection failure".to_string());
        assert!(err.is_retryable());
        let err = OrderError::Database("pool timed out".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn timeout_and_cancellation_are_terminal() {
        assert!(!OrderError::Timeout("deadline exceeded".to_string()).is_retryable());
        assert!(!OrderError::Cancelled.is_retryable());
    }

    #[test]
    fn validation_errors_are_terminal() {
        assert!(!OrderError::InvalidData("missing payment".to_string()).is_retryable());
        assert!(!OrderError::DataNotFound.is_retryable());
        assert!(!OrderError::ConflictingData.is_retryable());
    }
}
