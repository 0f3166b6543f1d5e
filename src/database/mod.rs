//! PostgreSQL connection pool and transaction management.

pub mod connection;
pub mod transaction;

pub use connection::connect;
pub use transaction::TransactionManager;
