//! Retry and backoff primitives shared by the database and messaging paths.

pub mod backoff;

pub use backoff::BackoffPolicy;
