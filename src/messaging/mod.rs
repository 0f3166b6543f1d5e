//! Kafka intake and the dead-letter pipeline.
//!
//! `consumer` drives the ingest topic through the bounded-retry writer;
//! `dlq` owns the dead-letter envelope and its producer; `reprocessor`
//! periodically drains the dead-letter topic looking for recoverable
//! messages.

pub mod consumer;
pub mod dlq;
pub mod reprocessor;

pub use consumer::OrderConsumer;
pub use dlq::{process_with_retry, Dlq, DlqEnvelope, DlqMetadata, SourceMessage};
pub use reprocessor::{plan_replay, DlqReprocessor, ReplayPlan};
