//! Prometheus metrics plumbing.
//!
//! Installs the global recorder once and serves the text exposition on a
//! dedicated listener, separate from the read API. Metric names are
//! declared here so every subsystem records against the same registry.

use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Metric name constants.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_EVICTIONS_TOTAL: &str = "cache_evictions_total";

    pub const DB_TRANSACTION_DURATION_SECONDS: &str = "db_transaction_duration_seconds";
    pub const DB_TRANSACTION_RETRIES_TOTAL: &str = "db_transaction_retries_total";
    pub const DB_TRANSACTION_FAILURES_TOTAL: &str = "db_transaction_failures_total";

    pub const KAFKA_MESSAGES_PROCESSED_TOTAL: &str = "kafka_messages_processed_total";
    pub const KAFKA_MESSAGES_FAILED_TOTAL: &str = "kafka_messages_failed_total";

    pub const DLQ_MESSAGES_TOTAL: &str = "dlq_messages_total";
    pub const DLQ_ERRORS_TOTAL: &str = "dlq_errors_total";

    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
}

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Safe to call more than once;
/// subsequent calls return the existing handle.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("install prometheus recorder");

            describe_counter!(names::CACHE_HITS_TOTAL, "Total number of cache hits");
            describe_counter!(names::CACHE_MISSES_TOTAL, "Total number of cache misses");
            describe_counter!(
                names::CACHE_EVICTIONS_TOTAL,
                "Total number of cache evictions by reason"
            );
            describe_histogram!(
                names::DB_TRANSACTION_DURATION_SECONDS,
                "Duration of database transactions in seconds"
            );
            describe_counter!(
                names::DB_TRANSACTION_RETRIES_TOTAL,
                "Total number of transaction retries"
            );
            describe_counter!(
                names::DB_TRANSACTION_FAILURES_TOTAL,
                "Total number of failed transactions"
            );
            describe_counter!(
                names::KAFKA_MESSAGES_PROCESSED_TOTAL,
                "Total number of stream messages read"
            );
            describe_counter!(
                names::KAFKA_MESSAGES_FAILED_TOTAL,
                "Total number of stream messages that exhausted their retries"
            );
            describe_counter!(
                names::DLQ_MESSAGES_TOTAL,
                "Total number of messages published to the dead-letter topic"
            );
            describe_counter!(
                names::DLQ_ERRORS_TOTAL,
                "Total number of dead-letter publication failures"
            );
            describe_counter!(names::HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");
            describe_histogram!(
                names::HTTP_REQUEST_DURATION_SECONDS,
                "Duration of HTTP requests in seconds"
            );

            tracing::info!("prometheus metrics recorder initialized");
            handle
        })
        .clone()
}

/// Returns the global Prometheus handle, if initialized.
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

/// Router for the dedicated metrics listener: `GET /metrics` only.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(serve_metrics))
}

async fn serve_metrics() -> impl IntoResponse {
    prometheus_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain; charset=utf-8")],
                "metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; charset=utf-8")],
                handle.render(),
            )
        },
    )
}
