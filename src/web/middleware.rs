use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

use crate::metrics::names as metric;

const REQUEST_ID_HEADER: &str = "x-request-id";
const UNMATCHED_ENDPOINT: &str = "unmatched";
const SLOW_REQUEST_SECS: f64 = 1.0;

fn endpoint_label<B>(request: &axum::http::Request<B>) -> String {
    request.extensions().get::<MatchedPath>().map_or_else(
        || UNMATCHED_ENDPOINT.to_string(),
        |path| path.as_str().to_string(),
    )
}

/// Tags every request with a fresh request id: carried as a tracing span
/// field on all logs the request emits, and echoed in the `x-request-id`
/// response header.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("request", request_id = %request_id);

    let mut response = next.run(request).instrument(span).await;
    response.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id.to_string()).unwrap(),
    );
    response
}

/// Logs the request line and records a counter and duration histogram per
/// request, labeled by route template (never the raw path), method and
/// status.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(&request);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    tracing::info!(
        method = %method,
        path = %path,
        status = %status,
        duration_ms = (duration * 1000.0) as u64,
        user_agent = %user_agent,
        "http request"
    );

    let labels = [
        ("endpoint", endpoint.clone()),
        ("method", method.clone()),
        ("status", status.clone()),
    ];
    metrics::counter!(metric::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(metric::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration);

    if duration > SLOW_REQUEST_SECS {
        tracing::warn!(
            endpoint = %endpoint,
            method = %method,
            status = %status,
            duration_secs = duration,
            "slow request"
        );
    }

    response
}
