use axum::http::StatusCode;

/// `GET /health` — liveness only, no dependencies probed.
pub async fn health() -> StatusCode {
    StatusCode::OK
}
