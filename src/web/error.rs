use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::errors::OrderError;

/// HTTP projection of the service error taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Malformed uid or invalid order data.
    BadRequest(String),
    NotFound,
    /// Per-request deadline elapsed.
    Timeout,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
            ApiError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Request timed out".to_string()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal service error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidData(_) => ApiError::BadRequest(
                "Invalid order data. Check delivery, payment and items.".to_string(),
            ),
            OrderError::DataNotFound => ApiError::NotFound,
            OrderError::Timeout(_) => ApiError::Timeout,
            _ => ApiError::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_expected_statuses() {
        assert!(matches!(
            ApiError::from(OrderError::InvalidData("x".to_string())),
            ApiError::BadRequest(_)
        ));
        assert_eq!(ApiError::from(OrderError::DataNotFound), ApiError::NotFound);
        assert_eq!(
            ApiError::from(OrderError::Timeout("deadline".to_string())),
            ApiError::Timeout
        );
        assert_eq!(
            ApiError::from(OrderError::Database("boom".to_string())),
            ApiError::Internal
        );
        // Conflicts resolve idempotently in the writer; if one ever leaks
        // it must not surface as a client error.
        assert_eq!(
            ApiError::from(OrderError::ConflictingData),
            ApiError::Internal
        );
    }

    #[test]
    fn responses_carry_json_error_bodies() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Timeout.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = ApiError::BadRequest("Invalid order UID format".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
