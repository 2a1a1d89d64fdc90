//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path, query or body value.
    BadRequest(String),
    /// Missing or invalid caller identity.
    Unauthorized(String),
    /// Caller is known but lacks the required role.
    Forbidden(String),
    /// Order orchestration or payment error.
    Fulfillment(FulfillmentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    match &err {
        FulfillmentError::ProductNotFound(_)
        | FulfillmentError::OrderNotFound(_)
        | FulfillmentError::ProcessNotFound(_)
        | FulfillmentError::PaymentNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        FulfillmentError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
        FulfillmentError::InvalidOrder(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        FulfillmentError::ProcessStartFailed { .. }
        | FulfillmentError::Engine(_)
        | FulfillmentError::Payment(_) => {
            tracing::warn!(error = %err, "upstream service error");
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        FulfillmentError::Store(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, ProductId};
    use domain::OrderError;
    use store::StoreError;

    use super::*;

    fn status_of(err: FulfillmentError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_fulfillment_errors_keep_distinct_statuses() {
        assert_eq!(
            status_of(FulfillmentError::ProductNotFound(ProductId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(FulfillmentError::InsufficientStock {
                product_name: "Widget".to_string(),
                available: 1,
                requested: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(FulfillmentError::ProcessNotFound(OrderId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(FulfillmentError::InvalidOrder(OrderError::NoItems)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(FulfillmentError::Store(StoreError::Unavailable)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_access_errors() {
        assert_eq!(
            ApiError::Unauthorized("missing".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("admin only".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
