//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking::BookingError;
use idempotency::IdempotencyError;
use inventory::InventoryError;
use payment::PaymentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Malformed request from the client.
    BadRequest(String),
    /// A definite negative outcome of a legitimate request, with its code.
    Business { code: String, message: String },
    /// A dependency cannot answer safely; retry later with the same key.
    ServiceUnavailable(String),
    /// Unexpected bug.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, None, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, None, msg),
            ApiError::Business { code, message } => {
                (StatusCode::BAD_REQUEST, Some(code), message)
            }
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, None, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None, msg)
            }
        };

        let body = match code {
            Some(code) => serde_json::json!({ "error": message, "code": code }),
            None => serde_json::json!({ "error": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match &err {
            InventoryError::InsufficientAvailability { .. } => ApiError::Business {
                code: booking::codes::INSUFFICIENT_AVAILABILITY.to_string(),
                message: err.to_string(),
            },
            InventoryError::LockContended { .. } => ApiError::Business {
                code: booking::codes::RESERVATION_LOCK_TIMEOUT.to_string(),
                message: err.to_string(),
            },
            InventoryError::InvalidStay(_) | InventoryError::InvalidQuantity(_) => {
                ApiError::BadRequest(err.to_string())
            }
            InventoryError::Idempotency(IdempotencyError::Unavailable(_)) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            InventoryError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match &err {
            PaymentError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PaymentError::InvalidAmount => ApiError::BadRequest(err.to_string()),
            PaymentError::Idempotency(IdempotencyError::Unavailable(_)) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            PaymentError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match &err {
            BookingError::NotFound(_) => ApiError::NotFound(err.to_string()),
            BookingError::InvalidStay(_) | BookingError::InvalidQuantity(_) => {
                ApiError::BadRequest(err.to_string())
            }
            BookingError::Store(_) | BookingError::Internal(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}
