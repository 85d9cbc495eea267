use common::{BookingId, StayRangeError};
use thiserror::Error;

/// Errors that can occur in the booking service and orchestrator.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking {0} not found")]
    NotFound(BookingId),

    #[error("invalid stay: {0}")]
    InvalidStay(#[from] StayRangeError),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("booking store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        BookingError::Store(e.to_string())
    }
}

/// Convenience type alias for booking results.
pub type Result<T> = std::result::Result<T, BookingError>;
