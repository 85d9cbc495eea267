use chrono::NaiveDate;
use common::{RoomId, StayRangeError};
use idempotency::IdempotencyError;
use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The guarded decrement affected zero rows: the date is missing or
    /// under-stocked. Terminal for the request.
    #[error("insufficient availability for room {room_id} on {date} (requested {requested})")]
    InsufficientAvailability {
        room_id: RoomId,
        date: NaiveDate,
        requested: i32,
    },

    /// The reservation lock could not be acquired within the wait window.
    /// Retryable by the caller.
    #[error("could not acquire reservation lock {key}")]
    LockContended { key: String },

    /// The durable idempotency store could not answer; the reserve must not
    /// proceed.
    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),

    #[error("invalid stay: {0}")]
    InvalidStay(#[from] StayRangeError),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    /// Store-level failure. Callers treat the outcome as unclear.
    #[error("inventory store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::Store(e.to_string())
    }
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
