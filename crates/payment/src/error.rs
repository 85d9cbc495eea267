use common::PaymentId;
use idempotency::IdempotencyError;
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment {0} not found")]
    NotFound(PaymentId),

    /// The durable idempotency store could not answer; the charge must not
    /// proceed.
    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),

    #[error("amount must be positive")]
    InvalidAmount,

    /// Store-level failure. Callers treat the outcome as unclear.
    #[error("payment store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::Store(e.to_string())
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
