use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error produced when the durable idempotency store cannot answer.
///
/// There is deliberately no "soft" variant: if the store cannot be read, the
/// operation must not proceed, because a missing memo would be
/// indistinguishable from "never processed" and retrying the effect could
/// duplicate it.
#[derive(Debug, Clone, Error)]
pub enum IdempotencyError {
    #[error("idempotency store unavailable: {0}")]
    Unavailable(String),
}

/// A memoized response, written in the same transaction as the effect it
/// records. Keys are immutable and their stored response is write-once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub key: String,
    pub response_json: String,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(key: impl Into<String>, response_json: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            response_json: response_json.into(),
            created_at: Utc::now(),
        }
    }
}

/// Durable lookup of memoized responses.
///
/// Implemented by each service's own store so that the memo table lives in
/// the same database (and transaction scope) as the service's side effects.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Looks up the stored response for a key.
    ///
    /// `Ok(None)` means the key has never been processed. `Err` means the
    /// store could not answer; callers must surface this instead of
    /// proceeding.
    async fn get(&self, key: &str) -> Result<Option<String>, IdempotencyError>;
}
