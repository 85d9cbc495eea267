use async_trait::async_trait;
use common::{BookingId, PaymentId};
use idempotency::{IdempotencyRecord, IdempotencyStore};

use crate::error::Result;
use crate::model::{NewPayment, Payment, PaymentStatus};

/// Result of committing a terminal charge decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Decision and memo committed together.
    Committed,
    /// A concurrent charge with the same key committed first; this side's
    /// decision was discarded and the caller must replay the winner's memo.
    DuplicateKey,
}

/// Transactional storage owned by the payment service.
///
/// Doubles as payment's durable [`IdempotencyStore`]; the memo table lives
/// next to the payments it memoizes.
#[async_trait]
pub trait PaymentStore: IdempotencyStore {
    /// Inserts a PENDING payment row, assigning its id. Happens before the
    /// gateway is consulted; a crash afterwards leaves a PENDING row with no
    /// memo, which a keyed retry supersedes.
    async fn insert_pending(&self, payment: NewPayment) -> Result<Payment>;

    /// Writes the terminal status and, when a memo is supplied, the
    /// idempotency record in the same transaction. Serializes on the memo's
    /// unique key: the losing side of a duplicate race gets
    /// [`FinalizeOutcome::DuplicateKey`] and no state change.
    async fn finalize_charge(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        memo: Option<IdempotencyRecord>,
    ) -> Result<FinalizeOutcome>;

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn payments_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>>;
}
