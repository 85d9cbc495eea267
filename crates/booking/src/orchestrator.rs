use std::sync::Arc;

use common::BookingId;
use idempotency::booking_key;
use inventory::ReserveRequest;
use payment::ChargeRequest;

use crate::clients::{InventoryApi, PaymentApi, RemoteError, codes};
use crate::error::{BookingError, Result};
use crate::events::{BookingConfirmed, BookingEventPublisher};
use crate::model::{Booking, BookingStatus, SagaStep};
use crate::retry::{RetryPolicy, retry_unclear};
use crate::store::BookingStore;

const PAYMENT_METHOD: &str = "CREDIT_CARD";

/// How a saga run ended, as a first-class value.
///
/// `PendingUnclear` is not a failure: the booking stays at its last written
/// step and the recovery worker will finish or fail it later. The external
/// interface maps it to an Accepted response.
#[derive(Debug)]
pub enum SagaOutcome {
    Confirmed(Booking),
    BusinessFailure {
        booking: Booking,
        code: String,
        message: String,
    },
    PendingUnclear(Booking),
}

impl SagaOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            SagaOutcome::Confirmed(b) => b,
            SagaOutcome::BusinessFailure { booking, .. } => booking,
            SagaOutcome::PendingUnclear(b) => b,
        }
    }
}

/// Drives the reserve → charge → confirm pipeline for one booking.
///
/// Step-write discipline: the intended step is persisted before every remote
/// effect and the completed step after it, so a crash at any point leaves a
/// row the recovery worker can resume from. Both remote effects carry the
/// booking-derived idempotency key, so resumption can only replay, never
/// double-apply.
pub struct BookingOrchestrator {
    bookings: Arc<dyn BookingStore>,
    inventory: Arc<dyn InventoryApi>,
    payment: Arc<dyn PaymentApi>,
    publisher: Arc<dyn BookingEventPublisher>,
    retry: RetryPolicy,
}

impl BookingOrchestrator {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        inventory: Arc<dyn InventoryApi>,
        payment: Arc<dyn PaymentApi>,
        publisher: Arc<dyn BookingEventPublisher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            bookings,
            inventory,
            payment,
            publisher,
            retry,
        }
    }

    /// Runs the saga for a freshly created booking.
    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id))]
    pub async fn execute(&self, mut booking: Booking) -> Result<SagaOutcome> {
        metrics::counter!("saga_executions_total").increment(1);
        let key = booking_key(booking.id);

        // Step 1: reserve
        tracing::info!(room_id = %booking.room_id, "saga step: reserve");
        booking.saga_step = SagaStep::ReserveSent;
        booking = self.bookings.save(booking).await?;

        let reserve_request = self.reserve_request(&booking, &key);
        match retry_unclear(&self.retry, || self.inventory.reserve(reserve_request.clone())).await {
            Ok(response) => {
                booking.total_price = Some(response.total_price);
                booking.saga_step = SagaStep::ReserveOk;
                booking = self.bookings.save(booking).await?;
            }
            Err(e) if e.is_unclear() => return self.pending_unclear(booking, e).await,
            Err(e) => return self.fail_with_release(booking, e).await,
        }

        // Step 2: charge
        tracing::info!(total_price = %booking.total_price.unwrap_or_default(), "saga step: charge");
        booking.saga_step = SagaStep::PaymentSent;
        booking = self.bookings.save(booking).await?;

        let charge_request = self.charge_request(&booking, &key)?;
        match retry_unclear(&self.retry, || self.payment.process(charge_request.clone())).await {
            Ok(response) if response.succeeded() => self.confirm(booking, response, false).await,
            Ok(response) => {
                // Definite decline: no money moved, safe to compensate.
                self.fail_with_release(
                    booking,
                    RemoteError::business(codes::PAYMENT_DECLINED, response.message),
                )
                .await
            }
            Err(e) if e.is_unclear() => self.pending_unclear(booking, e).await,
            Err(e) => self.fail_with_release(booking, e).await,
        }
    }

    /// Resumes a booking the recovery worker found stuck at RESERVE_SENT or
    /// PAYMENT_SENT, reusing the original idempotency key. Unclear failures
    /// leave the booking untouched for the next tick.
    #[tracing::instrument(skip(self))]
    pub async fn advance_stuck(&self, booking_id: BookingId) -> Result<()> {
        let Some(mut booking) = self.bookings.get(booking_id).await? else {
            return Ok(());
        };
        if !booking.saga_step.is_recoverable() {
            return Ok(());
        }
        let key = booking_key(booking.id);

        if booking.saga_step == SagaStep::ReserveSent {
            let reserve_request = self.reserve_request(&booking, &key);
            match retry_unclear(&self.retry, || self.inventory.reserve(reserve_request.clone()))
                .await
            {
                Ok(response) => {
                    booking.total_price = Some(response.total_price);
                    booking.saga_step = SagaStep::ReserveOk;
                    booking = self.bookings.save(booking).await?;
                }
                Err(e) if e.is_unclear() => {
                    tracing::warn!(%booking_id, error = %e, "recovery reserve unclear, leaving for next tick");
                    return Ok(());
                }
                Err(e) => {
                    self.fail_with_release(booking, e).await?;
                    return Ok(());
                }
            }
        }

        if booking.saga_step == SagaStep::ReserveOk {
            booking.saga_step = SagaStep::PaymentSent;
            booking = self.bookings.save(booking).await?;
        }

        let charge_request = self.charge_request(&booking, &key)?;
        match retry_unclear(&self.retry, || self.payment.process(charge_request.clone())).await {
            Ok(response) if response.succeeded() => {
                let outcome = self.confirm(booking, response, true).await?;
                if matches!(outcome, SagaOutcome::Confirmed(_)) {
                    metrics::counter!("saga_recovered").increment(1);
                    tracing::info!(%booking_id, "recovery advanced booking to CONFIRMED");
                }
            }
            Ok(response) => {
                self.fail_with_release(
                    booking,
                    RemoteError::business(codes::PAYMENT_DECLINED, response.message),
                )
                .await?;
            }
            Err(e) if e.is_unclear() => {
                tracing::warn!(%booking_id, error = %e, "recovery charge unclear, leaving for next tick");
            }
            Err(e) => {
                self.fail_with_release(booking, e).await?;
            }
        }
        Ok(())
    }

    /// Terminal action for a booking stuck past the give-up threshold.
    ///
    /// The policy is asymmetric: at RESERVE_SENT no money moved, so the room
    /// is released; at PAYMENT_SENT the charge may have succeeded, so the
    /// room is NOT released and an operator must reconcile (check the
    /// payment, then confirm or refund). Releasing there would risk
    /// "charged, no room"; keeping the hold is bounded by its TTL.
    #[tracing::instrument(skip(self))]
    pub async fn give_up(&self, booking_id: BookingId) -> Result<()> {
        let Some(mut booking) = self.bookings.get(booking_id).await? else {
            return Ok(());
        };

        match booking.saga_step {
            SagaStep::ReserveSent => {
                if let Err(e) = self.release(&booking).await {
                    tracing::error!(%booking_id, error = %e, "release failed while giving up");
                }
            }
            SagaStep::PaymentSent => {
                metrics::counter!("saga_give_up_unreconciled").increment(1);
                tracing::warn!(
                    %booking_id,
                    "giving up at PAYMENT_SENT: room not released, manual reconciliation required (check payment, then confirm or refund)"
                );
            }
            _ => return Ok(()),
        }

        booking.status = BookingStatus::Failed;
        booking.saga_step = SagaStep::Failed;
        self.bookings.save(booking).await?;
        metrics::counter!("saga_gave_up").increment(1);
        Ok(())
    }

    fn reserve_request(&self, booking: &Booking, key: &str) -> ReserveRequest {
        ReserveRequest {
            room_id: booking.room_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            quantity: booking.quantity,
            idempotency_key: Some(key.to_string()),
        }
    }

    fn charge_request(&self, booking: &Booking, key: &str) -> Result<ChargeRequest> {
        let amount = booking.total_price.ok_or_else(|| {
            BookingError::Internal(format!("booking {} has no total price at charge", booking.id))
        })?;
        Ok(ChargeRequest {
            user_id: booking.user_id,
            booking_id: booking.id,
            amount,
            payment_method: PAYMENT_METHOD.to_string(),
            idempotency_key: Some(key.to_string()),
        })
    }

    async fn confirm(
        &self,
        mut booking: Booking,
        charge: payment::ChargeResponse,
        recovery_confirmed: bool,
    ) -> Result<SagaOutcome> {
        // The charge definitely succeeded. If confirm cannot be delivered,
        // nothing here may compensate; the booking stays at PAYMENT_SENT and
        // recovery replays the memoized charge and confirms then.
        if let Err(e) = self.inventory.confirm_reservation(booking.id).await {
            tracing::warn!(booking_id = %booking.id, error = %e, "confirm undeliverable after successful charge, deferring to recovery");
            booking = self.bookings.save(booking).await?;
            return Ok(SagaOutcome::PendingUnclear(booking));
        }

        booking.payment_id = Some(charge.payment_id);
        booking.status = BookingStatus::Confirmed;
        booking.saga_step = SagaStep::Confirmed;
        booking = self.bookings.save(booking).await?;

        self.publisher
            .publish_confirmed(BookingConfirmed::from_booking(&booking, recovery_confirmed))
            .await;

        metrics::counter!("saga_completed").increment(1);
        tracing::info!(booking_id = %booking.id, "booking confirmed");
        Ok(SagaOutcome::Confirmed(booking))
    }

    async fn pending_unclear(&self, booking: Booking, cause: RemoteError) -> Result<SagaOutcome> {
        // Saga step deliberately unchanged; only the row's clock moves.
        tracing::warn!(
            booking_id = %booking.id,
            step = %booking.saga_step,
            error = %cause,
            "unclear remote failure, deferring to recovery"
        );
        let booking = self.bookings.save(booking).await?;
        metrics::counter!("saga_pending_unclear").increment(1);
        Ok(SagaOutcome::PendingUnclear(booking))
    }

    async fn fail_with_release(&self, mut booking: Booking, cause: RemoteError) -> Result<SagaOutcome> {
        if let Err(e) = self.release(&booking).await {
            // Compensation failure does not change the outcome; the holds
            // will lapse via TTL.
            tracing::error!(booking_id = %booking.id, error = %e, "release failed during compensation");
        }

        booking.status = BookingStatus::Failed;
        booking.saga_step = SagaStep::Failed;
        booking = self.bookings.save(booking).await?;

        metrics::counter!("saga_failed").increment(1);
        tracing::warn!(booking_id = %booking.id, error = %cause, "booking failed");

        let (code, message) = cause.into_code_message();
        Ok(SagaOutcome::BusinessFailure {
            booking,
            code,
            message,
        })
    }

    async fn release(&self, booking: &Booking) -> std::result::Result<(), RemoteError> {
        self.inventory
            .release(
                booking.room_id,
                booking.check_in,
                booking.check_out,
                booking.quantity,
                Some(booking.id),
            )
            .await
    }
}
