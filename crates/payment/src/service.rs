use std::sync::Arc;

use common::PaymentId;
use idempotency::{IdempotencyLayer, IdempotencyRecord};
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::gateway::{GatewayDecision, PaymentGateway};
use crate::model::{ChargeRequest, ChargeResponse, ChargeStatus, NewPayment, Payment, PaymentStatus};
use crate::store::{FinalizeOutcome, PaymentStore};

/// The charge surface of the payment service.
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    idempotency: IdempotencyLayer,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        idempotency: IdempotencyLayer,
    ) -> Self {
        Self {
            store,
            gateway,
            idempotency,
        }
    }

    /// Processes a charge.
    ///
    /// A replayed key returns the stored response verbatim with no gateway
    /// call. Otherwise the payment is inserted PENDING, the gateway decides,
    /// and the terminal status commits atomically with the memo.
    #[tracing::instrument(skip(self), fields(booking_id = %request.booking_id))]
    pub async fn charge(&self, request: ChargeRequest) -> Result<ChargeResponse> {
        if let Some(key) = request.key() {
            if let Some(cached) = self
                .idempotency
                .lookup::<ChargeResponse, _>(self.store.as_ref(), key)
                .await?
            {
                metrics::counter!("payment_charge_idempotent_replays").increment(1);
                return Ok(cached);
            }
        }

        let payment = self
            .store
            .insert_pending(NewPayment {
                user_id: request.user_id,
                booking_id: request.booking_id,
                amount: request.amount,
                payment_method: request.payment_method.clone(),
                transaction_id: Uuid::new_v4().to_string(),
            })
            .await?;

        let decision = self.gateway.authorize(&payment).await;
        let (status, response) = match decision {
            GatewayDecision::Approved => {
                tracing::info!(payment_id = %payment.id, transaction_id = %payment.transaction_id, "payment approved");
                (
                    PaymentStatus::Success,
                    ChargeResponse {
                        payment_id: payment.id,
                        status: ChargeStatus::Success,
                        message: "Payment processed successfully".to_string(),
                        transaction_id: payment.transaction_id.clone(),
                    },
                )
            }
            GatewayDecision::Declined { reason } => {
                tracing::warn!(payment_id = %payment.id, reason, "payment declined");
                (
                    PaymentStatus::Failed,
                    ChargeResponse {
                        payment_id: payment.id,
                        status: ChargeStatus::Failed,
                        message: reason,
                        transaction_id: payment.transaction_id.clone(),
                    },
                )
            }
        };

        let memo = match request.key() {
            Some(key) => Some(IdempotencyRecord::new(
                key,
                serde_json::to_string(&response).map_err(|e| PaymentError::Store(e.to_string()))?,
            )),
            None => None,
        };

        match self.store.finalize_charge(payment.id, status, memo).await? {
            FinalizeOutcome::Committed => {
                metrics::counter!("payment_charges_total", "status" => status.as_str()).increment(1);
                if let Some(key) = request.key() {
                    self.idempotency.warm(key, &response).await;
                }
                Ok(response)
            }
            FinalizeOutcome::DuplicateKey => {
                // A concurrent duplicate decided first; its memo is the
                // single truth for this key.
                let Some(key) = request.key() else {
                    return Err(PaymentError::Store(
                        "duplicate key outcome without a key".to_string(),
                    ));
                };
                let winning = self
                    .idempotency
                    .lookup::<ChargeResponse, _>(self.store.as_ref(), key)
                    .await?
                    .ok_or_else(|| {
                        PaymentError::Store("memo vanished after key conflict".to_string())
                    })?;
                Ok(winning)
            }
        }
    }

    pub async fn payment(&self, id: PaymentId) -> Result<Payment> {
        self.store
            .payment(id)
            .await?
            .ok_or(PaymentError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use common::{BookingId, Money, UserId};

    use super::*;
    use crate::gateway::SimulatedGateway;
    use crate::memory::InMemoryPaymentStore;

    fn service(gateway: SimulatedGateway) -> (PaymentService, Arc<InMemoryPaymentStore>) {
        let store = Arc::new(InMemoryPaymentStore::new());
        let service = PaymentService::new(
            store.clone(),
            Arc::new(gateway),
            IdempotencyLayer::disabled("idempotency:payment:"),
        );
        (service, store)
    }

    fn request(key: Option<&str>) -> ChargeRequest {
        ChargeRequest {
            user_id: UserId::new(1),
            booking_id: BookingId::new(42),
            amount: Money::from_major(400),
            payment_method: "CREDIT_CARD".to_string(),
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn approved_charge_returns_success() {
        let (service, store) = service(SimulatedGateway::always_approve());
        let response = service.charge(request(Some("booking-42"))).await.unwrap();

        assert!(response.succeeded());
        assert!(!response.transaction_id.is_empty());
        let stored = service.payment(response.payment_id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn declined_charge_is_terminal_failure() {
        let (service, _) = service(SimulatedGateway::always_decline());
        let response = service.charge(request(Some("booking-42"))).await.unwrap();

        assert_eq!(response.status, ChargeStatus::Failed);
        let stored = service.payment(response.payment_id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn same_key_charges_once_and_replays_the_response() {
        let (service, store) = service(SimulatedGateway::always_approve());
        let first = service.charge(request(Some("booking-42"))).await.unwrap();
        let second = service.charge(request(Some("booking-42"))).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn same_key_replays_declines_too() {
        let (service, store) = service(SimulatedGateway::always_decline());
        let first = service.charge(request(Some("booking-42"))).await.unwrap();

        // Even if the gateway would now approve, the memoized decline wins.
        let replay_service = PaymentService::new(
            store.clone(),
            Arc::new(SimulatedGateway::always_approve()),
            IdempotencyLayer::disabled("idempotency:payment:"),
        );
        let second = replay_service
            .charge(request(Some("booking-42")))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.status, ChargeStatus::Failed);
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn memo_outage_blocks_the_charge() {
        let (service, store) = service(SimulatedGateway::always_approve());
        store.set_memo_store_unavailable(true);

        let err = service.charge(request(Some("booking-42"))).await.unwrap_err();
        assert!(matches!(err, PaymentError::Idempotency(_)));

        store.set_memo_store_unavailable(false);
        assert_eq!(store.payment_count().await, 0, "no charge may have happened");
    }

    #[tokio::test]
    async fn unkeyed_charge_still_processes() {
        let (service, store) = service(SimulatedGateway::always_approve());
        let response = service.charge(request(None)).await.unwrap();
        assert!(response.succeeded());
        assert_eq!(store.payment_count().await, 1);
    }
}
