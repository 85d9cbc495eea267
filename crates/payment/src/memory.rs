use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{BookingId, PaymentId};
use idempotency::{IdempotencyError, IdempotencyRecord, IdempotencyStore};
use tokio::sync::Mutex;

use crate::error::{PaymentError, Result};
use crate::model::{NewPayment, Payment, PaymentStatus};
use crate::store::{FinalizeOutcome, PaymentStore};

#[derive(Default)]
struct Inner {
    payments: HashMap<PaymentId, Payment>,
    memos: HashMap<String, String>,
    next_id: i64,
}

/// In-memory payment store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    inner: Arc<Mutex<Inner>>,
    memo_unavailable: Arc<AtomicBool>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the durable memo store fail, to exercise the
    /// `ServiceUnavailable` path.
    pub fn set_memo_store_unavailable(&self, unavailable: bool) {
        self.memo_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn payment_count(&self) -> usize {
        self.inner.lock().await.payments.len()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryPaymentStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, IdempotencyError> {
        if self.memo_unavailable.load(Ordering::SeqCst) {
            return Err(IdempotencyError::Unavailable(
                "memo store offline".to_string(),
            ));
        }
        Ok(self.inner.lock().await.memos.get(key).cloned())
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_pending(&self, payment: NewPayment) -> Result<Payment> {
        if !payment.amount.is_positive() {
            return Err(PaymentError::InvalidAmount);
        }
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let stored = Payment {
            id: PaymentId::new(inner.next_id),
            user_id: payment.user_id,
            booking_id: payment.booking_id,
            amount: payment.amount,
            status: PaymentStatus::Pending,
            payment_method: payment.payment_method,
            transaction_id: payment.transaction_id,
            created_at: Utc::now(),
        };
        inner.payments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn finalize_charge(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        memo: Option<IdempotencyRecord>,
    ) -> Result<FinalizeOutcome> {
        if self.memo_unavailable.load(Ordering::SeqCst) {
            return Err(PaymentError::Idempotency(IdempotencyError::Unavailable(
                "memo store offline".to_string(),
            )));
        }
        let mut inner = self.inner.lock().await;
        if let Some(record) = &memo {
            if inner.memos.contains_key(&record.key) {
                return Ok(FinalizeOutcome::DuplicateKey);
            }
        }
        let payment = inner
            .payments
            .get_mut(&payment_id)
            .ok_or(PaymentError::NotFound(payment_id))?;
        payment.status = status;
        if let Some(record) = memo {
            inner.memos.insert(record.key, record.response_json);
        }
        Ok(FinalizeOutcome::Committed)
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.inner.lock().await.payments.get(&id).cloned())
    }

    async fn payments_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        let inner = self.inner.lock().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.id);
        Ok(payments)
    }
}
