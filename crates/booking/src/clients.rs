use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, RoomId};
use idempotency::IdempotencyError;
use inventory::{InventoryError, InventoryService, ReserveRequest, ReserveResponse};
use payment::{ChargeRequest, ChargeResponse, PaymentError, PaymentService};
use thiserror::Error;

/// Error codes surfaced to callers on clear failures.
pub mod codes {
    pub const INSUFFICIENT_AVAILABILITY: &str = "INSUFFICIENT_AVAILABILITY";
    pub const PAYMENT_DECLINED: &str = "PAYMENT_DECLINED";
    pub const RESERVATION_LOCK_TIMEOUT: &str = "RESERVATION_LOCK_TIMEOUT";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const BOOKING_FAILED: &str = "BOOKING_FAILED";
}

/// How a remote call failed, as seen by the orchestrator.
///
/// `Business` is the only *clear* kind: the remote answered with a definite
/// negative and compensation is safe. Everything else means the remote may
/// have applied the effect, so the orchestrator must not compensate.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("{code}: {message}")]
    Business { code: String, message: String },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("remote call timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn business(code: &str, message: impl Into<String>) -> Self {
        RemoteError::Business {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// The failure classifier: true when the remote's state is unknown.
    pub fn is_unclear(&self) -> bool {
        !matches!(self, RemoteError::Business { .. })
    }

    pub fn into_code_message(self) -> (String, String) {
        match self {
            RemoteError::Business { code, message } => (code, message),
            other => (codes::BOOKING_FAILED.to_string(), other.to_string()),
        }
    }
}

/// The inventory service as seen from the orchestrator.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn reserve(&self, request: ReserveRequest) -> Result<ReserveResponse, RemoteError>;

    async fn confirm_reservation(&self, booking_id: BookingId) -> Result<(), RemoteError>;

    async fn release(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
        booking_id: Option<BookingId>,
    ) -> Result<(), RemoteError>;
}

/// The payment service as seen from the orchestrator.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn process(&self, request: ChargeRequest) -> Result<ChargeResponse, RemoteError>;
}

fn map_inventory_error(e: InventoryError) -> RemoteError {
    match e {
        InventoryError::InsufficientAvailability { .. } => {
            RemoteError::business(codes::INSUFFICIENT_AVAILABILITY, e.to_string())
        }
        InventoryError::LockContended { .. } => {
            RemoteError::business(codes::RESERVATION_LOCK_TIMEOUT, e.to_string())
        }
        InventoryError::InvalidStay(_) | InventoryError::InvalidQuantity(_) => {
            RemoteError::business(codes::INVALID_REQUEST, e.to_string())
        }
        InventoryError::Idempotency(IdempotencyError::Unavailable(msg)) => {
            RemoteError::Unavailable(msg)
        }
        InventoryError::Store(msg) => RemoteError::Transport(msg),
    }
}

fn map_payment_error(e: PaymentError) -> RemoteError {
    match e {
        PaymentError::NotFound(_) => RemoteError::business(codes::RESOURCE_NOT_FOUND, e.to_string()),
        PaymentError::InvalidAmount => RemoteError::business(codes::INVALID_REQUEST, e.to_string()),
        PaymentError::Idempotency(IdempotencyError::Unavailable(msg)) => {
            RemoteError::Unavailable(msg)
        }
        PaymentError::Store(msg) => RemoteError::Transport(msg),
    }
}

/// In-process adapter over the inventory service, for single-process
/// deployments and tests. A networked deployment would put an HTTP client
/// behind the same trait.
pub struct LocalInventoryApi {
    service: Arc<InventoryService>,
}

impl LocalInventoryApi {
    pub fn new(service: Arc<InventoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl InventoryApi for LocalInventoryApi {
    async fn reserve(&self, request: ReserveRequest) -> Result<ReserveResponse, RemoteError> {
        self.service.reserve(request).await.map_err(map_inventory_error)
    }

    async fn confirm_reservation(&self, booking_id: BookingId) -> Result<(), RemoteError> {
        self.service
            .confirm(booking_id)
            .await
            .map(|_| ())
            .map_err(map_inventory_error)
    }

    async fn release(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
        booking_id: Option<BookingId>,
    ) -> Result<(), RemoteError> {
        self.service
            .release(room_id, check_in, check_out, quantity, booking_id)
            .await
            .map_err(map_inventory_error)
    }
}

/// In-process adapter over the payment service.
pub struct LocalPaymentApi {
    service: Arc<PaymentService>,
}

impl LocalPaymentApi {
    pub fn new(service: Arc<PaymentService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PaymentApi for LocalPaymentApi {
    async fn process(&self, request: ChargeRequest) -> Result<ChargeResponse, RemoteError> {
        self.service.charge(request).await.map_err(map_payment_error)
    }
}

/// Decorator that fails scripted calls before delegating, for exercising the
/// failure classifier without a flaky network.
///
/// Faults apply to the primary effect of each client (`reserve`,
/// `process`); confirm and release always pass through. Once the script is
/// drained, calls pass through unchanged.
pub struct ScriptedFaults<A> {
    inner: A,
    script: Mutex<VecDeque<RemoteError>>,
}

impl<A> ScriptedFaults<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Queues a failure for the next primary call.
    pub fn push_fault(&self, fault: RemoteError) {
        self.script.lock().unwrap().push_back(fault);
    }

    fn next_fault(&self) -> Option<RemoteError> {
        self.script.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl<A: InventoryApi> InventoryApi for ScriptedFaults<A> {
    async fn reserve(&self, request: ReserveRequest) -> Result<ReserveResponse, RemoteError> {
        if let Some(fault) = self.next_fault() {
            return Err(fault);
        }
        self.inner.reserve(request).await
    }

    async fn confirm_reservation(&self, booking_id: BookingId) -> Result<(), RemoteError> {
        self.inner.confirm_reservation(booking_id).await
    }

    async fn release(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
        booking_id: Option<BookingId>,
    ) -> Result<(), RemoteError> {
        self.inner
            .release(room_id, check_in, check_out, quantity, booking_id)
            .await
    }
}

#[async_trait]
impl<A: PaymentApi> PaymentApi for ScriptedFaults<A> {
    async fn process(&self, request: ChargeRequest) -> Result<ChargeResponse, RemoteError> {
        if let Some(fault) = self.next_fault() {
            return Err(fault);
        }
        self.inner.process(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_failures_are_clear() {
        assert!(!RemoteError::business(codes::PAYMENT_DECLINED, "declined").is_unclear());
    }

    #[test]
    fn transport_failures_are_unclear() {
        assert!(RemoteError::Timeout.is_unclear());
        assert!(RemoteError::Unavailable("503".to_string()).is_unclear());
        assert!(RemoteError::Transport("reset".to_string()).is_unclear());
    }

    #[test]
    fn insufficient_availability_maps_to_business() {
        let e = map_inventory_error(InventoryError::InsufficientAvailability {
            room_id: RoomId::new(101),
            date: "2026-02-01".parse().unwrap(),
            requested: 2,
        });
        assert!(matches!(
            e,
            RemoteError::Business { ref code, .. } if code == codes::INSUFFICIENT_AVAILABILITY
        ));
    }

    #[test]
    fn store_errors_map_to_unclear_transport() {
        let e = map_inventory_error(InventoryError::Store("connection reset".to_string()));
        assert!(e.is_unclear());
        let e = map_payment_error(PaymentError::Store("connection reset".to_string()));
        assert!(e.is_unclear());
    }

    #[test]
    fn idempotency_outage_maps_to_unavailable() {
        let e = map_payment_error(PaymentError::Idempotency(IdempotencyError::Unavailable(
            "offline".to_string(),
        )));
        assert!(matches!(e, RemoteError::Unavailable(_)));
        assert!(e.is_unclear());
    }
}
