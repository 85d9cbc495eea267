use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, Money, PaymentId, RoomId, StayRange, StayRangeError, UserId};
use serde::{Deserialize, Serialize};

/// Externally visible booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Saga progress marker, written before and after each remote effect.
///
/// ```text
/// RESERVE_SENT ──► RESERVE_OK ──► PAYMENT_SENT ──► CONFIRMED
///       │                              │
///       └────────── FAILED ◄───────────┘
/// ```
///
/// Only the orchestrator moves the step, and only forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStep {
    ReserveSent,
    ReserveOk,
    PaymentSent,
    Confirmed,
    Failed,
}

impl SagaStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::ReserveSent => "RESERVE_SENT",
            SagaStep::ReserveOk => "RESERVE_OK",
            SagaStep::PaymentSent => "PAYMENT_SENT",
            SagaStep::Confirmed => "CONFIRMED",
            SagaStep::Failed => "FAILED",
        }
    }

    /// A step at which a crashed saga is worth recovering.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SagaStep::ReserveSent | SagaStep::PaymentSent)
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
    /// Set once reserve succeeds and the nightly prices are known.
    pub total_price: Option<Money>,
    pub status: BookingStatus,
    pub saga_step: SagaStep,
    pub payment_id: Option<PaymentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn stay(&self) -> Result<StayRange, StayRangeError> {
        StayRange::new(self.check_in, self.check_out)
    }
}

/// A booking to create in PENDING before any remote call is made.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
}
