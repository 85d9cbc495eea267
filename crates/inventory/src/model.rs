use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, Money, RoomId, StayRange};
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Stock and nightly price for one (room, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub available_count: i32,
    pub price_per_night: Money,
    /// Monotonic counter bumped on every mutation of the row.
    pub version: i64,
}

/// A TTL-bounded claim on stock, created by a reserve that carried a
/// booking-derived idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationHold {
    pub id: i64,
    pub booking_id: BookingId,
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub quantity: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Instruction to attach holds to a reserve, derived from a `booking-{id}`
/// idempotency key.
#[derive(Debug, Clone, Copy)]
pub struct HoldSpec {
    pub booking_id: BookingId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
    pub idempotency_key: Option<String>,
}

impl ReserveRequest {
    /// The nightly dates of the request, validated and in ascending order.
    pub fn stay(&self) -> Result<StayRange, InventoryError> {
        Ok(StayRange::new(self.check_in, self.check_out)?)
    }

    /// The key, if present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.idempotency_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveResponse {
    pub reservation_id: i64,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
    pub total_price: Money,
    pub status: ReservationStatus,
}
