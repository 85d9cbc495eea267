use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, Money, RoomId, StayRange};
use idempotency::{IdempotencyError, IdempotencyStore};
use tokio::sync::Mutex;

use crate::error::{InventoryError, Result};
use crate::model::{
    HoldSpec, ReservationHold, ReservationStatus, ReserveRequest, ReserveResponse,
    RoomAvailability,
};
use crate::store::InventoryStore;

#[derive(Default)]
struct Inner {
    availability: HashMap<(RoomId, NaiveDate), RoomAvailability>,
    holds: HashMap<i64, ReservationHold>,
    memos: HashMap<String, String>,
    next_reservation_id: i64,
    next_hold_id: i64,
}

impl Inner {
    fn credit(&mut self, room_id: RoomId, date: NaiveDate, quantity: i32) {
        if let Some(row) = self.availability.get_mut(&(room_id, date)) {
            row.available_count += quantity;
            row.version += 1;
        }
    }
}

/// In-memory inventory store for tests and single-process deployments.
///
/// One mutex guards stock, holds, and memos together, giving every store
/// operation the same all-or-nothing semantics as a database transaction.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    inner: Arc<Mutex<Inner>>,
    memo_unavailable: Arc<AtomicBool>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the durable memo store fail, to exercise the
    /// `ServiceUnavailable` path.
    pub fn set_memo_store_unavailable(&self, unavailable: bool) {
        self.memo_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total number of live holds across all bookings.
    pub async fn hold_count(&self) -> usize {
        self.inner.lock().await.holds.len()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryInventoryStore {
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
impl InventoryStore for InMemoryInventoryStore {
    async fn reserve(
        &self,
        request: &ReserveRequest,
        hold: Option<HoldSpec>,
    ) -> Result<ReserveResponse> {
        let stay = request.stay()?;
        if request.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(request.quantity));
        }

        let mut inner = self.inner.lock().await;

        // Duplicate requests serialize on the memo key: the loser of the
        // race observes the winner's memo here and applies no effect.
        if let Some(key) = request.key() {
            if self.memo_unavailable.load(Ordering::SeqCst) {
                return Err(InventoryError::Idempotency(IdempotencyError::Unavailable(
                    "memo store offline".to_string(),
                )));
            }
            if let Some(json) = inner.memos.get(key) {
                return serde_json::from_str(json).map_err(|e| {
                    InventoryError::Idempotency(IdempotencyError::Unavailable(format!(
                        "stored response undecodable: {e}"
                    )))
                });
            }
        }

        // Validate every nightly date before mutating anything, which is
        // how a rolled-back transaction looks from the outside.
        let mut total_price = Money::zero();
        for date in stay.nights() {
            let row = inner.availability.get(&(request.room_id, date));
            match row {
                Some(row) if row.available_count >= request.quantity => {
                    total_price += row.price_per_night.multiply(request.quantity as u32);
                }
                _ => {
                    return Err(InventoryError::InsufficientAvailability {
                        room_id: request.room_id,
                        date,
                        requested: request.quantity,
                    });
                }
            }
        }

        for date in stay.nights() {
            if let Some(row) = inner.availability.get_mut(&(request.room_id, date)) {
                row.available_count -= request.quantity;
                row.version += 1;
            }
        }

        inner.next_reservation_id += 1;
        let response = ReserveResponse {
            reservation_id: inner.next_reservation_id,
            room_id: request.room_id,
            check_in: request.check_in,
            check_out: request.check_out,
            quantity: request.quantity,
            total_price,
            status: ReservationStatus::Reserved,
        };

        if let Some(spec) = hold {
            let now = Utc::now();
            for date in stay.nights() {
                inner.next_hold_id += 1;
                let id = inner.next_hold_id;
                inner.holds.insert(
                    id,
                    ReservationHold {
                        id,
                        booking_id: spec.booking_id,
                        room_id: request.room_id,
                        date,
                        quantity: request.quantity,
                        expires_at: spec.expires_at,
                        created_at: now,
                    },
                );
            }
        }

        if let Some(key) = request.key() {
            let json = serde_json::to_string(&response)
                .map_err(|e| InventoryError::Store(e.to_string()))?;
            inner.memos.insert(key.to_string(), json);
        }

        Ok(response)
    }

    async fn release(
        &self,
        room_id: RoomId,
        stay: &StayRange,
        quantity: i32,
        booking_id: Option<BookingId>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match booking_id {
            Some(booking_id) => {
                // Keyed off hold existence: credit exactly what the holds
                // still claim, nothing if they are gone.
                let released: Vec<ReservationHold> = {
                    let ids: Vec<i64> = inner
                        .holds
                        .values()
                        .filter(|h| h.booking_id == booking_id)
                        .map(|h| h.id)
                        .collect();
                    ids.into_iter()
                        .filter_map(|id| inner.holds.remove(&id))
                        .collect()
                };
                for hold in released {
                    inner.credit(hold.room_id, hold.date, hold.quantity);
                }
            }
            None => {
                for date in stay.nights() {
                    inner.credit(room_id, date, quantity);
                }
            }
        }
        Ok(())
    }

    async fn delete_holds(&self, booking_id: BookingId) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let ids: Vec<i64> = inner
            .holds
            .values()
            .filter(|h| h.booking_id == booking_id)
            .map(|h| h.id)
            .collect();
        for id in &ids {
            inner.holds.remove(id);
        }
        Ok(ids.len())
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<ReservationHold> = {
            let ids: Vec<i64> = inner
                .holds
                .values()
                .filter(|h| h.expires_at < now)
                .map(|h| h.id)
                .collect();
            ids.into_iter()
                .filter_map(|id| inner.holds.remove(&id))
                .collect()
        };
        let count = expired.len();
        for hold in expired {
            inner.credit(hold.room_id, hold.date, hold.quantity);
        }
        Ok(count)
    }

    async fn upsert_availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        available_count: i32,
        price_per_night: Money,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.availability.insert(
            (room_id, date),
            RoomAvailability {
                room_id,
                date,
                available_count,
                price_per_night,
                version: 0,
            },
        );
        Ok(())
    }

    async fn availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Option<RoomAvailability>> {
        Ok(self
            .inner
            .lock()
            .await
            .availability
            .get(&(room_id, date))
            .cloned())
    }

    async fn holds_for_booking(&self, booking_id: BookingId) -> Result<Vec<ReservationHold>> {
        let inner = self.inner.lock().await;
        let mut holds: Vec<ReservationHold> = inner
            .holds
            .values()
            .filter(|h| h.booking_id == booking_id)
            .cloned()
            .collect();
        holds.sort_by_key(|h| h.date);
        Ok(holds)
    }
}
