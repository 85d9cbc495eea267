use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, Money, RoomId, StayRange};
use idempotency::IdempotencyStore;

use crate::error::Result;
use crate::model::{HoldSpec, ReservationHold, ReserveRequest, ReserveResponse, RoomAvailability};

/// Transactional storage owned by the inventory service.
///
/// Every mutating method is atomic: either all of its row changes commit or
/// none do. `reserve` in particular covers the guarded decrements, the hold
/// rows, and the idempotency memo in one transaction, so no user-visible
/// effect can survive without its memo.
///
/// The store doubles as inventory's durable [`IdempotencyStore`]: the memo
/// table lives in the same database as the stock it protects.
#[async_trait]
pub trait InventoryStore: IdempotencyStore {
    /// Executes a reserve against stock.
    ///
    /// For each nightly date in ascending order, applies the guarded
    /// decrement (`available_count >= quantity` or zero rows affected). A
    /// zero-row decrement aborts the whole reserve with
    /// `InsufficientAvailability` and rolls back the dates already taken.
    /// On success, the total price is the sum of nightly prices times
    /// quantity, one hold row per date is written when `hold` is given, and
    /// the memo for `request.idempotency_key` is written in the same
    /// transaction.
    ///
    /// If the key was already memoized (a concurrent duplicate won the
    /// unique-key race), the stored response is returned and no effect is
    /// applied.
    async fn reserve(
        &self,
        request: &ReserveRequest,
        hold: Option<HoldSpec>,
    ) -> Result<ReserveResponse>;

    /// Credits stock back (compensation).
    ///
    /// With a `booking_id`, the credit is keyed off hold existence: each of
    /// the booking's holds is deleted and its quantity credited to its own
    /// (room, date); if the holds are already gone the call is a no-op,
    /// making repeated release safe. Without a `booking_id` the credit is a
    /// blind per-date increment and must not be repeated by the caller.
    async fn release(
        &self,
        room_id: RoomId,
        stay: &StayRange,
        quantity: i32,
        booking_id: Option<BookingId>,
    ) -> Result<()>;

    /// Deletes every hold for a booking (confirm). Returns how many were
    /// removed; a second call removes zero and is a no-op.
    async fn delete_holds(&self, booking_id: BookingId) -> Result<usize>;

    /// Credits and deletes every hold with `expires_at < now`. Returns the
    /// number of holds released.
    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Creates or replaces the stock row for one (room, date).
    async fn upsert_availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        available_count: i32,
        price_per_night: Money,
    ) -> Result<()>;

    async fn availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Option<RoomAvailability>>;

    async fn holds_for_booking(&self, booking_id: BookingId) -> Result<Vec<ReservationHold>>;
}
