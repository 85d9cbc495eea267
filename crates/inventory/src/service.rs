use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use common::{BookingId, Money, RoomId, StayRange};
use idempotency::{IdempotencyLayer, parse_booking_key};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, Result};
use crate::lock::{LockError, LockProvider};
use crate::model::{HoldSpec, ReservationHold, ReserveRequest, ReserveResponse, RoomAvailability};
use crate::store::InventoryStore;

/// The reserve / confirm / release surface of the inventory service.
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    lock: Arc<dyn LockProvider>,
    idempotency: IdempotencyLayer,
    config: InventoryConfig,
}

impl InventoryService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        lock: Arc<dyn LockProvider>,
        idempotency: IdempotencyLayer,
        config: InventoryConfig,
    ) -> Self {
        Self {
            store,
            lock,
            idempotency,
            config,
        }
    }

    /// Reserves stock for a stay.
    ///
    /// The lock key pins the room and first night so competing reserves for
    /// the same stay queue up instead of hammering the guarded decrement;
    /// correctness never depends on it. Holds are only attached when the
    /// idempotency key has the `booking-{id}` form.
    #[tracing::instrument(skip(self), fields(room_id = %request.room_id))]
    pub async fn reserve(&self, request: ReserveRequest) -> Result<ReserveResponse> {
        let stay = request.stay()?;

        if let Some(key) = request.key() {
            if let Some(cached) = self
                .idempotency
                .lookup::<ReserveResponse, _>(self.store.as_ref(), key)
                .await?
            {
                metrics::counter!("inventory_reserve_idempotent_replays").increment(1);
                return Ok(cached);
            }
        }

        let lock_key = format!("room:{}:{}", request.room_id, stay.check_in());
        let lease = self
            .lock
            .acquire(&lock_key, self.config.lock_wait, self.config.lock_lease)
            .await
            .map_err(|e| match e {
                LockError::AcquireTimeout { key } => InventoryError::LockContended { key },
                LockError::Backend(msg) => InventoryError::Store(msg),
            })?;
        tracing::debug!(lock_key, "acquired reservation lock");

        let hold = request
            .key()
            .and_then(parse_booking_key)
            .map(|booking_id| HoldSpec {
                booking_id,
                expires_at: Utc::now() + self.config.hold_ttl,
            });

        let result = self.store.reserve(&request, hold).await;

        if let Err(e) = self.lock.release(&lease).await {
            tracing::warn!(lock_key, error = %e, "failed to release reservation lock");
        }

        let response = result?;
        metrics::counter!("inventory_reserves_total").increment(1);

        if let Some(key) = request.key() {
            self.idempotency.warm(key, &response).await;
        }
        Ok(response)
    }

    /// Removes a booking's holds after payment success so the reaper will
    /// not credit the stock back. A second call is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, booking_id: BookingId) -> Result<usize> {
        let removed = self.store.delete_holds(booking_id).await?;
        tracing::info!(%booking_id, removed, "confirmed reservation");
        Ok(removed)
    }

    /// Compensating release. See [`InventoryStore::release`] for the
    /// idempotency contract around `booking_id`.
    #[tracing::instrument(skip(self))]
    pub async fn release(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
        booking_id: Option<BookingId>,
    ) -> Result<()> {
        let stay = StayRange::new(check_in, check_out)?;
        self.store
            .release(room_id, &stay, quantity, booking_id)
            .await?;
        metrics::counter!("inventory_releases_total").increment(1);
        tracing::info!(%room_id, %check_in, %check_out, quantity, "released stock");
        Ok(())
    }

    /// Seeds or replaces the stock row for one (room, date).
    pub async fn seed_availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        available_count: i32,
        price_per_night: Money,
    ) -> Result<()> {
        self.store
            .upsert_availability(room_id, date, available_count, price_per_night)
            .await
    }

    pub async fn availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Option<RoomAvailability>> {
        self.store.availability(room_id, date).await
    }

    pub async fn holds_for_booking(&self, booking_id: BookingId) -> Result<Vec<ReservationHold>> {
        self.store.holds_for_booking(booking_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::lock::InMemoryLockProvider;
    use crate::memory::InMemoryInventoryStore;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn service() -> (InventoryService, Arc<InMemoryInventoryStore>) {
        let store = Arc::new(InMemoryInventoryStore::new());
        let service = InventoryService::new(
            store.clone(),
            Arc::new(InMemoryLockProvider::new()),
            IdempotencyLayer::disabled("idempotency:reserve:"),
            InventoryConfig::default(),
        );
        for d in ["2026-02-01", "2026-02-02"] {
            service
                .seed_availability(RoomId::new(101), date(d), 5, Money::from_major(100))
                .await
                .unwrap();
        }
        (service, store)
    }

    fn request(key: Option<&str>) -> ReserveRequest {
        ReserveRequest {
            room_id: RoomId::new(101),
            check_in: date("2026-02-01"),
            check_out: date("2026-02-03"),
            quantity: 2,
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn booking_key_creates_one_hold_per_night() {
        let (service, _) = service().await;
        service.reserve(request(Some("booking-42"))).await.unwrap();

        let holds = service
            .holds_for_booking(BookingId::new(42))
            .await
            .unwrap();
        assert_eq!(holds.len(), 2);
        assert!(holds.iter().all(|h| h.quantity == 2));
        assert!(holds.iter().all(|h| h.expires_at > Utc::now()));
    }

    #[tokio::test]
    async fn unstructured_key_creates_no_holds() {
        let (service, store) = service().await;
        service
            .reserve(request(Some("ops-manual-retry")))
            .await
            .unwrap();
        assert_eq!(store.hold_count().await, 0);

        // Still memoized and still decremented.
        let row = service
            .availability(RoomId::new(101), date("2026-02-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.available_count, 3);
    }

    #[tokio::test]
    async fn repeated_reserve_with_same_key_is_one_effect() {
        let (service, _) = service().await;
        let first = service.reserve(request(Some("booking-42"))).await.unwrap();
        let second = service.reserve(request(Some("booking-42"))).await.unwrap();

        assert_eq!(first, second);
        let row = service
            .availability(RoomId::new(101), date("2026-02-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.available_count, 3);
        assert_eq!(
            service
                .holds_for_booking(BookingId::new(42))
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn memo_outage_fails_before_any_effect() {
        let (service, store) = service().await;
        store.set_memo_store_unavailable(true);

        let err = service
            .reserve(request(Some("booking-42")))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Idempotency(_)));

        store.set_memo_store_unavailable(false);
        let row = service
            .availability(RoomId::new(101), date("2026-02-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.available_count, 5);
    }

    #[tokio::test]
    async fn contended_lock_surfaces_as_retryable_error() {
        let (_, store) = service().await;
        let lock = Arc::new(InMemoryLockProvider::new());
        let service = InventoryService::new(
            store,
            lock.clone(),
            IdempotencyLayer::disabled("idempotency:reserve:"),
            InventoryConfig {
                lock_wait: Duration::from_millis(40),
                ..InventoryConfig::default()
            },
        );

        let _held = lock
            .acquire("room:101:2026-02-01", Duration::from_millis(40), Duration::from_secs(30))
            .await
            .unwrap();

        let err = service.reserve(request(None)).await.unwrap_err();
        assert!(matches!(err, InventoryError::LockContended { .. }));
    }

    #[tokio::test]
    async fn confirm_is_idempotent() {
        let (service, _) = service().await;
        service.reserve(request(Some("booking-9"))).await.unwrap();

        assert_eq!(service.confirm(BookingId::new(9)).await.unwrap(), 2);
        assert_eq!(service.confirm(BookingId::new(9)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn release_after_confirm_does_not_over_credit() {
        let (service, _) = service().await;
        service.reserve(request(Some("booking-9"))).await.unwrap();
        service.confirm(BookingId::new(9)).await.unwrap();

        service
            .release(
                RoomId::new(101),
                date("2026-02-01"),
                date("2026-02-03"),
                2,
                Some(BookingId::new(9)),
            )
            .await
            .unwrap();

        let row = service
            .availability(RoomId::new(101), date("2026-02-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.available_count, 3, "confirmed stock stays taken");
    }
}
