use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, UserId};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::model::{Booking, BookingStatus, NewBooking, SagaStep};
use crate::store::BookingStore;

#[derive(Default)]
struct Inner {
    bookings: HashMap<BookingId, Booking>,
    next_id: i64,
}

/// In-memory booking store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites a booking's `updated_at`, to age it in tests.
    pub async fn backdate(&self, id: BookingId, updated_at: DateTime<Utc>) {
        if let Some(booking) = self.inner.lock().await.bookings.get_mut(&id) {
            booking.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, booking: NewBooking) -> Result<Booking> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let now = Utc::now();
        let stored = Booking {
            id: BookingId::new(inner.next_id),
            user_id: booking.user_id,
            room_id: booking.room_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            quantity: booking.quantity,
            total_price: None,
            status: BookingStatus::Pending,
            saga_step: SagaStep::ReserveSent,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };
        inner.bookings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save(&self, mut booking: Booking) -> Result<Booking> {
        let mut inner = self.inner.lock().await;
        booking.updated_at = Utc::now();
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.inner.lock().await.bookings.get(&id).cloned())
    }

    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.id);
        Ok(bookings)
    }

    async fn find_stuck(
        &self,
        steps: &[SagaStep],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| steps.contains(&b.saga_step) && b.updated_at < updated_before)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.id);
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use common::RoomId;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn new_booking(user: i64) -> NewBooking {
        NewBooking {
            user_id: UserId::new(user),
            room_id: RoomId::new(101),
            check_in: date("2026-02-01"),
            check_out: date("2026-02-03"),
            quantity: 2,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids_in_pending() {
        let store = InMemoryBookingStore::new();
        let first = store.create(new_booking(1)).await.unwrap();
        let second = store.create(new_booking(1)).await.unwrap();

        assert_eq!(first.id, BookingId::new(1));
        assert_eq!(second.id, BookingId::new(2));
        assert_eq!(first.status, BookingStatus::Pending);
        assert_eq!(first.saga_step, SagaStep::ReserveSent);
    }

    #[tokio::test]
    async fn save_bumps_updated_at() {
        let store = InMemoryBookingStore::new();
        let booking = store.create(new_booking(1)).await.unwrap();
        let before = booking.updated_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let saved = store.save(booking).await.unwrap();
        assert!(saved.updated_at > before);
    }

    #[tokio::test]
    async fn find_stuck_filters_by_step_and_age() {
        let store = InMemoryBookingStore::new();
        let mut stuck = store.create(new_booking(1)).await.unwrap();
        stuck.saga_step = SagaStep::PaymentSent;
        let stuck = store.save(stuck).await.unwrap();

        let mut done = store.create(new_booking(1)).await.unwrap();
        done.saga_step = SagaStep::Confirmed;
        store.save(done).await.unwrap();

        let old = Utc::now() - std::time::Duration::from_secs(3600);
        store.backdate(stuck.id, old).await;

        let found = store
            .find_stuck(
                &[SagaStep::ReserveSent, SagaStep::PaymentSent],
                Utc::now() - std::time::Duration::from_secs(600),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stuck.id);
    }

    #[tokio::test]
    async fn for_user_returns_only_their_bookings() {
        let store = InMemoryBookingStore::new();
        store.create(new_booking(1)).await.unwrap();
        store.create(new_booking(2)).await.unwrap();
        store.create(new_booking(1)).await.unwrap();

        assert_eq!(store.for_user(UserId::new(1)).await.unwrap().len(), 2);
        assert_eq!(store.for_user(UserId::new(2)).await.unwrap().len(), 1);
    }
}
