use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, UserId};

use crate::error::Result;
use crate::model::{Booking, NewBooking, SagaStep};

/// Storage owned by the booking service.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking in PENDING at the first step marker,
    /// assigning its id.
    async fn create(&self, booking: NewBooking) -> Result<Booking>;

    /// Persists the booking and bumps `updated_at`. Returns the stored row.
    async fn save(&self, booking: Booking) -> Result<Booking>;

    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;

    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>>;

    /// Bookings sitting at one of `steps` whose `updated_at` is older than
    /// `updated_before`. The recovery worker's scan query.
    async fn find_stuck(
        &self,
        steps: &[SagaStep],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;
}
