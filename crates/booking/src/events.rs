use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, Money, RoomId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::{Booking, BookingStatus};

/// Published when a booking reaches CONFIRMED.
///
/// Delivery is at-least-once; consumers deduplicate by `booking_id`.
/// `recovery_confirmed` distinguishes confirmations produced by the
/// recovery worker from request-driven ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingConfirmed {
    pub booking_id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_price: Money,
    pub status: BookingStatus,
    pub timestamp: DateTime<Utc>,
    pub recovery_confirmed: bool,
}

impl BookingConfirmed {
    pub fn from_booking(booking: &Booking, recovery_confirmed: bool) -> Self {
        Self {
            booking_id: booking.id,
            user_id: booking.user_id,
            room_id: booking.room_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            total_price: booking.total_price.unwrap_or_default(),
            status: booking.status,
            timestamp: Utc::now(),
            recovery_confirmed,
        }
    }
}

/// Outbound event seam. Publishing is fire-and-forget from the saga's point
/// of view; a lost publish is repaired by consumers re-reading state, never
/// by rolling the booking back.
#[async_trait]
pub trait BookingEventPublisher: Send + Sync {
    async fn publish_confirmed(&self, event: BookingConfirmed);
}

/// Records published events; used by tests and the default in-process
/// wiring.
#[derive(Clone, Default)]
pub struct InMemoryEventPublisher {
    events: Arc<RwLock<Vec<BookingConfirmed>>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<BookingConfirmed> {
        self.events.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl BookingEventPublisher for InMemoryEventPublisher {
    async fn publish_confirmed(&self, event: BookingConfirmed) {
        tracing::info!(
            booking_id = %event.booking_id,
            recovery_confirmed = event.recovery_confirmed,
            "publishing BookingConfirmed"
        );
        metrics::counter!("booking_confirmed_events").increment(1);
        self.events.write().await.push(event);
    }
}
