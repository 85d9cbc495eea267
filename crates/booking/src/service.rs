use std::sync::Arc;

use chrono::NaiveDate;
use common::{BookingId, RoomId, StayRange, UserId};

use crate::error::{BookingError, Result};
use crate::model::{Booking, NewBooking};
use crate::orchestrator::{BookingOrchestrator, SagaOutcome};
use crate::store::BookingStore;

/// Command to create and run a booking.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
}

/// The booking service: persists the booking, then hands it to the
/// orchestrator.
pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    orchestrator: Arc<BookingOrchestrator>,
}

impl BookingService {
    pub fn new(bookings: Arc<dyn BookingStore>, orchestrator: Arc<BookingOrchestrator>) -> Self {
        Self {
            bookings,
            orchestrator,
        }
    }

    /// Creates a booking in PENDING before any remote call, then runs the
    /// saga to a first-class outcome.
    #[tracing::instrument(skip(self), fields(user_id = %command.user_id, room_id = %command.room_id))]
    pub async fn create_booking(&self, command: CreateBooking) -> Result<SagaOutcome> {
        StayRange::new(command.check_in, command.check_out)?;
        if command.quantity <= 0 {
            return Err(BookingError::InvalidQuantity(command.quantity));
        }

        let booking = self
            .bookings
            .create(NewBooking {
                user_id: command.user_id,
                room_id: command.room_id,
                check_in: command.check_in,
                check_out: command.check_out,
                quantity: command.quantity,
            })
            .await?;
        tracing::info!(booking_id = %booking.id, "created booking, starting saga");

        self.orchestrator.execute(booking).await
    }

    pub async fn booking(&self, id: BookingId) -> Result<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    pub async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        self.bookings.for_user(user_id).await
    }
}
