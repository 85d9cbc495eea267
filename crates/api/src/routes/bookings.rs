//! Booking endpoints: create (runs the saga), get, list by user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use booking::{Booking, CreateBooking, SagaOutcome};
use chrono::{DateTime, NaiveDate, Utc};
use common::{Money, RoomId, UserId};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: i64,
    pub room_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
}

/// Booking as shown to clients, status and saga step included.
#[derive(Serialize)]
pub struct BookingView {
    pub id: i64,
    pub user_id: i64,
    pub room_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
    pub total_price: Option<Money>,
    pub status: String,
    pub saga_step: String,
    pub payment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Booking> for BookingView {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id.as_i64(),
            user_id: b.user_id.as_i64(),
            room_id: b.room_id.as_i64(),
            check_in: b.check_in,
            check_out: b.check_out,
            quantity: b.quantity,
            total_price: b.total_price,
            status: b.status.as_str().to_string(),
            saga_step: b.saga_step.as_str().to_string(),
            payment_id: b.payment_id.map(|p| p.as_i64()),
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    pub booking: BookingView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /bookings — create a booking and run the saga to an outcome.
///
/// `200` on CONFIRMED, `202` with a "being processed" message when the
/// outcome is pending-unclear, and a business-error response with its code
/// on a clear failure.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), ApiError> {
    let outcome = state
        .bookings
        .create_booking(CreateBooking {
            user_id: UserId::new(req.user_id),
            room_id: RoomId::new(req.room_id),
            check_in: req.check_in,
            check_out: req.check_out,
            quantity: req.quantity,
        })
        .await?;

    match outcome {
        SagaOutcome::Confirmed(booking) => Ok((
            StatusCode::OK,
            Json(CreateBookingResponse {
                booking: BookingView::from(&booking),
                message: None,
            }),
        )),
        SagaOutcome::PendingUnclear(booking) => Ok((
            StatusCode::ACCEPTED,
            Json(CreateBookingResponse {
                booking: BookingView::from(&booking),
                message: Some("Booking is being processed. Check status shortly.".to_string()),
            }),
        )),
        SagaOutcome::BusinessFailure { code, message, .. } => {
            Err(ApiError::Business { code, message })
        }
    }
}

/// GET /bookings/{id} — current view of one booking.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<BookingView>, ApiError> {
    let booking = state.bookings.booking(common::BookingId::new(id)).await?;
    Ok(Json(BookingView::from(&booking)))
}

/// GET /users/{user_id}/bookings — all bookings for a user.
#[tracing::instrument(skip(state))]
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<BookingView>>, ApiError> {
    let bookings = state
        .bookings
        .bookings_for_user(UserId::new(user_id))
        .await?;
    Ok(Json(bookings.iter().map(BookingView::from).collect()))
}
