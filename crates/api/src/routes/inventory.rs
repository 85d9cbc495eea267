//! Inventory endpoints: reserve, confirm, release, and availability
//! seeding/inspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use common::{BookingId, Money, RoomId};
use inventory::{ReserveRequest, ReserveResponse, RoomAvailability};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

/// POST /inventory/reserve — idempotent stock reservation.
#[tracing::instrument(skip(state, req))]
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReserveRequest>,
) -> Result<Json<ReserveResponse>, ApiError> {
    let response = state.inventory.reserve(req).await?;
    Ok(Json(response))
}

/// POST /inventory/confirm/{booking_id} — drop a booking's holds.
#[tracing::instrument(skip(state))]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state
        .inventory
        .confirm(BookingId::new(booking_id))
        .await?;
    Ok(Json(serde_json::json!({ "removed_holds": removed })))
}

#[derive(Deserialize)]
pub struct ReleaseRequest {
    pub room_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
    pub booking_id: Option<i64>,
}

/// POST /inventory/release — compensating stock credit.
#[tracing::instrument(skip(state, req))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReleaseRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .inventory
        .release(
            RoomId::new(req.room_id),
            req.check_in,
            req.check_out,
            req.quantity,
            req.booking_id.map(BookingId::new),
        )
        .await?;
    Ok(Json(serde_json::json!({ "released": true })))
}

#[derive(Deserialize)]
pub struct SeedAvailabilityRequest {
    pub room_id: i64,
    pub date: NaiveDate,
    pub available_count: i32,
    pub price_per_night: Money,
}

/// PUT /inventory/availability — seed or replace one (room, date) row.
#[tracing::instrument(skip(state, req))]
pub async fn seed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SeedAvailabilityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .inventory
        .seed_availability(
            RoomId::new(req.room_id),
            req.date,
            req.available_count,
            req.price_per_night,
        )
        .await?;
    Ok(Json(serde_json::json!({ "seeded": true })))
}

/// GET /inventory/availability/{room_id}/{date} — one stock row.
#[tracing::instrument(skip(state))]
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Path((room_id, date)): Path<(i64, NaiveDate)>,
) -> Result<Json<RoomAvailability>, ApiError> {
    let row = state
        .inventory
        .availability(RoomId::new(room_id), date)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no availability for room {room_id} on {date}"))
        })?;
    Ok(Json(row))
}
