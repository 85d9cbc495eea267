//! Payment endpoints: process a charge, read a payment.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::PaymentId;
use payment::{ChargeRequest, ChargeResponse, Payment};

use crate::AppState;
use crate::error::ApiError;

/// POST /payments — idempotent charge.
#[tracing::instrument(skip(state, req))]
pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChargeRequest>,
) -> Result<Json<ChargeResponse>, ApiError> {
    let response = state.payments.charge(req).await?;
    Ok(Json(response))
}

/// GET /payments/{id} — one payment row.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state.payments.payment(PaymentId::new(id)).await?;
    Ok(Json(payment))
}
