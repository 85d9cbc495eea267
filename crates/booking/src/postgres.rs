use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, Money, PaymentId, RoomId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{BookingError, Result};
use crate::model::{Booking, BookingStatus, NewBooking, SagaStep};
use crate::store::BookingStore;

/// PostgreSQL-backed booking store.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn parse_status(s: &str) -> Result<BookingStatus> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "FAILED" => Ok(BookingStatus::Failed),
            other => Err(BookingError::Store(format!("unknown booking status {other}"))),
        }
    }

    fn parse_step(s: &str) -> Result<SagaStep> {
        match s {
            "RESERVE_SENT" => Ok(SagaStep::ReserveSent),
            "RESERVE_OK" => Ok(SagaStep::ReserveOk),
            "PAYMENT_SENT" => Ok(SagaStep::PaymentSent),
            "CONFIRMED" => Ok(SagaStep::Confirmed),
            "FAILED" => Ok(SagaStep::Failed),
            other => Err(BookingError::Store(format!("unknown saga step {other}"))),
        }
    }

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let status: String = row.try_get("status")?;
        let step: String = row.try_get("saga_step")?;
        let total_price: Option<i64> = row.try_get("total_price_cents")?;
        let payment_id: Option<i64> = row.try_get("payment_id")?;
        Ok(Booking {
            id: BookingId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            room_id: RoomId::new(row.try_get("room_id")?),
            check_in: row.try_get("check_in_date")?,
            check_out: row.try_get("check_out_date")?,
            quantity: row.try_get("quantity")?,
            total_price: total_price.map(Money::from_cents),
            status: Self::parse_status(&status)?,
            saga_step: Self::parse_step(&step)?,
            payment_id: payment_id.map(PaymentId::new),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, room_id, check_in_date, check_out_date, quantity, total_price_cents, status, saga_step, payment_id, created_at, updated_at";

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn create(&self, booking: NewBooking) -> Result<Booking> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO bookings (user_id, room_id, check_in_date, check_out_date, quantity, status, saga_step)
            VALUES ($1, $2, $3, $4, $5, 'PENDING', 'RESERVE_SENT')
            RETURNING {BOOKING_COLUMNS}
            "#,
        ))
        .bind(booking.user_id.as_i64())
        .bind(booking.room_id.as_i64())
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.quantity)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_booking(row)
    }

    async fn save(&self, booking: Booking) -> Result<Booking> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE bookings
            SET total_price_cents = $2, status = $3, saga_step = $4, payment_id = $5, updated_at = now()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#,
        ))
        .bind(booking.id.as_i64())
        .bind(booking.total_price.map(|p| p.cents()))
        .bind(booking.status.as_str())
        .bind(booking.saga_step.as_str())
        .bind(booking.payment_id.map(|p| p.as_i64()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_booking(row),
            None => Err(BookingError::NotFound(booking.id)),
        }
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY id ASC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn find_stuck(
        &self,
        steps: &[SagaStep],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let step_names: Vec<String> = steps.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE saga_step = ANY($1) AND updated_at < $2
            ORDER BY updated_at ASC
            "#,
        ))
        .bind(&step_names)
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
