use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, Money, RoomId, StayRange};
use idempotency::{IdempotencyError, IdempotencyStore};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{InventoryError, Result};
use crate::model::{
    HoldSpec, ReservationHold, ReservationStatus, ReserveRequest, ReserveResponse,
    RoomAvailability,
};
use crate::store::InventoryStore;

/// PostgreSQL-backed inventory store.
///
/// Each mutating method runs inside one transaction; the guarded decrement
/// relies on the database's rows-affected semantics, so concurrent reserves
/// serialize on the availability row itself.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_availability(row: PgRow) -> Result<RoomAvailability> {
        Ok(RoomAvailability {
            room_id: RoomId::new(row.try_get("room_id")?),
            date: row.try_get("availability_date")?,
            available_count: row.try_get("available_count")?,
            price_per_night: Money::from_cents(row.try_get("price_per_night_cents")?),
            version: row.try_get("version")?,
        })
    }

    fn row_to_hold(row: PgRow) -> Result<ReservationHold> {
        Ok(ReservationHold {
            id: row.try_get("id")?,
            booking_id: BookingId::new(row.try_get("booking_id")?),
            room_id: RoomId::new(row.try_get("room_id")?),
            date: row.try_get("availability_date")?,
            quantity: row.try_get("quantity")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl IdempotencyStore for PostgresInventoryStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, IdempotencyError> {
        sqlx::query_scalar("SELECT response_json FROM reserve_idempotency WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IdempotencyError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn reserve(
        &self,
        request: &ReserveRequest,
        hold: Option<HoldSpec>,
    ) -> Result<ReserveResponse> {
        let stay = request.stay()?;
        if request.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(request.quantity));
        }

        let mut tx = self.pool.begin().await?;

        if let Some(key) = request.key() {
            let existing: Option<String> = sqlx::query_scalar(
                "SELECT response_json FROM reserve_idempotency WHERE idempotency_key = $1",
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| IdempotencyError::Unavailable(e.to_string()))?;
            if let Some(json) = existing {
                return serde_json::from_str(&json).map_err(|e| {
                    InventoryError::Idempotency(IdempotencyError::Unavailable(format!(
                        "stored response undecodable: {e}"
                    )))
                });
            }
        }

        // Guarded decrement per nightly date, ascending. Zero rows affected
        // means missing or under-stocked; dropping the transaction rolls
        // back the dates already taken.
        for date in stay.nights() {
            let result = sqlx::query(
                r#"
                UPDATE room_availability
                SET available_count = available_count - $3, version = version + 1
                WHERE room_id = $1 AND availability_date = $2 AND available_count >= $3
                "#,
            )
            .bind(request.room_id.as_i64())
            .bind(date)
            .bind(request.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(InventoryError::InsufficientAvailability {
                    room_id: request.room_id,
                    date,
                    requested: request.quantity,
                });
            }
        }

        let nightly_sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(price_per_night_cents), 0)::BIGINT
            FROM room_availability
            WHERE room_id = $1 AND availability_date >= $2 AND availability_date < $3
            "#,
        )
        .bind(request.room_id.as_i64())
        .bind(stay.check_in())
        .bind(stay.check_out())
        .fetch_one(&mut *tx)
        .await?;
        let total_price = Money::from_cents(nightly_sum).multiply(request.quantity as u32);

        let response = ReserveResponse {
            reservation_id: Utc::now().timestamp_millis(),
            room_id: request.room_id,
            check_in: request.check_in,
            check_out: request.check_out,
            quantity: request.quantity,
            total_price,
            status: ReservationStatus::Reserved,
        };

        if let Some(spec) = hold {
            for date in stay.nights() {
                sqlx::query(
                    r#"
                    INSERT INTO reservation_holds (booking_id, room_id, availability_date, quantity, expires_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(spec.booking_id.as_i64())
                .bind(request.room_id.as_i64())
                .bind(date)
                .bind(request.quantity)
                .bind(spec.expires_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(key) = request.key() {
            let json = serde_json::to_string(&response)
                .map_err(|e| InventoryError::Store(e.to_string()))?;
            let inserted = sqlx::query(
                r#"
                INSERT INTO reserve_idempotency (idempotency_key, response_json)
                VALUES ($1, $2)
                ON CONFLICT (idempotency_key) DO NOTHING
                "#,
            )
            .bind(key)
            .bind(&json)
            .execute(&mut *tx)
            .await?;

            // Lost the unique-key race to a concurrent duplicate: abandon
            // our effect and replay the winner's memo.
            if inserted.rows_affected() == 0 {
                drop(tx);
                let winning: Option<String> = self
                    .get(key)
                    .await
                    .map_err(InventoryError::Idempotency)?;
                let json = winning.ok_or_else(|| {
                    InventoryError::Store("memo vanished after key conflict".to_string())
                })?;
                return serde_json::from_str(&json).map_err(|e| {
                    InventoryError::Idempotency(IdempotencyError::Unavailable(format!(
                        "stored response undecodable: {e}"
                    )))
                });
            }
        }

        tx.commit().await?;
        Ok(response)
    }

    async fn release(
        &self,
        room_id: RoomId,
        stay: &StayRange,
        quantity: i32,
        booking_id: Option<BookingId>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        match booking_id {
            Some(booking_id) => {
                let holds = sqlx::query(
                    "DELETE FROM reservation_holds WHERE booking_id = $1 RETURNING id, booking_id, room_id, availability_date, quantity, expires_at, created_at",
                )
                .bind(booking_id.as_i64())
                .fetch_all(&mut *tx)
                .await?;

                for row in holds {
                    let hold = Self::row_to_hold(row)?;
                    sqlx::query(
                        r#"
                        UPDATE room_availability
                        SET available_count = available_count + $3, version = version + 1
                        WHERE room_id = $1 AND availability_date = $2
                        "#,
                    )
                    .bind(hold.room_id.as_i64())
                    .bind(hold.date)
                    .bind(hold.quantity)
                    .execute(&mut *tx)
                    .await?;
                }
            }
            None => {
                for date in stay.nights() {
                    sqlx::query(
                        r#"
                        UPDATE room_availability
                        SET available_count = available_count + $3, version = version + 1
                        WHERE room_id = $1 AND availability_date = $2
                        "#,
                    )
                    .bind(room_id.as_i64())
                    .bind(date)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_holds(&self, booking_id: BookingId) -> Result<usize> {
        let result = sqlx::query("DELETE FROM reservation_holds WHERE booking_id = $1")
            .bind(booking_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let expired = sqlx::query(
            "DELETE FROM reservation_holds WHERE expires_at < $1 RETURNING id, booking_id, room_id, availability_date, quantity, expires_at, created_at",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let count = expired.len();
        for row in expired {
            let hold = Self::row_to_hold(row)?;
            sqlx::query(
                r#"
                UPDATE room_availability
                SET available_count = available_count + $3, version = version + 1
                WHERE room_id = $1 AND availability_date = $2
                "#,
            )
            .bind(hold.room_id.as_i64())
            .bind(hold.date)
            .bind(hold.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(count)
    }

    async fn upsert_availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        available_count: i32,
        price_per_night: Money,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO room_availability (room_id, availability_date, available_count, price_per_night_cents, version)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (room_id, availability_date)
            DO UPDATE SET available_count = $3, price_per_night_cents = $4, version = room_availability.version + 1
            "#,
        )
        .bind(room_id.as_i64())
        .bind(date)
        .bind(available_count)
        .bind(price_per_night.cents())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn availability(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Option<RoomAvailability>> {
        let row = sqlx::query(
            r#"
            SELECT room_id, availability_date, available_count, price_per_night_cents, version
            FROM room_availability
            WHERE room_id = $1 AND availability_date = $2
            "#,
        )
        .bind(room_id.as_i64())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_availability).transpose()
    }

    async fn holds_for_booking(&self, booking_id: BookingId) -> Result<Vec<ReservationHold>> {
        let rows = sqlx::query(
            r#"
            SELECT id, booking_id, room_id, availability_date, quantity, expires_at, created_at
            FROM reservation_holds
            WHERE booking_id = $1
            ORDER BY availability_date ASC
            "#,
        )
        .bind(booking_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_hold).collect()
    }
}
