use async_trait::async_trait;
use common::{BookingId, Money, PaymentId, UserId};
use idempotency::{IdempotencyError, IdempotencyRecord, IdempotencyStore};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{PaymentError, Result};
use crate::model::{NewPayment, Payment, PaymentStatus};
use crate::store::{FinalizeOutcome, PaymentStore};

/// PostgreSQL-backed payment store.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let status: String = row.try_get("status")?;
        let status = match status.as_str() {
            "PENDING" => PaymentStatus::Pending,
            "SUCCESS" => PaymentStatus::Success,
            "FAILED" => PaymentStatus::Failed,
            "REFUNDED" => PaymentStatus::Refunded,
            other => return Err(PaymentError::Store(format!("unknown payment status {other}"))),
        };
        Ok(Payment {
            id: PaymentId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            booking_id: BookingId::new(row.try_get("booking_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            status,
            payment_method: row.try_get("payment_method")?,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl IdempotencyStore for PostgresPaymentStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, IdempotencyError> {
        sqlx::query_scalar("SELECT response_json FROM payment_idempotency WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IdempotencyError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert_pending(&self, payment: NewPayment) -> Result<Payment> {
        if !payment.amount.is_positive() {
            return Err(PaymentError::InvalidAmount);
        }
        let row = sqlx::query(
            r#"
            INSERT INTO payments (user_id, booking_id, amount_cents, status, payment_method, transaction_id)
            VALUES ($1, $2, $3, 'PENDING', $4, $5)
            RETURNING id, user_id, booking_id, amount_cents, status, payment_method, transaction_id, created_at
            "#,
        )
        .bind(payment.user_id.as_i64())
        .bind(payment.booking_id.as_i64())
        .bind(payment.amount.cents())
        .bind(&payment.payment_method)
        .bind(&payment.transaction_id)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_payment(row)
    }

    async fn finalize_charge(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        memo: Option<IdempotencyRecord>,
    ) -> Result<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Some(record) = &memo {
            let inserted = sqlx::query(
                r#"
                INSERT INTO payment_idempotency (idempotency_key, response_json)
                VALUES ($1, $2)
                ON CONFLICT (idempotency_key) DO NOTHING
                "#,
            )
            .bind(&record.key)
            .bind(&record.response_json)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                // Lost the unique-key race; the transaction rolls back and
                // the caller replays the winning memo.
                return Ok(FinalizeOutcome::DuplicateKey);
            }
        }

        let updated = sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(payment_id.as_i64())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(PaymentError::NotFound(payment_id));
        }

        tx.commit().await?;
        Ok(FinalizeOutcome::Committed)
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, booking_id, amount_cents, status, payment_method, transaction_id, created_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn payments_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, booking_id, amount_cents, status, payment_method, transaction_id, created_at
            FROM payments
            WHERE booking_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(booking_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }
}
