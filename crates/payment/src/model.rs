use chrono::{DateTime, Utc};
use common::{BookingId, Money, PaymentId, UserId};
use serde::{Deserialize, Serialize};

/// Lifecycle of a payment row. Terminal rows are never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub booking_id: BookingId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

/// A payment to insert in PENDING before the gateway is consulted.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: UserId,
    pub booking_id: BookingId,
    pub amount: Money,
    pub payment_method: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub user_id: UserId,
    pub booking_id: BookingId,
    pub amount: Money,
    pub payment_method: String,
    pub idempotency_key: Option<String>,
}

impl ChargeRequest {
    /// The key, if present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.idempotency_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Terminal charge decision as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub payment_id: PaymentId,
    pub status: ChargeStatus,
    pub message: String,
    pub transaction_id: String,
}

impl ChargeResponse {
    pub fn succeeded(&self) -> bool {
        self.status == ChargeStatus::Success
    }
}
