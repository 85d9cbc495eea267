use std::time::Duration;

use async_trait::async_trait;

use crate::model::Payment;

/// Outcome of an authorization attempt at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayDecision {
    Approved,
    Declined { reason: String },
}

/// The payment gateway seam. The simulation below stands in for a real
/// processor integration; everything else in this crate only depends on the
/// decision coming back.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, payment: &Payment) -> GatewayDecision;
}

/// Gateway simulation: a brief pause and a randomized decision.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    approval_rate: f64,
    delay: Duration,
}

impl SimulatedGateway {
    pub fn new(approval_rate: f64, delay: Duration) -> Self {
        Self {
            approval_rate,
            delay,
        }
    }

    /// Deterministically approves. Useful for tests and demos.
    pub fn always_approve() -> Self {
        Self::new(1.0, Duration::ZERO)
    }

    /// Deterministically declines.
    pub fn always_decline() -> Self {
        Self::new(0.0, Duration::ZERO)
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(0.9, Duration::from_millis(100))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(&self, payment: &Payment) -> GatewayDecision {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if rand::random::<f64>() < self.approval_rate {
            GatewayDecision::Approved
        } else {
            tracing::debug!(payment_id = %payment.id, "simulated gateway declined");
            GatewayDecision::Declined {
                reason: "Payment processing failed. Please try again.".to_string(),
            }
        }
    }
}
