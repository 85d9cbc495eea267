use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::error::Result;
use crate::model::SagaStep;
use crate::orchestrator::BookingOrchestrator;
use crate::store::BookingStore;

/// Recovery worker tuning, read from configuration at startup.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub enabled: bool,
    /// Scan cadence.
    pub interval: Duration,
    /// Minimum age before a mid-pipeline booking counts as stuck.
    pub stuck_after: Duration,
    /// Age at which the give-up policy runs instead of another retry.
    pub give_up_after: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
            stuck_after: Duration::from_secs(10 * 60),
            give_up_after: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What one recovery tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub examined: usize,
    pub gave_up: usize,
}

/// Periodic scan for bookings stuck at RESERVE_SENT or PAYMENT_SENT.
///
/// Each stuck booking is either advanced (retried with its original
/// idempotency key) or, past the give-up threshold, terminated under the
/// asymmetric give-up policy. Per-booking failures are logged and the scan
/// moves on; the next tick retries. A single instance of this worker is
/// assumed.
pub struct RecoveryWorker {
    bookings: Arc<dyn BookingStore>,
    orchestrator: Arc<BookingOrchestrator>,
    config: RecoveryConfig,
}

impl RecoveryWorker {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        orchestrator: Arc<BookingOrchestrator>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            bookings,
            orchestrator,
            config,
        }
    }

    /// One recovery tick.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RecoveryStats> {
        if !self.config.enabled {
            return Ok(RecoveryStats::default());
        }

        let now = Utc::now();
        let stuck = self
            .bookings
            .find_stuck(
                &[SagaStep::ReserveSent, SagaStep::PaymentSent],
                now - self.config.stuck_after,
            )
            .await?;
        if stuck.is_empty() {
            return Ok(RecoveryStats::default());
        }

        tracing::info!(count = stuck.len(), "recovering stuck bookings");
        let give_up_before = now - self.config.give_up_after;
        let mut stats = RecoveryStats {
            examined: stuck.len(),
            gave_up: 0,
        };

        for booking in stuck {
            let result = if booking.updated_at < give_up_before {
                tracing::warn!(
                    booking_id = %booking.id,
                    step = %booking.saga_step,
                    "booking stuck past give-up threshold"
                );
                stats.gave_up += 1;
                self.orchestrator.give_up(booking.id).await
            } else {
                self.orchestrator.advance_stuck(booking.id).await
            };
            if let Err(e) = result {
                tracing::error!(booking_id = %booking.id, error = %e, "recovery failed for booking");
            }
        }

        metrics::counter!("saga_recovery_ticks").increment(1);
        Ok(stats)
    }

    /// Runs until the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "recovery tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("recovery worker stopping");
                    break;
                }
            }
        }
    }
}
