use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::error::Result;
use crate::store::InventoryStore;

/// Background task that credits stock back for holds whose TTL elapsed.
///
/// Runs on a fixed interval, makes no RPCs, and relies on the store to
/// serialize against confirm/release at the row level. A crashed saga can
/// therefore pin inventory for at most `hold_ttl + interval`.
pub struct HoldReaper {
    store: Arc<dyn InventoryStore>,
    interval: Duration,
}

impl HoldReaper {
    pub fn new(store: Arc<dyn InventoryStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// One reaper tick. Returns the number of holds released.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize> {
        let released = self.store.release_expired_holds(Utc::now()).await?;
        if released > 0 {
            metrics::counter!("inventory_holds_expired").increment(released as u64);
            tracing::info!(released, "released expired reservation holds");
        }
        Ok(released)
    }

    /// Runs until the shutdown signal fires. Tick failures are logged and
    /// the next tick retries; expiry is naturally idempotent.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "hold reaper tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("hold reaper stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{BookingId, Money, RoomId};

    use super::*;
    use crate::memory::InMemoryInventoryStore;
    use crate::model::{HoldSpec, ReserveRequest};

    fn date(s: &str) -> chrono::NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn tick_releases_only_expired_holds() {
        let store = Arc::new(InMemoryInventoryStore::new());
        for d in ["2026-03-01", "2026-03-02"] {
            store
                .upsert_availability(RoomId::new(7), date(d), 3, Money::from_major(80))
                .await
                .unwrap();
        }

        // An already-expired hold and a live one, for different bookings.
        store
            .reserve(
                &ReserveRequest {
                    room_id: RoomId::new(7),
                    check_in: date("2026-03-01"),
                    check_out: date("2026-03-02"),
                    quantity: 1,
                    idempotency_key: Some("booking-77".to_string()),
                },
                Some(HoldSpec {
                    booking_id: BookingId::new(77),
                    expires_at: Utc::now() - std::time::Duration::from_secs(60),
                }),
            )
            .await
            .unwrap();
        store
            .reserve(
                &ReserveRequest {
                    room_id: RoomId::new(7),
                    check_in: date("2026-03-02"),
                    check_out: date("2026-03-03"),
                    quantity: 1,
                    idempotency_key: Some("booking-78".to_string()),
                },
                Some(HoldSpec {
                    booking_id: BookingId::new(78),
                    expires_at: Utc::now() + std::time::Duration::from_secs(600),
                }),
            )
            .await
            .unwrap();

        let reaper = HoldReaper::new(store.clone(), Duration::from_secs(60));
        assert_eq!(reaper.run_once().await.unwrap(), 1);

        let restored = store
            .availability(RoomId::new(7), date("2026-03-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.available_count, 3);

        let still_held = store
            .availability(RoomId::new(7), date("2026-03-02"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still_held.available_count, 2);

        // A second tick finds nothing; no double credit.
        assert_eq!(reaper.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let reaper = HoldReaper::new(store, Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(reaper.run(rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reaper did not stop")
            .unwrap();
    }
}
