use std::time::Duration;

/// Inventory tuning knobs, read from configuration at startup.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Lifetime of an unconfirmed reservation hold.
    pub hold_ttl: Duration,
    /// How long a reserve waits for the distributed lock.
    pub lock_wait: Duration,
    /// Lease granted to a held lock; bounds a crashed holder.
    pub lock_lease: Duration,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::from_secs(15 * 60),
            lock_wait: Duration::from_secs(5),
            lock_lease: Duration::from_secs(30),
        }
    }
}
