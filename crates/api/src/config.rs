//! Application configuration loaded from environment variables.

use std::time::Duration;

use booking::RecoveryConfig;
use inventory::InventoryConfig;

/// Server and pipeline configuration with the documented defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT` — bind address (defaults: `"0.0.0.0"` / `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string (default: in-memory stores)
/// - `DB_MAX_CONNECTIONS` — max database pool connections (default: `10`)
/// - `REDIS_URL` — Redis connection string for the fast cache and the
///   distributed lock (default: in-process implementations)
/// - `HOLD_TTL_MINUTES` — lifetime of an unconfirmed hold (default: `15`)
/// - `HOLD_REAPER_INTERVAL_MS` — reaper cadence (default: `60000`)
/// - `RECOVERY_ENABLED` — whether the recovery worker runs (default: `true`)
/// - `RECOVERY_INTERVAL_MS` — recovery cadence (default: `300000`)
/// - `RECOVERY_STUCK_MINUTES` — age before a mid-pipeline booking counts as
///   stuck (default: `10`)
/// - `RECOVERY_GIVE_UP_MINUTES` — age at which the give-up policy runs
///   (default: `1440`)
/// - `IDEMPOTENCY_FAST_CACHE_ENABLED` — consult the fast cache (default: `true`)
/// - `IDEMPOTENCY_FAST_CACHE_TTL_HOURS` — cache entry TTL (default: `24`)
/// - `RESERVATION_LOCK_WAIT_SECONDS` / `RESERVATION_LOCK_LEASE_SECONDS` —
///   lock acquisition wait and holding lease (defaults: `5` / `30`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub redis_url: Option<String>,
    pub hold_ttl_minutes: u64,
    pub hold_reaper_interval_ms: u64,
    pub recovery_enabled: bool,
    pub recovery_interval_ms: u64,
    pub recovery_stuck_minutes: u64,
    pub recovery_give_up_minutes: u64,
    pub idempotency_fast_cache_enabled: bool,
    pub idempotency_fast_cache_ttl_hours: u64,
    pub reservation_lock_wait_seconds: u64,
    pub reservation_lock_lease_seconds: u64,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            redis_url: std::env::var("REDIS_URL").ok(),
            hold_ttl_minutes: env_parse("HOLD_TTL_MINUTES", 15),
            hold_reaper_interval_ms: env_parse("HOLD_REAPER_INTERVAL_MS", 60_000),
            recovery_enabled: env_parse("RECOVERY_ENABLED", true),
            recovery_interval_ms: env_parse("RECOVERY_INTERVAL_MS", 300_000),
            recovery_stuck_minutes: env_parse("RECOVERY_STUCK_MINUTES", 10),
            recovery_give_up_minutes: env_parse("RECOVERY_GIVE_UP_MINUTES", 1_440),
            idempotency_fast_cache_enabled: env_parse("IDEMPOTENCY_FAST_CACHE_ENABLED", true),
            idempotency_fast_cache_ttl_hours: env_parse("IDEMPOTENCY_FAST_CACHE_TTL_HOURS", 24),
            reservation_lock_wait_seconds: env_parse("RESERVATION_LOCK_WAIT_SECONDS", 5),
            reservation_lock_lease_seconds: env_parse("RESERVATION_LOCK_LEASE_SECONDS", 30),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn inventory_config(&self) -> InventoryConfig {
        InventoryConfig {
            hold_ttl: Duration::from_secs(self.hold_ttl_minutes * 60),
            lock_wait: Duration::from_secs(self.reservation_lock_wait_seconds),
            lock_lease: Duration::from_secs(self.reservation_lock_lease_seconds),
        }
    }

    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            enabled: self.recovery_enabled,
            interval: Duration::from_millis(self.recovery_interval_ms),
            stuck_after: Duration::from_secs(self.recovery_stuck_minutes * 60),
            give_up_after: Duration::from_secs(self.recovery_give_up_minutes * 60),
        }
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.hold_reaper_interval_ms)
    }

    pub fn fast_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_fast_cache_ttl_hours * 60 * 60)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            db_max_connections: 10,
            redis_url: None,
            hold_ttl_minutes: 15,
            hold_reaper_interval_ms: 60_000,
            recovery_enabled: true,
            recovery_interval_ms: 300_000,
            recovery_stuck_minutes: 10,
            recovery_give_up_minutes: 1_440,
            idempotency_fast_cache_enabled: true,
            idempotency_fast_cache_ttl_hours: 24,
            reservation_lock_wait_seconds: 5,
            reservation_lock_lease_seconds: 30,
        }
    }
}
