use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors from the distributed lock provider.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock wait timed out for {key}")]
    AcquireTimeout { key: String },

    #[error("lock backend error: {0}")]
    Backend(String),
}

/// A held lock. The token ties the release to this acquisition so a holder
/// whose lease already expired cannot free someone else's lock.
#[derive(Debug, Clone)]
pub struct LockLease {
    pub key: String,
    pub token: String,
}

/// Lease-based mutual exclusion across service instances.
///
/// The lock is an optimization in front of the guarded decrement, not a
/// correctness requirement: the lease bounds how long a crashed holder can
/// block others, and the decrement stays safe either way.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Tries to acquire `key`, waiting at most `wait`. The lock auto-expires
    /// after `lease` if never released.
    async fn acquire(&self, key: &str, wait: Duration, lease: Duration)
    -> Result<LockLease, LockError>;

    /// Releases a lease. Releasing an expired or foreign lease is a no-op.
    async fn release(&self, lease: &LockLease) -> Result<(), LockError>;
}

const RETRY_PAUSE: Duration = Duration::from_millis(25);

/// In-process lock provider for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryLockProvider {
    locks: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl InMemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockProvider for InMemoryLockProvider {
    async fn acquire(
        &self,
        key: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<LockLease, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut locks = self.locks.lock().await;
                let free = match locks.get(key) {
                    Some((_, expires_at)) => *expires_at <= Instant::now(),
                    None => true,
                };
                if free {
                    let token = Uuid::new_v4().to_string();
                    locks.insert(key.to_string(), (token.clone(), Instant::now() + lease));
                    return Ok(LockLease {
                        key: key.to_string(),
                        token,
                    });
                }
            }
            if Instant::now() >= deadline {
                return Err(LockError::AcquireTimeout {
                    key: key.to_string(),
                });
            }
            tokio::time::sleep(RETRY_PAUSE).await;
        }
    }

    async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
        let mut locks = self.locks.lock().await;
        if let Some((token, _)) = locks.get(&lease.key) {
            if *token == lease.token {
                locks.remove(&lease.key);
            }
        }
        Ok(())
    }
}

/// Redis-backed lock provider: `SET key token NX PX lease`.
#[derive(Clone)]
pub struct RedisLockProvider {
    conn: MultiplexedConnection,
}

impl RedisLockProvider {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LockProvider for RedisLockProvider {
    async fn acquire(
        &self,
        key: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<LockLease, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + wait;
        loop {
            let mut conn = self.conn.clone();
            let acquired: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(lease.as_millis() as u64)
                .query_async(&mut conn)
                .await
                .map_err(|e| LockError::Backend(e.to_string()))?;
            if acquired.is_some() {
                return Ok(LockLease {
                    key: key.to_string(),
                    token,
                });
            }
            if Instant::now() >= deadline {
                return Err(LockError::AcquireTimeout {
                    key: key.to_string(),
                });
            }
            tokio::time::sleep(RETRY_PAUSE).await;
        }
    }

    async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
        // Check-then-delete is not atomic; a stale delete is bounded by the
        // lease and tolerable for a lock that only shapes contention.
        let mut conn = self.conn.clone();
        let holder: Option<String> = redis::cmd("GET")
            .arg(&lease.key)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        if holder.as_deref() == Some(lease.token.as_str()) {
            redis::cmd("DEL")
                .arg(&lease.key)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| LockError::Backend(e.to_string()))?;
        }
        Ok(())
    }
}
