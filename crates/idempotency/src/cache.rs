use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tokio::sync::RwLock;

/// Error produced by the fast cache. Callers treat any cache error as a
/// miss and fall through to the durable store.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache transport error: {0}")]
    Transport(String),
}

/// Optional read-acceleration layer in front of the durable idempotency
/// store. Never a source of truth.
#[async_trait]
pub trait FastCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Default)]
struct InMemoryEntries {
    entries: HashMap<String, (String, Instant)>,
}

/// In-memory fast cache for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryFastCache {
    state: Arc<RwLock<InMemoryEntries>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryFastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every cache call fail, to exercise the fall-through path.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FastCache for InMemoryFastCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Transport("cache offline".to_string()));
        }
        let state = self.state.read().await;
        match state.entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Transport("cache offline".to_string()));
        }
        let mut state = self.state.write().await;
        state
            .entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}

/// Redis-backed fast cache for multi-instance deployments.
#[derive(Clone)]
pub struct RedisFastCache {
    conn: MultiplexedConnection,
}

impl RedisFastCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl FastCache for RedisFastCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e: redis::RedisError| CacheError::Transport(e.to_string()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.pset_ex(key, value, ttl.as_millis() as u64)
            .await
            .map_err(|e: redis::RedisError| CacheError::Transport(e.to_string()))
    }
}

impl std::fmt::Debug for RedisFastCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisFastCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_what_was_put() {
        let cache = InMemoryFastCache::new();
        cache
            .put("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let cache = InMemoryFastCache::new();
        cache.put("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unavailable_cache_errors() {
        let cache = InMemoryFastCache::new();
        cache.set_unavailable(true);
        assert!(cache.get("k").await.is_err());
        assert!(cache.put("k", "v", Duration::from_secs(1)).await.is_err());
    }
}
