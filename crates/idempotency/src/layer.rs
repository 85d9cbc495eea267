use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::FastCache;
use crate::store::{IdempotencyError, IdempotencyStore};

/// The read/write-path policy shared by inventory and payment.
///
/// Read path: fast cache first when enabled (miss or transport error falls
/// through), then the durable store. A durable-store error fails the request;
/// it is never read as "not yet processed". Cache warming is best-effort and
/// runs outside the memo transaction.
#[derive(Clone)]
pub struct IdempotencyLayer {
    cache: Option<Arc<dyn FastCache>>,
    prefix: &'static str,
    cache_ttl: Duration,
}

impl IdempotencyLayer {
    pub fn new(cache: Option<Arc<dyn FastCache>>, prefix: &'static str, cache_ttl: Duration) -> Self {
        Self {
            cache,
            prefix,
            cache_ttl,
        }
    }

    /// A layer with the fast cache disabled; reads go straight to the store.
    pub fn disabled(prefix: &'static str) -> Self {
        Self::new(None, prefix, Duration::ZERO)
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Looks up the memoized response for a key.
    pub async fn lookup<T, S>(&self, store: &S, key: &str) -> Result<Option<T>, IdempotencyError>
    where
        T: DeserializeOwned,
        S: IdempotencyStore + ?Sized,
    {
        if let Some(cache) = &self.cache {
            match cache.get(&self.cache_key(key)).await {
                Ok(Some(json)) => match serde_json::from_str(&json) {
                    Ok(value) => {
                        tracing::debug!(key, "idempotency hit from fast cache");
                        return Ok(Some(value));
                    }
                    Err(e) => {
                        tracing::debug!(key, error = %e, "undecodable cache entry, falling back to store");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(key, error = %e, "fast cache read failed, falling back to store");
                }
            }
        }

        match store.get(key).await? {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    // A memo that exists but cannot be decoded must not be
                    // read as "not processed".
                    IdempotencyError::Unavailable(format!("stored response undecodable: {e}"))
                })?;
                tracing::debug!(key, "idempotency hit from durable store");
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Best-effort cache warm after the memo transaction committed.
    pub async fn warm<T: Serialize>(&self, key: &str, response: &T) {
        let Some(cache) = &self.cache else {
            return;
        };
        let json = match serde_json::to_string(response) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize response for cache warm");
                return;
            }
        };
        if let Err(e) = cache.put(&self.cache_key(key), &json, self.cache_ttl).await {
            tracing::warn!(key, error = %e, "failed to warm fast cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::cache::InMemoryFastCache;

    #[derive(Default)]
    struct MapStore {
        entries: Mutex<HashMap<String, String>>,
        unavailable: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl IdempotencyStore for MapStore {
        async fn get(&self, key: &str) -> Result<Option<String>, IdempotencyError> {
            if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(IdempotencyError::Unavailable("store offline".to_string()));
            }
            Ok(self.entries.lock().await.get(key).cloned())
        }
    }

    fn layer_with(cache: InMemoryFastCache) -> IdempotencyLayer {
        IdempotencyLayer::new(
            Some(Arc::new(cache)),
            "idempotency:test:",
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn durable_store_hit() {
        let store = MapStore::default();
        store
            .entries
            .lock()
            .await
            .insert("k".to_string(), "\"stored\"".to_string());

        let layer = IdempotencyLayer::disabled("idempotency:test:");
        let hit: Option<String> = layer.lookup(&store, "k").await.unwrap();
        assert_eq!(hit, Some("stored".to_string()));
    }

    #[tokio::test]
    async fn cache_hit_skips_store() {
        let cache = InMemoryFastCache::new();
        cache
            .put("idempotency:test:k", "\"cached\"", Duration::from_secs(60))
            .await
            .unwrap();

        // A store that would error if consulted.
        let store = MapStore::default();
        store
            .unavailable
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let layer = layer_with(cache);
        let hit: Option<String> = layer.lookup(&store, "k").await.unwrap();
        assert_eq!(hit, Some("cached".to_string()));
    }

    #[tokio::test]
    async fn cache_error_falls_through_to_store() {
        let cache = InMemoryFastCache::new();
        cache.set_unavailable(true);

        let store = MapStore::default();
        store
            .entries
            .lock()
            .await
            .insert("k".to_string(), "\"stored\"".to_string());

        let layer = layer_with(cache);
        let hit: Option<String> = layer.lookup(&store, "k").await.unwrap();
        assert_eq!(hit, Some("stored".to_string()));
    }

    #[tokio::test]
    async fn store_error_propagates() {
        let store = MapStore::default();
        store
            .unavailable
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let layer = IdempotencyLayer::disabled("idempotency:test:");
        let result: Result<Option<String>, _> = layer.lookup(&store, "k").await;
        assert!(matches!(result, Err(IdempotencyError::Unavailable(_))));
    }

    #[tokio::test]
    async fn miss_everywhere_is_none() {
        let store = MapStore::default();
        let layer = layer_with(InMemoryFastCache::new());
        let hit: Option<String> = layer.lookup(&store, "k").await.unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn warm_failure_is_ignored() {
        let cache = InMemoryFastCache::new();
        cache.set_unavailable(true);
        let layer = layer_with(cache);
        // Must not panic or error.
        layer.warm("k", &"response").await;
    }

    #[tokio::test]
    async fn warm_populates_cache_for_next_lookup() {
        let cache = InMemoryFastCache::new();
        let layer = layer_with(cache.clone());
        layer.warm("k", &"response").await;

        let store = MapStore::default();
        let hit: Option<String> = layer.lookup(&store, "k").await.unwrap();
        assert_eq!(hit, Some("response".to_string()));
    }
}
