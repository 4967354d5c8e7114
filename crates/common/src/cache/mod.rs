//! Per-run in-memory cache
//!
//! One `RunCache` lives exactly as long as one mapping run and is passed
//! by reference to whoever needs it, so nothing leaks between runs.
//!
//! Concurrency contract: lookups and inserts are safe from many tasks.
//! Two tasks missing on the same key at the same time may both load; the
//! later insert wins. Callers must therefore only cache values that are a
//! pure function of the key.

use crate::metrics::record_cache;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key-value cache scoped to a single run
#[derive(Debug)]
pub struct RunCache<V> {
    name: &'static str,
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> RunCache<V> {
    /// Create an empty cache; `name` labels cache metrics
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get a value from cache
    pub async fn get(&self, key: &str) -> Option<V> {
        let value = self.entries.read().await.get(key).cloned();
        record_cache(value.is_some(), self.name);
        debug!(cache = self.name, key, hit = value.is_some(), "Cache lookup");
        value
    }

    /// Set a value in cache
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.write().await.insert(key.into(), value);
    }

    /// Get or load; failed loads are returned but never cached
    pub async fn get_or_load<E, F, Fut>(&self, key: &str, loader: F) -> Result<V, E>
    where
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        match loader().await {
            Ok(value) => {
                self.insert(key, value.clone()).await;
                Ok(value)
            }
            Err(e) => {
                warn!(cache = self.name, key, error = %e, "Load failed, not caching");
                Err(e)
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_or_load_caches_success() {
        let cache: RunCache<u32> = RunCache::new("test");
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_load("k", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_load_not_cached() {
        let cache: RunCache<u32> = RunCache::new("test");
        let err = cache
            .get_or_load("k", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_not_lost() {
        let cache: Arc<RunCache<usize>> = Arc::new(RunCache::new("test"));
        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.insert(format!("key-{}", i), i).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len().await, 32);
        assert_eq!(cache.get("key-31").await, Some(31));
    }
}
