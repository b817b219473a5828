use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A cached value together with the moment it was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub captured_at: NaiveDateTime,
}

impl<V> CacheEntry<V> {
    pub fn is_valid(&self, now: NaiveDateTime, ttl: Duration) -> bool {
        now - self.captured_at < ttl
    }
}

/// In-memory cache that never evicts: freshness is decided by the reader, and
/// stale entries stay around as a fallback.
#[derive(Clone)]
pub struct TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the value only if it was captured less than `ttl` before `now`.
    pub async fn get_fresh(&self, key: &K, now: NaiveDateTime, ttl: Duration) -> Option<V> {
        let cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.is_valid(now, ttl) => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache STALE for key: {:?}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    /// Returns whatever is stored, regardless of age.
    pub async fn get_entry(&self, key: &K) -> Option<CacheEntry<V>> {
        self.inner.lock().await.get(key).cloned()
    }

    pub async fn put(&self, key: K, value: V, captured_at: NaiveDateTime) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, CacheEntry { value, captured_at });
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
        debug!("Cache CLEAR");
    }
}

impl<K, V> Default for TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
