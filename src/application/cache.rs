// TTL cache for directory and telemetry lookups
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

/// Shared memo table keyed by string.
///
/// The lock is never held while computing, so two concurrent misses on the
/// same key may both compute. The later write wins and both callers get a
/// valid value. Failed computations are never stored.
#[derive(Default)]
pub struct CacheLayer {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_compute_if(key, ttl, compute, |_| true).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but a successful value
    /// is only stored when `retain` accepts it.
    pub async fn get_or_compute_if<T, E, F, Fut, R>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
        retain: R,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnOnce(&T) -> bool,
    {
        if let Some(value) = self.lookup::<T>(key) {
            tracing::debug!("Cache hit for {}", key);
            return Ok(value);
        }

        tracing::debug!("Cache miss for {}", key);
        let value = compute().await?;
        if retain(&value) {
            self.store(key, value.clone(), ttl);
        }
        Ok(value)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lookup<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => entry.value.downcast_ref::<T>().cloned(),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn store<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Duration) {
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            tracing::warn!("TTL {:?} for {} is out of range; not caching", ttl, key);
            return;
        };
        let mut entries = self.lock();
        entries.retain(|_, entry| now < entry.expires_at);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: Arc::new(value),
                expires_at,
            },
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
