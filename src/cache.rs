use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::config::{CacheConfig, ConfigLoader, Expiration};
use crate::error::ConfigError;
use crate::fetch::Fetch;
use crate::resource::Resource;

/// Normalize a lookup name into a cache key.
pub fn normalize_key(name: &str) -> String {
    name.to_lowercase()
}

struct CacheEntry<T, E> {
    resource: Resource<T, E>,
    expires_at: Option<Instant>,
}

impl<T, E> CacheEntry<T, E> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Counters describing how the cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

struct CacheState<T, E> {
    entries: HashMap<String, CacheEntry<T, E>>,
    stats: CacheStats,
}

/// Cache of in-flight or settled resources, one per normalized name.
///
/// Looking a name up either returns the resource already cached for it or
/// starts a fetch and caches the new resource, so concurrent lookups of the
/// same name share one fetch. Expired entries are evicted by a background
/// sweep, which stops once the cache is dropped.
pub struct ResourceCache<T, E> {
    inner: Mutex<CacheState<T, E>>,
    fetcher: Arc<dyn Fetch<T, E>>,
    config: CacheConfig,
    expiration: Expiration,
    sweeper: OnceLock<JoinHandle<()>>,
}

impl<T, E> ResourceCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Construct a new [`ResourceCache`] instance.
    ///
    /// Expiring caches spawn their sweeper on the current tokio runtime, so
    /// this must be called from within one.
    pub fn new<F>(fetcher: F, config: CacheConfig) -> Result<Arc<Self>, ConfigError>
    where
        F: Fetch<T, E> + 'static,
    {
        ConfigLoader::validate(&config)?;
        let expiration = config.expiration_policy();

        let cache = Arc::new(ResourceCache {
            inner: Mutex::new(CacheState {
                entries: HashMap::new(),
                stats: CacheStats::default(),
            }),
            fetcher: Arc::new(fetcher),
            config,
            expiration,
            sweeper: OnceLock::new(),
        });

        if expiration.ttl().is_some() {
            let handle = spawn_sweeper(Arc::downgrade(&cache), cache.config.sweep_interval());
            let _ = cache.sweeper.set(handle);
        }

        debug!(?expiration, "resource cache created");
        Ok(cache)
    }

    /// Fetch the resource for `name`, starting a fetch if none is cached.
    ///
    /// ```rust
    /// # use suspense_resource_cache::{fetch_fn, CacheConfig, ResourceCache, Resource};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let fetcher = fetch_fn(|name: String| async move { Ok::<_, String>(name) });
    /// let cache = ResourceCache::new(fetcher, CacheConfig::default()).unwrap();
    ///
    /// let first = cache.get("Pikachu").await;
    /// let second = cache.get("pikachu").await;
    /// // Both lookups share the same in-flight fetch.
    /// assert!(Resource::ptr_eq(&first, &second));
    /// // The fetcher saw the name as it was first spelled.
    /// assert_eq!(second.wait().await.unwrap(), "Pikachu");
    /// # }
    /// ```
    pub async fn get(&self, name: &str) -> Resource<T, E> {
        let key = normalize_key(name);
        let mut lock = self.inner.lock().await;
        let now = Instant::now();
        let state = &mut *lock;

        // Entries stay until the sweep removes them, even once past their expiry.
        if let Some(entry) = state.entries.get_mut(&key) {
            if self.expiration.refreshes_on_access() {
                entry.expires_at = self.expiration.ttl().map(|ttl| now + ttl);
            }
            state.stats.hits += 1;
            trace!(key = %key, resource = entry.resource.id(), "resource cache hit");
            return entry.resource.clone();
        }

        let fetcher = Arc::clone(&self.fetcher);
        let requested = name.to_owned();
        let resource = Resource::new(async move { fetcher.fetch(&requested).await });

        debug!(key = %key, resource = resource.id(), "resource cache miss, fetching");
        state.entries.insert(
            key,
            CacheEntry {
                resource: resource.clone(),
                expires_at: self.expiration.ttl().map(|ttl| now + ttl),
            },
        );
        state.stats.misses += 1;
        resource
    }

    /// Like [`ResourceCache::get`], but never fetches and never refreshes expiry.
    pub async fn peek(&self, name: &str) -> Option<Resource<T, E>> {
        let lock = self.inner.lock().await;
        lock.entries
            .get(&normalize_key(name))
            .map(|entry| entry.resource.clone())
    }
}

impl<T, E> ResourceCache<T, E> {
    /// Remove the entry for `name`. The next lookup fetches again.
    pub async fn invalidate(&self, name: &str) -> bool {
        let key = normalize_key(name);
        let mut lock = self.inner.lock().await;
        let removed = lock.entries.remove(&key).is_some();
        if removed {
            lock.stats.invalidations += 1;
            debug!(key = %key, "resource invalidated");
        }
        removed
    }

    pub async fn clear(&self) {
        let mut lock = self.inner.lock().await;
        let cleared = lock.entries.len();
        lock.entries.clear();
        lock.stats.invalidations += cleared as u64;
        debug!(cleared, "resource cache cleared");
    }

    /// Evict every entry whose expiry has passed, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut lock = self.inner.lock().await;
        let now = Instant::now();
        let before = lock.entries.len();
        lock.entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - lock.entries.len();
        lock.stats.evictions += evicted as u64;
        if evicted > 0 {
            debug!(evicted, remaining = lock.entries.len(), "swept expired resources");
        }
        evicted
    }

    /// Number of entries held, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn expiration(&self) -> Expiration {
        self.expiration
    }
}

impl<T, E> Drop for ResourceCache<T, E> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get() {
            sweeper.abort();
        }
    }
}

fn spawn_sweeper<T, E>(cache: Weak<ResourceCache<T, E>>, every: Duration) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(cache) = cache.upgrade() else {
                break;
            };
            cache.purge_expired().await;
        }
        trace!("resource cache sweeper stopped");
    })
}
