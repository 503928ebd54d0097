//! Patternbook content cache.
//!
//! A tag-invalidated, TTL-bounded memo of listing and heading reads. Each
//! entry is a JSON snapshot registered under the content tags its producer
//! read, so admin mutations can evict exactly what they affect.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 1024
//! listing_ttl_seconds = 3600
//! # ... see config.rs for all options
//! ```

mod config;
pub mod deps;
mod flight;
mod keys;
mod lock;
mod registry;
mod store;
mod trigger;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::Instant;
use tracing::{debug, warn};

pub use self::config::CacheConfig;
pub use keys::{CATALOG_KEY_PREFIXES, CacheKey, CacheTag};
pub use registry::CacheRegistry;
pub use trigger::CacheTrigger;

use flight::SingleFlight;
use lock::mutex_lock;
use store::{Entry, EntryStore, Lookup};

const SOURCE: &str = "cache";

pub const METRIC_CACHE_HIT_TOTAL: &str = "patternbook_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "patternbook_cache_miss_total";
pub const METRIC_CACHE_EVICT_TOTAL: &str = "patternbook_cache_evict_total";
pub const METRIC_CACHE_INVALIDATED_TOTAL: &str = "patternbook_cache_invalidated_total";

pub struct ContentCache {
    config: CacheConfig,
    store: Mutex<EntryStore>,
    registry: CacheRegistry,
    flights: SingleFlight,
    /// Bumped by every invalidation; a producer that straddles a bump must
    /// not store its possibly stale value.
    generation: AtomicU64,
}

impl ContentCache {
    pub fn new(config: CacheConfig) -> Self {
        let store = EntryStore::new(config.max_entries_non_zero());
        Self {
            config,
            store: Mutex::new(store),
            registry: CacheRegistry::new(),
            flights: SingleFlight::default(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, or run `producer`, cache its result
    /// for `ttl` under `tags` plus every tag recorded while it ran, and return
    /// it. Producer errors are passed through and never cached.
    pub async fn remember_for<T, E, F, Fut, I>(
        &self,
        key: CacheKey,
        ttl: Duration,
        tags: I,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        I: IntoIterator<Item = CacheTag>,
    {
        if !self.config.is_enabled() {
            return producer().await;
        }

        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let _flight = self.flights.acquire(&key).await;
        if let Some(value) = self.lookup_after_wait(&key) {
            return Ok(value);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let (result, recorded) = deps::with_collector(producer()).await;
        let value = result?;

        let mut all_tags: HashSet<CacheTag> = tags.into_iter().collect();
        all_tags.extend(recorded);
        deps::record_all(all_tags.iter().cloned());

        match serde_json::to_value(&value) {
            Ok(snapshot) => self.store_entry(key.clone(), snapshot, ttl, all_tags, generation),
            Err(err) => warn!(
                target = "patternbook::cache",
                key = %key,
                error = %err,
                "Cache value could not be serialised; serving uncached"
            ),
        }

        Ok(value)
    }

    /// Drop one entry. Returns whether it existed.
    pub fn forget(&self, key: &CacheKey) -> bool {
        let mut store = mutex_lock(&self.store, SOURCE, "forget");
        self.bump_generation();
        let removed = store.remove(key);
        self.registry.unregister(key);
        if removed {
            counter!(METRIC_CACHE_INVALIDATED_TOTAL).increment(1);
        }
        removed
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn forget_prefix(&self, prefix: &str) -> usize {
        let mut store = mutex_lock(&self.store, SOURCE, "forget_prefix");
        self.bump_generation();
        let keys = store.keys_with_prefix(prefix);
        self.remove_locked(&mut store, keys)
    }

    /// Drop the listed entries.
    pub fn forget_keys<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = CacheKey>,
    {
        let mut store = mutex_lock(&self.store, SOURCE, "forget_keys");
        self.bump_generation();
        self.remove_locked(&mut store, keys)
    }

    /// Drop every key the public catalogue produces.
    pub fn forget_catalog(&self) -> usize {
        CATALOG_KEY_PREFIXES
            .iter()
            .map(|prefix| self.forget_prefix(prefix))
            .sum()
    }

    pub fn forget_tag(&self, tag: &CacheTag) -> usize {
        self.invalidate(std::slice::from_ref(tag))
    }

    /// Drop every entry registered under any of `tags`.
    pub fn invalidate(&self, tags: &[CacheTag]) -> usize {
        let mut store = mutex_lock(&self.store, SOURCE, "invalidate");
        self.bump_generation();
        let keys = self.registry.keys_for_tags(tags);
        let removed = self.remove_locked(&mut store, keys);
        debug!(
            target = "patternbook::cache",
            tags = ?tags,
            removed,
            "Cache tags invalidated"
        );
        removed
    }

    /// Drop everything.
    pub fn flush(&self) -> usize {
        let mut store = mutex_lock(&self.store, SOURCE, "flush");
        self.bump_generation();
        let removed = store.clear();
        self.registry.clear();
        counter!(METRIC_CACHE_INVALIDATED_TOTAL).increment(removed as u64);
        removed
    }

    /// Drop entries whose TTL has passed.
    pub fn purge_expired(&self) -> usize {
        let mut store = mutex_lock(&self.store, SOURCE, "purge_expired");
        let expired = store.expired_keys(Instant::now());
        let mut removed = 0;
        for key in expired {
            if store.remove(&key) {
                removed += 1;
            }
            self.registry.unregister(&key);
        }
        removed
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.store, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.read_entry(key);
        match value {
            Some(_) => counter!(METRIC_CACHE_HIT_TOTAL).increment(1),
            None => counter!(METRIC_CACHE_MISS_TOTAL).increment(1),
        }
        value
    }

    /// Re-check after waiting on the single-flight lock. Not counted again.
    fn lookup_after_wait<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.read_entry(key)
    }

    fn read_entry<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = {
            let mut store = mutex_lock(&self.store, SOURCE, "lookup");
            match store.get(key, Instant::now()) {
                Lookup::Hit(entry) => entry,
                Lookup::Expired => {
                    self.registry.unregister(key);
                    return None;
                }
                Lookup::Missing => return None,
            }
        };

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                deps::record_all(entry.tags);
                Some(value)
            }
            Err(err) => {
                warn!(
                    target = "patternbook::cache",
                    key = %key,
                    error = %err,
                    "Cached snapshot has an unexpected shape; recomputing"
                );
                None
            }
        }
    }

    fn store_entry(
        &self,
        key: CacheKey,
        value: serde_json::Value,
        ttl: Duration,
        tags: HashSet<CacheTag>,
        generation: u64,
    ) {
        let mut store = mutex_lock(&self.store, SOURCE, "store");
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(
                target = "patternbook::cache",
                key = %key,
                "Invalidation raced the producer; value not stored"
            );
            return;
        }

        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
            tags: tags.clone(),
        };
        if let Some(evicted) = store.put(key.clone(), entry) {
            self.registry.unregister(&evicted);
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
        }
        self.registry.register(key, tags);
    }

    fn remove_locked<I>(&self, store: &mut EntryStore, keys: I) -> usize
    where
        I: IntoIterator<Item = CacheKey>,
    {
        let mut removed = 0usize;
        for key in keys {
            if store.remove(&key) {
                removed += 1;
            }
            self.registry.unregister(&key);
        }
        counter!(METRIC_CACHE_INVALIDATED_TOTAL).increment(removed as u64);
        removed
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
