//! Entry storage.
//!
//! An LRU-bounded map of key to JSON snapshot with an absolute expiry.
//! Expiry uses tokio's clock so tests can drive it with paused time.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use lru::LruCache;
use serde_json::Value;
use tokio::time::Instant;

use super::keys::{CacheKey, CacheTag};

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) value: Value,
    pub(crate) expires_at: Instant,
    pub(crate) tags: HashSet<CacheTag>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of a lookup.
pub(crate) enum Lookup {
    Hit(Entry),
    Expired,
    Missing,
}

pub(crate) struct EntryStore {
    entries: LruCache<CacheKey, Entry>,
}

impl EntryStore {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Fetch an unexpired entry; an expired one is dropped on the way.
    pub(crate) fn get(&mut self, key: &CacheKey, now: Instant) -> Lookup {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Lookup::Hit(entry.clone()),
            Some(_) => {
                self.entries.pop(key);
                Lookup::Expired
            }
            None => Lookup::Missing,
        }
    }

    /// Insert or replace an entry. Returns the key pushed out by the
    /// capacity limit, if any.
    pub(crate) fn put(&mut self, key: CacheKey, entry: Entry) -> Option<CacheKey> {
        match self.entries.push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    pub(crate) fn remove(&mut self, key: &CacheKey) -> bool {
        self.entries.pop(key).is_some()
    }

    pub(crate) fn keys_with_prefix(&self, prefix: &str) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|(key, _)| key.has_prefix(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn expired_keys(&self, now: Instant) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn entry(value: i64, ttl: Duration) -> Entry {
        Entry {
            value: Value::from(value),
            expires_at: Instant::now() + ttl,
            tags: HashSet::new(),
        }
    }

    #[test]
    fn put_reports_capacity_eviction() {
        let mut store = EntryStore::new(NonZeroUsize::MIN);
        let first = CacheKey::new("a");
        let second = CacheKey::new("b");

        assert_eq!(store.put(first.clone(), entry(1, Duration::from_secs(5))), None);
        assert_eq!(store.put(first.clone(), entry(2, Duration::from_secs(5))), None);
        assert_eq!(
            store.put(second, entry(3, Duration::from_secs(5))),
            Some(first)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let mut store = EntryStore::new(NonZeroUsize::MIN);
        let key = CacheKey::new("a");
        store.put(key.clone(), entry(1, Duration::from_secs(1)));

        let later = Instant::now() + Duration::from_secs(2);
        assert!(matches!(store.get(&key, later), Lookup::Expired));
        assert!(matches!(store.get(&key, later), Lookup::Missing));
    }

    #[test]
    fn keys_with_prefix_filters() {
        let mut store = EntryStore::new(NonZeroUsize::new(4).expect("non-zero"));
        store.put(CacheKey::new("home_categories_zh"), entry(1, Duration::from_secs(5)));
        store.put(CacheKey::new("other"), entry(2, Duration::from_secs(5)));

        assert_eq!(
            store.keys_with_prefix("home_"),
            vec![CacheKey::new("home_categories_zh")]
        );
    }
}
