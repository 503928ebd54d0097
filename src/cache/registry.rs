//! Bidirectional cache registry.
//!
//! Tracks which cache keys were built from which content tags so that a
//! content change can drop exactly the affected entries.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::keys::{CacheKey, CacheTag};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// Tracks tag → cache_keys and cache_key → tags mappings.
pub struct CacheRegistry {
    tag_to_keys: RwLock<HashMap<CacheTag, HashSet<CacheKey>>>,
    key_to_tags: RwLock<HashMap<CacheKey, HashSet<CacheTag>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            tag_to_keys: RwLock::new(HashMap::new()),
            key_to_tags: RwLock::new(HashMap::new()),
        }
    }

    /// Register a cache entry with the tags it depends on, replacing any
    /// earlier registration of the same key.
    pub fn register(&self, cache_key: CacheKey, tags: HashSet<CacheTag>) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "register.t2k");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "register.k2t");

        if let Some(previous) = k2t.remove(&cache_key) {
            detach(&mut t2k, &cache_key, previous);
        }
        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(cache_key.clone());
        }
        k2t.insert(cache_key, tags);
    }

    /// Every key registered under any of `tags`.
    pub fn keys_for_tags<'a, I>(&self, tags: I) -> HashSet<CacheKey>
    where
        I: IntoIterator<Item = &'a CacheTag>,
    {
        let t2k = rw_read(&self.tag_to_keys, SOURCE, "keys_for_tags");
        tags.into_iter()
            .filter_map(|tag| t2k.get(tag))
            .flat_map(|keys| keys.iter().cloned())
            .collect()
    }

    pub fn tags_for_key(&self, cache_key: &CacheKey) -> HashSet<CacheTag> {
        rw_read(&self.key_to_tags, SOURCE, "tags_for_key")
            .get(cache_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a cache key and clean up tag mappings.
    pub fn unregister(&self, cache_key: &CacheKey) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "unregister.t2k");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "unregister.k2t");

        if let Some(tags) = k2t.remove(cache_key) {
            detach(&mut t2k, cache_key, tags);
        }
    }

    pub fn clear(&self) {
        rw_write(&self.tag_to_keys, SOURCE, "clear.t2k").clear();
        rw_write(&self.key_to_tags, SOURCE, "clear.k2t").clear();
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.tag_to_keys, SOURCE, "tag_count").len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_tags, SOURCE, "key_count").len()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn detach(
    t2k: &mut HashMap<CacheTag, HashSet<CacheKey>>,
    cache_key: &CacheKey,
    tags: HashSet<CacheTag>,
) {
    for tag in tags {
        if let Some(keys) = t2k.get_mut(&tag) {
            keys.remove(cache_key);
            if keys.is_empty() {
                t2k.remove(&tag);
            }
        }
    }
}
