//! Cache trigger service.
//!
//! Translates content mutations into tag invalidations. Write paths call it
//! after every successful change:
//!
//! ```ignore
//! trigger.pattern_changed(pattern.id, &[pattern.category_id], &[&pattern.slug]);
//! ```

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::ContentCache;
use super::keys::CacheTag;

#[derive(Clone)]
pub struct CacheTrigger {
    cache: Arc<ContentCache>,
}

impl CacheTrigger {
    pub fn new(cache: Arc<ContentCache>) -> Self {
        Self { cache }
    }

    /// A category was created, updated or deleted. `slugs` carries both the
    /// old and the new slug when it changed.
    pub fn category_changed(&self, category_id: Uuid, slugs: &[&str]) -> usize {
        let mut tags = vec![
            CacheTag::Category(category_id),
            CacheTag::CategoryList,
            CacheTag::PatternList,
        ];
        tags.extend(
            slugs
                .iter()
                .map(|slug| CacheTag::CategorySlug((*slug).to_string())),
        );
        self.fire("category_changed", &tags)
    }

    /// A pattern was created, updated, moved or deleted.
    pub fn pattern_changed(&self, pattern_id: Uuid, category_ids: &[Uuid], slugs: &[&str]) -> usize {
        let mut tags = vec![
            CacheTag::Pattern(pattern_id),
            CacheTag::PatternList,
            CacheTag::CategoryList,
        ];
        tags.extend(category_ids.iter().copied().map(CacheTag::Category));
        tags.extend(
            slugs
                .iter()
                .map(|slug| CacheTag::PatternSlug((*slug).to_string())),
        );
        self.fire("pattern_changed", &tags)
    }

    /// A pattern's Markdown body changed on disk.
    pub fn content_changed(&self, pattern_id: Uuid) -> usize {
        self.fire("content_changed", &[CacheTag::Pattern(pattern_id)])
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    fn fire(&self, event: &'static str, tags: &[CacheTag]) -> usize {
        if !self.cache.config().is_enabled() {
            debug!(event, "Cache trigger skipped: cache disabled");
            return 0;
        }
        self.cache.invalidate(tags)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use super::*;
    use crate::cache::{CacheConfig, CacheKey};

    async fn seed(cache: &ContentCache, key: &str, tag: CacheTag) {
        let _: Result<u32, Infallible> = cache
            .remember_for(CacheKey::new(key), Duration::from_secs(60), [tag], || async {
                Ok(1)
            })
            .await;
    }

    #[tokio::test]
    async fn pattern_changed_hits_slug_list_and_category() {
        let cache = Arc::new(ContentCache::default());
        let trigger = CacheTrigger::new(Arc::clone(&cache));
        let pattern_id = Uuid::new_v4();
        let category_id = Uuid::new_v4();

        seed(&cache, "by-slug", CacheTag::PatternSlug("observer".into())).await;
        seed(&cache, "listing", CacheTag::PatternList).await;
        seed(&cache, "category", CacheTag::Category(category_id)).await;
        seed(&cache, "unrelated", CacheTag::Pattern(Uuid::new_v4())).await;

        let removed = trigger.pattern_changed(pattern_id, &[category_id], &["observer"]);
        assert_eq!(removed, 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn content_changed_is_narrow() {
        let cache = Arc::new(ContentCache::default());
        let trigger = CacheTrigger::new(Arc::clone(&cache));
        let pattern_id = Uuid::new_v4();

        seed(&cache, "body", CacheTag::Pattern(pattern_id)).await;
        seed(&cache, "listing", CacheTag::PatternList).await;

        assert_eq!(trigger.content_changed(pattern_id), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn disabled_cache_skips_invalidation() {
        let cache = Arc::new(ContentCache::new(CacheConfig {
            enabled: false,
            ..Default::default()
        }));
        let trigger = CacheTrigger::new(cache);

        assert_eq!(trigger.category_changed(Uuid::new_v4(), &["creational"]), 0);
    }
}
