//! Cache key and tag definitions.
//!
//! `CacheKey` names one cached snapshot; `CacheTag` names a piece of content
//! the snapshot was built from. Mutating content invalidates its tags, which
//! drops every key registered under them.

use std::fmt;

use uuid::Uuid;

use crate::domain::locale::Locale;

const HOME_CATEGORIES: &str = "home_categories_";
const PATTERN_INDEX_CATEGORIES: &str = "pattern_index_categories_";
const PATTERN_DETAIL: &str = "pattern_detail_";
const PATTERN_BODY: &str = "pattern_body_";
const PATTERN_HEADINGS: &str = "pattern_headings_";
const RELATED_PATTERNS: &str = "related_patterns_";

/// Prefixes of every key the public catalogue produces.
pub const CATALOG_KEY_PREFIXES: &[&str] = &[
    HOME_CATEGORIES,
    PATTERN_INDEX_CATEGORIES,
    PATTERN_DETAIL,
    PATTERN_BODY,
    PATTERN_HEADINGS,
    RELATED_PATTERNS,
];

/// Deterministic string key of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn home_categories(locale: Locale) -> Self {
        Self(format!("{HOME_CATEGORIES}{locale}"))
    }

    pub fn pattern_index_categories(locale: Locale) -> Self {
        Self(format!("{PATTERN_INDEX_CATEGORIES}{locale}"))
    }

    pub fn pattern_detail(slug: &str, locale: Locale) -> Self {
        Self(format!("{PATTERN_DETAIL}{slug}_{locale}"))
    }

    pub fn pattern_body(pattern_id: Uuid, locale: Locale) -> Self {
        Self(format!("{PATTERN_BODY}{pattern_id}_{locale}"))
    }

    pub fn pattern_headings(pattern_id: Uuid, locale: Locale) -> Self {
        Self(format!("{PATTERN_HEADINGS}{pattern_id}_{locale}"))
    }

    pub fn related_patterns(pattern_id: Uuid, locale: Locale) -> Self {
        Self(format!("{RELATED_PATTERNS}{pattern_id}_{locale}"))
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies content a cache entry depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheTag {
    /// A category identified by its database ID
    Category(Uuid),
    /// A category identified by its URL slug
    CategorySlug(String),
    /// A pattern identified by its database ID
    Pattern(Uuid),
    /// A pattern identified by its URL slug
    PatternSlug(String),
    /// Any listing of categories
    CategoryList,
    /// Any listing of patterns
    PatternList,
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTag::Category(id) => write!(f, "category:{id}"),
            CacheTag::CategorySlug(slug) => write!(f, "category-slug:{slug}"),
            CacheTag::Pattern(id) => write!(f, "pattern:{id}"),
            CacheTag::PatternSlug(slug) => write!(f, "pattern-slug:{slug}"),
            CacheTag::CategoryList => f.write_str("category-list"),
            CacheTag::PatternList => f.write_str("pattern-list"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_embed_locale_and_id() {
        let id = Uuid::nil();
        assert_eq!(
            CacheKey::home_categories(Locale::Zh).as_str(),
            "home_categories_zh"
        );
        assert_eq!(
            CacheKey::pattern_index_categories(Locale::En).as_str(),
            "pattern_index_categories_en"
        );
        assert_eq!(
            CacheKey::pattern_headings(id, Locale::Zh).as_str(),
            "pattern_headings_00000000-0000-0000-0000-000000000000_zh"
        );
    }

    #[test]
    fn every_catalog_key_matches_a_prefix() {
        let id = Uuid::new_v4();
        let keys = [
            CacheKey::home_categories(Locale::En),
            CacheKey::pattern_index_categories(Locale::En),
            CacheKey::pattern_detail("observer", Locale::En),
            CacheKey::pattern_body(id, Locale::En),
            CacheKey::pattern_headings(id, Locale::En),
            CacheKey::related_patterns(id, Locale::En),
        ];

        for key in keys {
            assert!(
                CATALOG_KEY_PREFIXES
                    .iter()
                    .any(|prefix| key.has_prefix(prefix)),
                "{key} has no catalogue prefix"
            );
        }
    }
}
