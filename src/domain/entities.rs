use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::locale::{Locale, LocalizedText};

/// A grouping of patterns, e.g. "Creational Patterns".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Relative content file path per locale.
pub type ContentPaths = BTreeMap<Locale, String>;

/// A single design-pattern article. The Markdown body lives in files
/// referenced by `content_paths`, never in the row itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub id: Uuid,
    pub category_id: Uuid,
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub content_paths: ContentPaths,
    pub published: bool,
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PatternRecord {
    pub fn content_path(&self, locale: Locale) -> Option<&str> {
        self.content_paths
            .get(&locale)
            .map(String::as_str)
            .filter(|path| !path.trim().is_empty())
    }
}
