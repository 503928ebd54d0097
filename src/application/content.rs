//! Pattern bodies stored as Markdown files next to the relational rows.
//!
//! Rows keep only a `locale -> relative path` map; [`ContentStore`] reads and
//! writes the files and [`ContentService`] applies the locale fallback policy,
//! derives paths for new bodies and keeps the heading cache coherent.

use std::convert::Infallible;
use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::render::extract_headings;
use crate::application::repos::{PatternsWriteRepo, RepoError};
use crate::cache::{CacheKey, CacheTag, CacheTrigger, ContentCache, deps};
use crate::domain::entities::PatternRecord;
use crate::domain::locale::Locale;
use crate::domain::toc::Heading;

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("content path `{0}` is not a relative path inside the content root")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// File storage for Markdown bodies, addressed by paths relative to a root.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read a body. A missing file is `Ok(None)`.
    async fn read(&self, path: &str) -> Result<Option<String>, ContentStoreError>;

    /// Replace a body atomically; readers never observe a partial file.
    async fn write(&self, path: &str, body: &str) -> Result<(), ContentStoreError>;

    /// Remove a body. Missing files are treated as success.
    async fn remove(&self, path: &str) -> Result<(), ContentStoreError>;
}

/// Reject absolute paths, parent components and empty paths.
pub fn validate_relative_path(path: &str) -> Result<&Path, ContentStoreError> {
    let relative = Path::new(path);
    let escapes = relative.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.trim().is_empty() || relative.is_absolute() || escapes {
        return Err(ContentStoreError::InvalidPath(path.to_string()));
    }
    Ok(relative)
}

/// Deterministic location for a pattern body that has no stored path yet.
/// The pattern id keeps it unique even when slugs are reused.
pub fn derive_content_path(pattern: &PatternRecord, locale: Locale) -> String {
    format!("patterns/{}-{}.{}.md", pattern.slug, pattern.id, locale)
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Store(#[from] ContentStoreError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Markdown served for a request together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub markdown: String,
    pub requested: Locale,
    /// Locale whose file was served; `None` when nothing was found.
    pub served: Option<Locale>,
}

impl ResolvedContent {
    /// True when another locale's body stands in for the requested one.
    pub fn is_fallback(&self) -> bool {
        self.served.is_some_and(|served| served != self.requested)
    }

    /// True when no locale has a body yet.
    pub fn is_missing(&self) -> bool {
        self.served.is_none()
    }
}

pub struct ContentService {
    store: Arc<dyn ContentStore>,
    patterns: Arc<dyn PatternsWriteRepo>,
    cache: Arc<ContentCache>,
    trigger: CacheTrigger,
    default_locale: Locale,
}

impl ContentService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        patterns: Arc<dyn PatternsWriteRepo>,
        cache: Arc<ContentCache>,
        default_locale: Locale,
    ) -> Self {
        let trigger = CacheTrigger::new(Arc::clone(&cache));
        Self {
            store,
            patterns,
            cache,
            trigger,
            default_locale,
        }
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Body for `locale`, falling back to the default locale and then to "".
    pub async fn get_content(&self, pattern: &PatternRecord, locale: Locale) -> String {
        self.resolve_content(pattern, locale).await.markdown
    }

    pub async fn resolve_content(&self, pattern: &PatternRecord, locale: Locale) -> ResolvedContent {
        deps::record(CacheTag::Pattern(pattern.id));

        let mut candidates = vec![locale];
        if self.default_locale != locale {
            candidates.push(self.default_locale);
        }

        for candidate in candidates {
            if let Some(markdown) = self.read_locale(pattern, candidate).await {
                return ResolvedContent {
                    markdown,
                    requested: locale,
                    served: Some(candidate),
                };
            }
        }

        ResolvedContent {
            markdown: String::new(),
            requested: locale,
            served: None,
        }
    }

    /// Exact body for `locale` without fallback, for the admin editor.
    pub async fn read_exact(&self, pattern: &PatternRecord, locale: Locale) -> Option<String> {
        self.read_locale(pattern, locale).await
    }

    /// Write the body for `locale`, recording a derived path on first save,
    /// and invalidate everything cached from the pattern.
    pub async fn save_content(
        &self,
        pattern: &PatternRecord,
        markdown: &str,
        locale: Locale,
    ) -> Result<PatternRecord, ContentError> {
        let stored = pattern
            .content_path(locale)
            .filter(|path| validate_relative_path(path).is_ok());

        let (path, is_new) = match stored {
            Some(path) => (path.to_string(), false),
            None => {
                if let Some(rejected) = pattern.content_path(locale) {
                    warn!(
                        target = "application::content",
                        pattern_id = %pattern.id,
                        path = rejected,
                        "Stored content path escapes the content root; deriving a new one"
                    );
                }
                (derive_content_path(pattern, locale), true)
            }
        };

        self.store.write(&path, markdown).await?;

        let updated = if is_new {
            self.patterns
                .set_content_path(pattern.id, locale, &path)
                .await?
        } else {
            pattern.clone()
        };

        self.trigger.content_changed(pattern.id);
        Ok(updated)
    }

    /// Best-effort removal of every body file of a deleted pattern.
    pub async fn remove_content(&self, pattern: &PatternRecord) {
        for (locale, path) in &pattern.content_paths {
            if let Err(err) = self.store.remove(path).await {
                warn!(
                    target = "application::content",
                    pattern_id = %pattern.id,
                    locale = %locale,
                    path = path.as_str(),
                    error = %err,
                    "Failed to remove content file"
                );
            }
        }
    }

    /// Headings of the default-locale body.
    pub async fn get_headings(&self, pattern: &PatternRecord) -> Vec<Heading> {
        self.get_headings_for(pattern, self.default_locale).await
    }

    /// Headings of the body served for `locale`, matching the anchors of the
    /// rendered page.
    pub async fn get_headings_for(&self, pattern: &PatternRecord, locale: Locale) -> Vec<Heading> {
        self.cache
            .remember_for(
                CacheKey::pattern_headings(pattern.id, locale),
                self.cache.config().headings_ttl(),
                [CacheTag::Pattern(pattern.id)],
                || async {
                    let markdown = self.get_content(pattern, locale).await;
                    Ok::<_, Infallible>(extract_headings(&markdown))
                },
            )
            .await
            .unwrap_or_else(|never| match never {})
    }

    async fn read_locale(&self, pattern: &PatternRecord, locale: Locale) -> Option<String> {
        let path = pattern.content_path(locale)?;
        match self.store.read(path).await {
            Ok(Some(markdown)) => Some(markdown),
            Ok(None) => {
                debug!(
                    target = "application::content",
                    pattern_id = %pattern.id,
                    locale = %locale,
                    path,
                    "Content file missing"
                );
                None
            }
            Err(err) => {
                warn!(
                    target = "application::content",
                    pattern_id = %pattern.id,
                    locale = %locale,
                    path,
                    error = %err,
                    "Content file unreadable; treating as missing"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_relative_path_rejects_escapes() {
        assert!(validate_relative_path("patterns/observer.zh.md").is_ok());
        assert!(validate_relative_path("../etc/passwd").is_err());
        assert!(validate_relative_path("patterns/../../x").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("").is_err());
    }
}
