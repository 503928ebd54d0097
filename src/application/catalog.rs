//! Read-side services behind the public pages.
//!
//! Every public read goes through [`ContentCache`]: listings per locale,
//! pattern detail per slug and locale, and the rendered body, heading outline
//! and related list nested inside the detail entry. Nested entries propagate
//! their tags outward, so invalidating a pattern drops the detail page too.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::content::ContentService;
use crate::application::render::RenderService;
use crate::application::repos::{CategoriesRepo, PatternListScope, PatternsRepo, RepoError};
use crate::cache::{CacheKey, CacheTag, ContentCache, deps};
use crate::domain::entities::{CategoryRecord, PatternRecord};
use crate::domain::locale::Locale;
use crate::domain::toc::Heading;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("pattern or category not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A published pattern as shown in listings, localized for one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryListing {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub patterns: Vec<PatternSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub slug: String,
    pub name: String,
}

/// Rendered body of one pattern in one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedBody {
    pub html: String,
    pub contains_code: bool,
    pub contains_mermaid: bool,
    pub served_locale: Option<Locale>,
    pub fallback: bool,
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDetail {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: CategorySummary,
    pub body: RenderedBody,
    pub headings: Vec<Heading>,
    pub related: Vec<PatternSummary>,
}

pub struct CatalogService {
    categories: Arc<dyn CategoriesRepo>,
    patterns: Arc<dyn PatternsRepo>,
    content: Arc<ContentService>,
    cache: Arc<ContentCache>,
    renderer: Arc<dyn RenderService>,
    default_locale: Locale,
    related_limit: usize,
}

impl CatalogService {
    pub fn new(
        categories: Arc<dyn CategoriesRepo>,
        patterns: Arc<dyn PatternsRepo>,
        content: Arc<ContentService>,
        cache: Arc<ContentCache>,
        renderer: Arc<dyn RenderService>,
        related_limit: usize,
    ) -> Self {
        let default_locale = content.default_locale();
        Self {
            categories,
            patterns,
            content,
            cache,
            renderer,
            default_locale,
            related_limit,
        }
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Categories that have at least one published pattern, each with its
    /// published patterns.
    pub async fn home(&self, locale: Locale) -> Result<Vec<CategoryListing>, CatalogError> {
        self.cache
            .remember_for(
                CacheKey::home_categories(locale),
                self.cache.config().listing_ttl(),
                [CacheTag::CategoryList, CacheTag::PatternList],
                || async {
                    let listings = self.build_listings(locale).await?;
                    Ok(listings
                        .into_iter()
                        .filter(|listing| !listing.patterns.is_empty())
                        .collect())
                },
            )
            .await
    }

    /// Every category with its published patterns.
    pub async fn pattern_index(&self, locale: Locale) -> Result<Vec<CategoryListing>, CatalogError> {
        self.cache
            .remember_for(
                CacheKey::pattern_index_categories(locale),
                self.cache.config().listing_ttl(),
                [CacheTag::CategoryList, CacheTag::PatternList],
                || self.build_listings(locale),
            )
            .await
    }

    /// A published pattern by slug with its rendered body, outline and
    /// related patterns.
    pub async fn pattern_detail(
        &self,
        slug: &str,
        locale: Locale,
    ) -> Result<PatternDetail, CatalogError> {
        self.cache
            .remember_for(
                CacheKey::pattern_detail(slug, locale),
                self.cache.config().detail_ttl(),
                [CacheTag::PatternSlug(slug.to_string())],
                || self.build_detail(slug, locale),
            )
            .await
    }

    pub async fn category_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        Ok(self.categories.find_category_by_slug(slug).await?.is_some())
    }

    async fn build_listings(&self, locale: Locale) -> Result<Vec<CategoryListing>, CatalogError> {
        let categories = self.categories.list_categories().await?;
        let patterns = self.patterns.list_patterns(PatternListScope::Public).await?;

        let mut by_category: HashMap<Uuid, Vec<PatternSummary>> = HashMap::new();
        for pattern in patterns.iter().filter(|pattern| pattern.published) {
            by_category
                .entry(pattern.category_id)
                .or_default()
                .push(self.summarize(pattern, locale));
        }

        Ok(categories
            .iter()
            .map(|category| CategoryListing {
                id: category.id,
                slug: category.slug.clone(),
                name: category
                    .name
                    .resolve(locale, self.default_locale)
                    .to_string(),
                description: category
                    .description
                    .resolve(locale, self.default_locale)
                    .to_string(),
                patterns: by_category.remove(&category.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn build_detail(&self, slug: &str, locale: Locale) -> Result<PatternDetail, CatalogError> {
        let pattern = self
            .patterns
            .find_pattern_by_slug(slug)
            .await?
            .filter(|pattern| pattern.published)
            .ok_or(CatalogError::NotFound)?;

        deps::record(CacheTag::Pattern(pattern.id));
        deps::record(CacheTag::Category(pattern.category_id));

        let category = self
            .categories
            .find_category_by_id(pattern.category_id)
            .await?
            .ok_or_else(|| {
                warn!(
                    target = "application::catalog",
                    pattern_id = %pattern.id,
                    category_id = %pattern.category_id,
                    "Pattern references a missing category"
                );
                CatalogError::NotFound
            })?;

        let body = self.rendered_body(&pattern, locale).await;
        let headings = self.content.get_headings_for(&pattern, locale).await;
        let related = self.related_patterns(&pattern, locale).await?;

        Ok(PatternDetail {
            id: pattern.id,
            slug: pattern.slug.clone(),
            name: pattern
                .name
                .resolve(locale, self.default_locale)
                .to_string(),
            description: pattern
                .description
                .resolve(locale, self.default_locale)
                .to_string(),
            category: self.category_summary(&category, locale),
            body,
            headings,
            related,
        })
    }

    async fn rendered_body(&self, pattern: &PatternRecord, locale: Locale) -> RenderedBody {
        self.cache
            .remember_for(
                CacheKey::pattern_body(pattern.id, locale),
                self.cache.config().detail_ttl(),
                [CacheTag::Pattern(pattern.id)],
                || async {
                    let resolved = self.content.resolve_content(pattern, locale).await;
                    let output = self.renderer.render(&resolved.markdown);
                    Ok::<_, Infallible>(RenderedBody {
                        html: output.html,
                        contains_code: output.contains_code,
                        contains_mermaid: output.contains_mermaid,
                        served_locale: resolved.served,
                        fallback: resolved.is_fallback(),
                        missing: resolved.is_missing(),
                    })
                },
            )
            .await
            .unwrap_or_else(|never| match never {})
    }

    async fn related_patterns(
        &self,
        pattern: &PatternRecord,
        locale: Locale,
    ) -> Result<Vec<PatternSummary>, CatalogError> {
        self.cache
            .remember_for(
                CacheKey::related_patterns(pattern.id, locale),
                self.cache.config().detail_ttl(),
                [CacheTag::Category(pattern.category_id), CacheTag::PatternList],
                || async {
                    let siblings = self
                        .patterns
                        .list_patterns_in_category(pattern.category_id, PatternListScope::Public)
                        .await?;
                    Ok::<_, CatalogError>(
                        siblings
                            .iter()
                            .filter(|sibling| sibling.published && sibling.id != pattern.id)
                            .take(self.related_limit)
                            .map(|sibling| self.summarize(sibling, locale))
                            .collect(),
                    )
                },
            )
            .await
    }

    fn summarize(&self, pattern: &PatternRecord, locale: Locale) -> PatternSummary {
        PatternSummary {
            id: pattern.id,
            slug: pattern.slug.clone(),
            name: pattern
                .name
                .resolve(locale, self.default_locale)
                .to_string(),
            description: pattern
                .description
                .resolve(locale, self.default_locale)
                .to_string(),
        }
    }

    fn category_summary(&self, category: &CategoryRecord, locale: Locale) -> CategorySummary {
        CategorySummary {
            slug: category.slug.clone(),
            name: category
                .name
                .resolve(locale, self.default_locale)
                .to_string(),
        }
    }
}
