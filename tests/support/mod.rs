//! In-memory fixtures shared by the integration tests.
//!
//! `MemoryRepositories` stands in for Postgres with the same observable
//! behaviour the services rely on: unique slugs, `RESTRICT` on category
//! deletion, ordering by `sort_order` then slug.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use patternbook::{
    application::{
        admin::{AdminCategoryService, AdminPatternService},
        catalog::CatalogService,
        content::{ContentService, ContentStore},
        render::{RenderService, render_service},
        repos::{
            CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, CreatePatternParams,
            PatternListScope, PatternsRepo, PatternsWriteRepo, RepoError, UpdateCategoryParams,
            UpdatePatternParams,
        },
    },
    cache::{CacheConfig, CacheTrigger, ContentCache},
    domain::{
        entities::{CategoryRecord, ContentPaths, PatternRecord},
        locale::{Locale, LocalizedText},
    },
    infra::{
        content::FileContentStore,
        http::{AdminState, HealthProbe, PublicState},
    },
};
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryRepositories {
    categories: Mutex<Vec<CategoryRecord>>,
    patterns: Mutex<Vec<PatternRecord>>,
    pub list_pattern_calls: AtomicUsize,
}

fn sorted<T: Clone>(items: &[T], key: impl Fn(&T) -> (i32, String)) -> Vec<T> {
    let mut items = items.to_vec();
    items.sort_by_key(|item| key(item));
    items
}

fn published_in_scope(pattern: &PatternRecord, scope: PatternListScope) -> bool {
    match scope {
        PatternListScope::Public => pattern.published,
        PatternListScope::Admin => true,
    }
}

impl MemoryRepositories {
    pub fn pattern(&self, id: Uuid) -> Option<PatternRecord> {
        self.patterns
            .lock()
            .expect("patterns lock")
            .iter()
            .find(|pattern| pattern.id == id)
            .cloned()
    }

    /// Edit a row behind the services' back, as a manual database change would.
    pub fn edit_pattern(&self, id: Uuid, edit: impl FnOnce(&mut PatternRecord)) {
        let mut patterns = self.patterns.lock().expect("patterns lock");
        if let Some(pattern) = patterns.iter_mut().find(|pattern| pattern.id == id) {
            edit(pattern);
        }
    }
}

#[async_trait]
impl CategoriesRepo for MemoryRepositories {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let categories = self.categories.lock().expect("categories lock");
        Ok(sorted(&categories, |c| (c.sort_order, c.slug.clone())))
    }

    async fn find_category_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let categories = self.categories.lock().expect("categories lock");
        Ok(categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        let categories = self.categories.lock().expect("categories lock");
        Ok(categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn count_patterns_in_category(&self, id: Uuid) -> Result<u64, RepoError> {
        let patterns = self.patterns.lock().expect("patterns lock");
        Ok(patterns.iter().filter(|p| p.category_id == id).count() as u64)
    }
}

#[async_trait]
impl CategoriesWriteRepo for MemoryRepositories {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut categories = self.categories.lock().expect("categories lock");
        if categories.iter().any(|c| c.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "pattern_categories_slug_key".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let record = CategoryRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            name: params.name,
            description: params.description,
            sort_order: params.sort_order,
            created_at: now,
            updated_at: now,
        };
        categories.push(record.clone());
        Ok(record)
    }

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut categories = self.categories.lock().expect("categories lock");
        if categories
            .iter()
            .any(|c| c.slug == params.slug && c.id != params.id)
        {
            return Err(RepoError::Duplicate {
                constraint: "pattern_categories_slug_key".to_string(),
            });
        }
        let record = categories
            .iter_mut()
            .find(|c| c.id == params.id)
            .ok_or(RepoError::NotFound)?;
        record.slug = params.slug;
        record.name = params.name;
        record.description = params.description;
        record.sort_order = params.sort_order;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        if self
            .patterns
            .lock()
            .expect("patterns lock")
            .iter()
            .any(|p| p.category_id == id)
        {
            return Err(RepoError::Integrity {
                message: "category is still referenced by design_patterns".to_string(),
            });
        }
        let mut categories = self.categories.lock().expect("categories lock");
        let before = categories.len();
        categories.retain(|c| c.id != id);
        if categories.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl PatternsRepo for MemoryRepositories {
    async fn list_patterns(
        &self,
        scope: PatternListScope,
    ) -> Result<Vec<PatternRecord>, RepoError> {
        self.list_pattern_calls.fetch_add(1, Ordering::SeqCst);
        let patterns = self.patterns.lock().expect("patterns lock");
        let visible: Vec<_> = patterns
            .iter()
            .filter(|p| published_in_scope(p, scope))
            .cloned()
            .collect();
        Ok(sorted(&visible, |p| (p.sort_order, p.slug.clone())))
    }

    async fn list_patterns_in_category(
        &self,
        category_id: Uuid,
        scope: PatternListScope,
    ) -> Result<Vec<PatternRecord>, RepoError> {
        let patterns = self.patterns.lock().expect("patterns lock");
        let visible: Vec<_> = patterns
            .iter()
            .filter(|p| p.category_id == category_id && published_in_scope(p, scope))
            .cloned()
            .collect();
        Ok(sorted(&visible, |p| (p.sort_order, p.slug.clone())))
    }

    async fn find_pattern_by_id(&self, id: Uuid) -> Result<Option<PatternRecord>, RepoError> {
        Ok(self.pattern(id))
    }

    async fn find_pattern_by_slug(&self, slug: &str) -> Result<Option<PatternRecord>, RepoError> {
        let patterns = self.patterns.lock().expect("patterns lock");
        Ok(patterns.iter().find(|p| p.slug == slug).cloned())
    }
}

#[async_trait]
impl PatternsWriteRepo for MemoryRepositories {
    async fn create_pattern(
        &self,
        params: CreatePatternParams,
    ) -> Result<PatternRecord, RepoError> {
        let known_category = self
            .categories
            .lock()
            .expect("categories lock")
            .iter()
            .any(|c| c.id == params.category_id);
        if !known_category {
            return Err(RepoError::InvalidInput {
                message: "design_patterns_category_id_fkey".to_string(),
            });
        }

        let mut patterns = self.patterns.lock().expect("patterns lock");
        if patterns.iter().any(|p| p.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "design_patterns_slug_key".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let record = PatternRecord {
            id: Uuid::new_v4(),
            category_id: params.category_id,
            slug: params.slug,
            name: params.name,
            description: params.description,
            content_paths: params.content_paths,
            published: params.published,
            sort_order: params.sort_order,
            created_at: now,
            updated_at: now,
        };
        patterns.push(record.clone());
        Ok(record)
    }

    async fn update_pattern(
        &self,
        params: UpdatePatternParams,
    ) -> Result<PatternRecord, RepoError> {
        let mut patterns = self.patterns.lock().expect("patterns lock");
        if patterns
            .iter()
            .any(|p| p.slug == params.slug && p.id != params.id)
        {
            return Err(RepoError::Duplicate {
                constraint: "design_patterns_slug_key".to_string(),
            });
        }
        let record = patterns
            .iter_mut()
            .find(|p| p.id == params.id)
            .ok_or(RepoError::NotFound)?;
        record.category_id = params.category_id;
        record.slug = params.slug;
        record.name = params.name;
        record.description = params.description;
        record.published = params.published;
        record.sort_order = params.sort_order;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn set_content_path(
        &self,
        id: Uuid,
        locale: Locale,
        path: &str,
    ) -> Result<PatternRecord, RepoError> {
        let mut patterns = self.patterns.lock().expect("patterns lock");
        let record = patterns
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        record.content_paths.insert(locale, path.to_string());
        Ok(record.clone())
    }

    async fn delete_pattern(&self, id: Uuid) -> Result<(), RepoError> {
        let mut patterns = self.patterns.lock().expect("patterns lock");
        let before = patterns.len();
        patterns.retain(|p| p.id != id);
        if patterns.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

/// Health probe with a switchable outcome.
#[derive(Default)]
pub struct StaticHealth {
    pub down: AtomicBool,
}

#[async_trait]
impl HealthProbe for StaticHealth {
    async fn check(&self) -> Result<(), sqlx::Error> {
        if self.down.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

pub fn text(zh: &str, en: &str) -> LocalizedText {
    let mut text = LocalizedText::new();
    if !zh.is_empty() {
        text.set(Locale::Zh, zh);
    }
    if !en.is_empty() {
        text.set(Locale::En, en);
    }
    text
}

/// Every service wired over in-memory repositories and a temporary content root.
pub struct Harness {
    pub repos: Arc<MemoryRepositories>,
    pub cache: Arc<ContentCache>,
    pub content: Arc<ContentService>,
    pub catalog: Arc<CatalogService>,
    pub categories: Arc<AdminCategoryService>,
    pub patterns: Arc<AdminPatternService>,
    pub health: Arc<StaticHealth>,
    pub content_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cache_config(CacheConfig::default())
    }

    pub fn with_cache_config(config: CacheConfig) -> Self {
        let default_locale = Locale::Zh;
        let repos = Arc::new(MemoryRepositories::default());
        let content_dir = TempDir::new().expect("temp content dir");
        let store: Arc<dyn ContentStore> = Arc::new(
            FileContentStore::new(content_dir.path().to_path_buf()).expect("content store"),
        );

        let cache = Arc::new(ContentCache::new(config));
        let trigger = CacheTrigger::new(cache.clone());
        let renderer: Arc<dyn RenderService> = render_service();

        let content = Arc::new(ContentService::new(
            store,
            repos.clone(),
            cache.clone(),
            default_locale,
        ));
        let catalog = Arc::new(CatalogService::new(
            repos.clone(),
            repos.clone(),
            content.clone(),
            cache.clone(),
            renderer,
            4,
        ));
        let categories = Arc::new(AdminCategoryService::new(
            repos.clone(),
            repos.clone(),
            trigger.clone(),
            default_locale,
        ));
        let patterns = Arc::new(AdminPatternService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            content.clone(),
            trigger,
        ));

        Self {
            repos,
            cache,
            content,
            catalog,
            categories,
            patterns,
            health: Arc::new(StaticHealth::default()),
            content_dir,
        }
    }

    pub fn public_state(&self) -> PublicState {
        PublicState {
            catalog: self.catalog.clone(),
            health: self.health.clone(),
            default_locale: Locale::Zh,
        }
    }

    pub fn admin_state(&self) -> AdminState {
        AdminState {
            categories: self.categories.clone(),
            patterns: self.patterns.clone(),
            cache: self.cache.clone(),
            health: self.health.clone(),
        }
    }

    pub async fn seed_category(&self, slug: &str, zh: &str, en: &str) -> CategoryRecord {
        self.repos
            .create_category(CreateCategoryParams {
                slug: slug.to_string(),
                name: text(zh, en),
                description: LocalizedText::new(),
                sort_order: 0,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_pattern(
        &self,
        category: &CategoryRecord,
        slug: &str,
        zh: &str,
        en: &str,
        published: bool,
    ) -> PatternRecord {
        self.repos
            .create_pattern(CreatePatternParams {
                category_id: category.id,
                slug: slug.to_string(),
                name: text(zh, en),
                description: LocalizedText::new(),
                content_paths: ContentPaths::new(),
                published,
                sort_order: 0,
            })
            .await
            .expect("seed pattern")
    }

    pub async fn write_body(
        &self,
        pattern: &PatternRecord,
        locale: Locale,
        markdown: &str,
    ) -> PatternRecord {
        let current = self.repos.pattern(pattern.id).expect("seeded pattern");
        self.content
            .save_content(&current, markdown, locale)
            .await
            .expect("save body")
    }
}
