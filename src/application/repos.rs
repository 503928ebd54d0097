//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{CategoryRecord, ContentPaths, PatternRecord};
use crate::domain::locale::{Locale, LocalizedText};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which patterns a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternListScope {
    /// Published patterns only.
    Public,
    /// Everything, for the admin surface.
    Admin,
}

#[derive(Debug, Clone)]
pub struct CreateCategoryParams {
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct UpdateCategoryParams {
    pub id: Uuid,
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct CreatePatternParams {
    pub category_id: Uuid,
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub content_paths: ContentPaths,
    pub published: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct UpdatePatternParams {
    pub id: Uuid,
    pub category_id: Uuid,
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub published: bool,
    pub sort_order: i32,
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    /// All categories ordered by `sort_order`, then slug.
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;

    async fn find_category_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;

    async fn find_category_by_slug(&self, slug: &str)
    -> Result<Option<CategoryRecord>, RepoError>;

    /// Number of patterns (published or not) referencing the category.
    async fn count_patterns_in_category(&self, id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait CategoriesWriteRepo: Send + Sync {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PatternsRepo: Send + Sync {
    /// Patterns ordered by `sort_order`, then slug.
    async fn list_patterns(&self, scope: PatternListScope)
    -> Result<Vec<PatternRecord>, RepoError>;

    async fn list_patterns_in_category(
        &self,
        category_id: Uuid,
        scope: PatternListScope,
    ) -> Result<Vec<PatternRecord>, RepoError>;

    async fn find_pattern_by_id(&self, id: Uuid) -> Result<Option<PatternRecord>, RepoError>;

    async fn find_pattern_by_slug(&self, slug: &str) -> Result<Option<PatternRecord>, RepoError>;
}

#[async_trait]
pub trait PatternsWriteRepo: Send + Sync {
    async fn create_pattern(&self, params: CreatePatternParams)
    -> Result<PatternRecord, RepoError>;

    async fn update_pattern(&self, params: UpdatePatternParams)
    -> Result<PatternRecord, RepoError>;

    /// Record the content file of one locale. Other locales are untouched.
    async fn set_content_path(
        &self,
        id: Uuid,
        locale: Locale,
        path: &str,
    ) -> Result<PatternRecord, RepoError>;

    async fn delete_pattern(&self, id: Uuid) -> Result<(), RepoError>;
}
