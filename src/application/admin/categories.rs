use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::application::admin::{
    AdminError, FieldErrors, check_description, check_explicit_slug, check_name,
    check_sort_order, derive_unique_slug, normalize_text,
};
use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, UpdateCategoryParams,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::CategoryRecord;
use crate::domain::locale::{Locale, LocalizedText};

/// Create/update payload. A missing slug is derived from the name on create
/// and left unchanged on update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub sort_order: i32,
}

struct ValidCategory {
    slug: Option<String>,
    name: LocalizedText,
    description: LocalizedText,
    sort_order: i32,
}

#[derive(Clone)]
pub struct AdminCategoryService {
    reader: Arc<dyn CategoriesRepo>,
    writer: Arc<dyn CategoriesWriteRepo>,
    trigger: CacheTrigger,
    default_locale: Locale,
}

impl AdminCategoryService {
    pub fn new(
        reader: Arc<dyn CategoriesRepo>,
        writer: Arc<dyn CategoriesWriteRepo>,
        trigger: CacheTrigger,
        default_locale: Locale,
    ) -> Self {
        Self {
            reader,
            writer,
            trigger,
            default_locale,
        }
    }

    pub async fn list(&self) -> Result<Vec<CategoryRecord>, AdminError> {
        Ok(self.reader.list_categories().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<CategoryRecord, AdminError> {
        self.reader
            .find_category_by_id(id)
            .await?
            .ok_or(AdminError::NotFound)
    }

    pub async fn create(&self, input: CategoryInput) -> Result<CategoryRecord, AdminError> {
        let valid = self.validate(input, None).await?;

        let slug = match valid.slug {
            Some(slug) => slug,
            None => {
                let reader = Arc::clone(&self.reader);
                derive_unique_slug(&valid.name, self.default_locale, move |candidate| {
                    let reader = Arc::clone(&reader);
                    let candidate = candidate.to_string();
                    async move {
                        reader
                            .find_category_by_slug(&candidate)
                            .await
                            .map(|existing| existing.is_none())
                    }
                })
                .await?
            }
        };

        let category = self
            .writer
            .create_category(CreateCategoryParams {
                slug,
                name: valid.name,
                description: valid.description,
                sort_order: valid.sort_order,
            })
            .await?;

        let evicted = self
            .trigger
            .category_changed(category.id, &[category.slug.as_str()]);
        info!(
            target = "application::admin::categories",
            category_id = %category.id,
            slug = category.slug.as_str(),
            evicted,
            "Category created"
        );
        Ok(category)
    }

    pub async fn update(&self, id: Uuid, input: CategoryInput) -> Result<CategoryRecord, AdminError> {
        let existing = self.get(id).await?;
        let valid = self.validate(input, Some(id)).await?;

        let category = self
            .writer
            .update_category(UpdateCategoryParams {
                id,
                slug: valid.slug.unwrap_or_else(|| existing.slug.clone()),
                name: valid.name,
                description: valid.description,
                sort_order: valid.sort_order,
            })
            .await?;

        let evicted = self.trigger.category_changed(
            category.id,
            &[existing.slug.as_str(), category.slug.as_str()],
        );
        info!(
            target = "application::admin::categories",
            category_id = %category.id,
            slug = category.slug.as_str(),
            evicted,
            "Category updated"
        );
        Ok(category)
    }

    /// Delete an empty category. Categories that still own patterns are kept.
    pub async fn delete(&self, id: Uuid) -> Result<(), AdminError> {
        let existing = self.get(id).await?;

        let count = self.reader.count_patterns_in_category(id).await?;
        if count > 0 {
            return Err(AdminError::CategoryInUse { count });
        }

        self.writer.delete_category(id).await?;

        let evicted = self
            .trigger
            .category_changed(id, &[existing.slug.as_str()]);
        info!(
            target = "application::admin::categories",
            category_id = %id,
            slug = existing.slug.as_str(),
            evicted,
            "Category deleted"
        );
        Ok(())
    }

    async fn validate(
        &self,
        input: CategoryInput,
        current: Option<Uuid>,
    ) -> Result<ValidCategory, AdminError> {
        let mut errors = FieldErrors::new();

        let name = normalize_text(&input.name);
        let description = normalize_text(&input.description);
        check_name(&mut errors, &name, self.default_locale);
        check_description(&mut errors, &description);
        check_sort_order(&mut errors, input.sort_order);
        let slug = check_explicit_slug(&mut errors, input.slug.as_deref());

        if let Some(slug) = slug.as_deref().filter(|_| errors.get("slug").is_none()) {
            let taken = self
                .reader
                .find_category_by_slug(slug)
                .await?
                .is_some_and(|other| Some(other.id) != current);
            if taken {
                errors.add("slug", "is already taken");
            }
        }

        errors.into_result()?;
        Ok(ValidCategory {
            slug,
            name,
            description,
            sort_order: input.sort_order,
        })
    }
}
