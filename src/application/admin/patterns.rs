use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::application::admin::{
    AdminError, FieldErrors, check_description, check_explicit_slug, check_name,
    check_sort_order, derive_unique_slug, normalize_text,
};
use crate::application::content::ContentService;
use crate::application::repos::{
    CategoriesRepo, CreatePatternParams, PatternListScope, PatternsRepo, PatternsWriteRepo,
    UpdatePatternParams,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::{ContentPaths, PatternRecord};
use crate::domain::locale::{Locale, LocalizedText};

const MAX_CONTENT_BYTES: usize = 1024 * 1024;

/// Create/update payload for pattern metadata. Bodies are edited separately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternInput {
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub sort_order: i32,
}

struct ValidPattern {
    category_id: Uuid,
    slug: Option<String>,
    name: LocalizedText,
    description: LocalizedText,
    published: bool,
    sort_order: i32,
}

#[derive(Clone)]
pub struct AdminPatternService {
    reader: Arc<dyn PatternsRepo>,
    writer: Arc<dyn PatternsWriteRepo>,
    categories: Arc<dyn CategoriesRepo>,
    content: Arc<ContentService>,
    trigger: CacheTrigger,
    default_locale: Locale,
}

impl AdminPatternService {
    pub fn new(
        reader: Arc<dyn PatternsRepo>,
        writer: Arc<dyn PatternsWriteRepo>,
        categories: Arc<dyn CategoriesRepo>,
        content: Arc<ContentService>,
        trigger: CacheTrigger,
    ) -> Self {
        let default_locale = content.default_locale();
        Self {
            reader,
            writer,
            categories,
            content,
            trigger,
            default_locale,
        }
    }

    pub async fn list(&self) -> Result<Vec<PatternRecord>, AdminError> {
        Ok(self.reader.list_patterns(PatternListScope::Admin).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<PatternRecord, AdminError> {
        self.reader
            .find_pattern_by_id(id)
            .await?
            .ok_or(AdminError::NotFound)
    }

    pub async fn create(&self, input: PatternInput) -> Result<PatternRecord, AdminError> {
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
                            .find_pattern_by_slug(&candidate)
                            .await
                            .map(|existing| existing.is_none())
                    }
                })
                .await?
            }
        };

        let pattern = self
            .writer
            .create_pattern(CreatePatternParams {
                category_id: valid.category_id,
                slug,
                name: valid.name,
                description: valid.description,
                content_paths: ContentPaths::new(),
                published: valid.published,
                sort_order: valid.sort_order,
            })
            .await?;

        let evicted = self.trigger.pattern_changed(
            pattern.id,
            &[pattern.category_id],
            &[pattern.slug.as_str()],
        );
        info!(
            target = "application::admin::patterns",
            pattern_id = %pattern.id,
            slug = pattern.slug.as_str(),
            evicted,
            "Pattern created"
        );
        Ok(pattern)
    }

    pub async fn update(&self, id: Uuid, input: PatternInput) -> Result<PatternRecord, AdminError> {
        let existing = self.get(id).await?;
        let valid = self.validate(input, Some(&existing)).await?;

        let pattern = self
            .writer
            .update_pattern(UpdatePatternParams {
                id,
                category_id: valid.category_id,
                slug: valid.slug.unwrap_or_else(|| existing.slug.clone()),
                name: valid.name,
                description: valid.description,
                published: valid.published,
                sort_order: valid.sort_order,
            })
            .await?;

        let evicted = self.trigger.pattern_changed(
            pattern.id,
            &[existing.category_id, pattern.category_id],
            &[existing.slug.as_str(), pattern.slug.as_str()],
        );
        info!(
            target = "application::admin::patterns",
            pattern_id = %pattern.id,
            slug = pattern.slug.as_str(),
            evicted,
            "Pattern updated"
        );
        Ok(pattern)
    }

    /// Delete the row, then its body files.
    pub async fn delete(&self, id: Uuid) -> Result<(), AdminError> {
        let existing = self.get(id).await?;

        self.writer.delete_pattern(id).await?;
        self.content.remove_content(&existing).await;

        let evicted = self.trigger.pattern_changed(
            id,
            &[existing.category_id],
            &[existing.slug.as_str()],
        );
        info!(
            target = "application::admin::patterns",
            pattern_id = %id,
            slug = existing.slug.as_str(),
            evicted,
            "Pattern deleted"
        );
        Ok(())
    }

    /// The stored body for exactly `locale`, empty when there is none.
    pub async fn read_content(&self, id: Uuid, locale: Locale) -> Result<String, AdminError> {
        let pattern = self.get(id).await?;
        Ok(self
            .content
            .read_exact(&pattern, locale)
            .await
            .unwrap_or_default())
    }

    pub async fn save_content(
        &self,
        id: Uuid,
        locale: Locale,
        markdown: &str,
    ) -> Result<PatternRecord, AdminError> {
        if markdown.len() > MAX_CONTENT_BYTES {
            return Err(AdminError::Validation(FieldErrors::single(
                "markdown",
                format!("must be at most {MAX_CONTENT_BYTES} bytes"),
            )));
        }

        let pattern = self.get(id).await?;
        let updated = self.content.save_content(&pattern, markdown, locale).await?;
        info!(
            target = "application::admin::patterns",
            pattern_id = %id,
            locale = %locale,
            bytes = markdown.len(),
            "Pattern content saved"
        );
        Ok(updated)
    }

    async fn validate(
        &self,
        input: PatternInput,
        current: Option<&PatternRecord>,
    ) -> Result<ValidPattern, AdminError> {
        let mut errors = FieldErrors::new();

        let name = normalize_text(&input.name);
        let description = normalize_text(&input.description);
        check_name(&mut errors, &name, self.default_locale);
        check_description(&mut errors, &description);
        check_sort_order(&mut errors, input.sort_order);
        let slug = check_explicit_slug(&mut errors, input.slug.as_deref());

        let category_id = input
            .category_id
            .or_else(|| current.map(|pattern| pattern.category_id));
        match category_id {
            None => errors.add("category_id", "is required"),
            Some(category_id) => {
                if self
                    .categories
                    .find_category_by_id(category_id)
                    .await?
                    .is_none()
                {
                    errors.into_result()?;
                    return Err(AdminError::UnknownCategory);
                }
            }
        }

        if let Some(slug) = slug.as_deref().filter(|_| errors.get("slug").is_none()) {
            let current_id = current.map(|pattern| pattern.id);
            let taken = self
                .reader
                .find_pattern_by_slug(slug)
                .await?
                .is_some_and(|other| Some(other.id) != current_id);
            if taken {
                errors.add("slug", "is already taken");
            }
        }

        errors.into_result()?;
        let Some(category_id) = category_id else {
            return Err(AdminError::Validation(FieldErrors::single(
                "category_id",
                "is required",
            )));
        };

        Ok(ValidPattern {
            category_id,
            slug,
            name,
            description,
            published: input.published,
            sort_order: input.sort_order,
        })
    }
}
