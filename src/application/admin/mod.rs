//! Application services for the administrative surface.
//!
//! Both services validate input into [`FieldErrors`] before touching storage
//! and fire the cache trigger after every successful mutation.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::application::content::ContentError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::locale::{Locale, LocalizedText};
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug};

pub mod categories;
pub mod patterns;

pub use categories::{AdminCategoryService, CategoryInput};
pub use patterns::{AdminPatternService, PatternInput};

const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;

/// Field-level validation messages keyed by input field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), AdminError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AdminError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("validation failed on {}", .0.fields().collect::<Vec<_>>().join(", "))]
    Validation(FieldErrors),
    #[error("category is referenced by {count} patterns")]
    CategoryInUse { count: u64 },
    #[error("category does not exist")]
    UnknownCategory,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Repo(RepoError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<RepoError> for AdminError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } => {
                AdminError::Validation(FieldErrors::single("slug", "is already taken"))
            }
            RepoError::NotFound => AdminError::NotFound,
            other => AdminError::Repo(other),
        }
    }
}

impl From<DomainError> for AdminError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => {
                AdminError::Validation(FieldErrors::single(field, message))
            }
            DomainError::NotFound { .. } => AdminError::NotFound,
            DomainError::Invariant { message } => {
                AdminError::Repo(RepoError::Integrity { message })
            }
        }
    }
}

/// Trim every value; blank translations are dropped.
pub(crate) fn normalize_text(text: &LocalizedText) -> LocalizedText {
    text.iter()
        .map(|(locale, value)| (locale, value.to_string()))
        .collect()
}

pub(crate) fn check_name(errors: &mut FieldErrors, name: &LocalizedText, default_locale: Locale) {
    if name.exact(default_locale).is_none() {
        errors.add(
            "name",
            format!("a {} name is required", default_locale.as_str()),
        );
    }
    if name
        .iter()
        .any(|(_, value)| value.chars().count() > MAX_NAME_LEN)
    {
        errors.add(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        );
    }
}

pub(crate) fn check_description(errors: &mut FieldErrors, description: &LocalizedText) {
    if description
        .iter()
        .any(|(_, value)| value.chars().count() > MAX_DESCRIPTION_LEN)
    {
        errors.add(
            "description",
            format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
        );
    }
}

pub(crate) fn check_sort_order(errors: &mut FieldErrors, sort_order: i32) {
    if sort_order < 0 {
        errors.add("sort_order", "must not be negative");
    }
}

/// Validate an explicit slug, recording problems under `slug`.
/// Returns the trimmed slug when one was supplied.
pub(crate) fn check_explicit_slug(errors: &mut FieldErrors, slug: Option<&str>) -> Option<String> {
    let slug = slug.map(str::trim).filter(|slug| !slug.is_empty())?;
    if let Err(DomainError::Validation { field, message }) = validate_slug(slug) {
        errors.add(field, message);
    }
    Some(slug.to_string())
}

/// Derive a unique slug from the name, preferring the default locale's text.
pub(crate) async fn derive_unique_slug<F, Fut>(
    name: &LocalizedText,
    default_locale: Locale,
    is_unique: F,
) -> Result<String, AdminError>
where
    F: FnMut(&str) -> Fut,
    Fut: std::future::Future<Output = Result<bool, RepoError>>,
{
    let source = name.resolve(default_locale, default_locale);
    match generate_unique_slug_async(source, is_unique).await {
        Ok(slug) => Ok(slug),
        Err(SlugAsyncError::Slug(SlugError::EmptyInput | SlugError::Unrepresentable { .. })) => {
            Err(AdminError::Validation(FieldErrors::single(
                "slug",
                "could not be derived from the name; provide one explicitly",
            )))
        }
        Err(SlugAsyncError::Slug(SlugError::Exhausted { base })) => Err(AdminError::Validation(
            FieldErrors::single("slug", format!("no free slug left for `{base}`")),
        )),
        Err(SlugAsyncError::Predicate(err)) => Err(AdminError::from(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_constraint_becomes_slug_field_error() {
        let err = AdminError::from(RepoError::Duplicate {
            constraint: "design_patterns_slug_key".to_string(),
        });
        match err {
            AdminError::Validation(errors) => {
                assert_eq!(errors.get("slug"), Some(&["is already taken".to_string()][..]));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn name_requires_default_locale() {
        let mut errors = FieldErrors::new();
        let name = normalize_text(&LocalizedText::new().with(Locale::En, "Observer"));
        check_name(&mut errors, &name, Locale::Zh);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn explicit_slug_is_checked() {
        let mut errors = FieldErrors::new();
        assert_eq!(check_explicit_slug(&mut errors, Some("  ")), None);
        assert!(errors.is_empty());

        let slug = check_explicit_slug(&mut errors, Some("Bad Slug"));
        assert_eq!(slug.as_deref(), Some("Bad Slug"));
        assert!(errors.get("slug").is_some());
    }
}
