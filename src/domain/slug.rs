//! Slug derivation for categories, patterns and heading anchors.
//!
//! ASCII slugification (`slug` crate) is combined with Chinese
//! transliteration (`pinyin` crate), so “单例模式” becomes `dan-li-mo-shi`.
//! Uniqueness checks are supplied by the caller to keep derivation pure.

use std::collections::HashSet;
use std::future::Future;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

use super::error::DomainError;

const MAX_SUFFIX_ATTEMPTS: usize = 32;
const MAX_SLUG_LEN: usize = 120;
const FALLBACK_ANCHOR: &str = "section";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(transliterate_to_ascii(input));
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Check an author-supplied slug: lowercase ASCII letters, digits and single
/// hyphens, not starting or ending with a hyphen.
pub fn validate_slug(slug: &str) -> Result<(), DomainError> {
    if slug.is_empty() {
        return Err(DomainError::validation("slug", "must not be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(DomainError::validation(
            "slug",
            format!("must be at most {MAX_SLUG_LEN} characters"),
        ));
    }
    let allowed = slug
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
    if !allowed || slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(DomainError::validation(
            "slug",
            "may only contain lowercase letters, digits and single hyphens",
        ));
    }
    Ok(())
}

/// Produce a slug that the async predicate reports as unused, suffixing
/// `-2`, `-3`, … on collisions.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

/// Hands out anchors that are unique within one document.
///
/// Repeated headings get `-2`, `-3`, … and a generated suffix never reuses an
/// anchor that a literal heading already claimed (`Usage`, `Usage 2`, `Usage`
/// yields `usage`, `usage-2`, `usage-3`).
#[derive(Default, Debug)]
pub struct AnchorSlugger {
    used: HashSet<String>,
}

impl AnchorSlugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_for(&mut self, heading: &str) -> String {
        let base = derive_slug(heading).unwrap_or_else(|_| FALLBACK_ANCHOR.to_string());

        if self.used.insert(base.clone()) {
            return base;
        }

        let mut attempt = 2usize;
        loop {
            let candidate = format!("{base}-{attempt}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            attempt += 1;
        }
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
    buffer.push(' ');
}
