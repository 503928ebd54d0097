mod support;

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use patternbook::application::admin::{AdminError, CategoryInput, PatternInput};
use patternbook::cache::{CacheKey, CacheTag, deps};
use patternbook::domain::entities::PatternRecord;
use patternbook::domain::locale::Locale;
use support::{Harness, text};
use uuid::Uuid;

fn category_input(zh: &str, en: &str) -> CategoryInput {
    CategoryInput {
        name: text(zh, en),
        ..Default::default()
    }
}

fn pattern_input(category_id: Uuid, zh: &str, en: &str) -> PatternInput {
    PatternInput {
        category_id: Some(category_id),
        name: text(zh, en),
        published: true,
        ..Default::default()
    }
}

fn expect_field(err: AdminError, field: &str) {
    match err {
        AdminError::Validation(errors) => {
            assert!(errors.get(field).is_some(), "no error on {field}: {errors:?}")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn category_slug_is_derived_from_the_default_locale_name() {
    let harness = Harness::new();

    let created = harness
        .categories
        .create(category_input("创建型", "Creational"))
        .await
        .expect("create");
    assert_eq!(created.slug, "chuang-jian-xing");

    let second = harness
        .categories
        .create(category_input("创建型", "Creational again"))
        .await
        .expect("create");
    assert_eq!(second.slug, "chuang-jian-xing-2");
}

#[tokio::test]
async fn default_locale_name_is_required_and_nothing_is_persisted() {
    let harness = Harness::new();

    let err = harness
        .categories
        .create(category_input("", "Only English"))
        .await
        .expect_err("missing zh name");
    expect_field(err, "name");

    assert!(harness.categories.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn invalid_fields_are_reported_together() {
    let harness = Harness::new();

    let err = harness
        .categories
        .create(CategoryInput {
            slug: Some("Not A Slug".to_string()),
            name: text("", ""),
            description: text(&"长".repeat(2001), ""),
            sort_order: -1,
        })
        .await
        .expect_err("invalid");

    match err {
        AdminError::Validation(errors) => {
            let fields: Vec<_> = errors.fields().collect();
            assert_eq!(fields, vec!["description", "name", "slug", "sort_order"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_explicit_slug_is_a_slug_error() {
    let harness = Harness::new();
    harness.seed_category("creational", "创建型", "Creational").await;

    let err = harness
        .categories
        .create(CategoryInput {
            slug: Some("creational".to_string()),
            ..category_input("另一个", "Another")
        })
        .await
        .expect_err("duplicate");
    expect_field(err, "slug");
}

#[tokio::test]
async fn update_without_slug_keeps_the_existing_one() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;

    let updated = harness
        .categories
        .update(category.id, category_input("创建型模式", "Creational patterns"))
        .await
        .expect("update");

    assert_eq!(updated.slug, "creational");
    assert_eq!(updated.name.resolve(Locale::En, Locale::Zh), "Creational patterns");
}

#[tokio::test]
async fn category_with_patterns_cannot_be_deleted() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    harness
        .seed_pattern(&category, "singleton", "单例", "Singleton", false)
        .await;

    let err = harness
        .categories
        .delete(category.id)
        .await
        .expect_err("in use");
    assert!(matches!(err, AdminError::CategoryInUse { count: 1 }));
    assert!(harness.categories.get(category.id).await.is_ok());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let harness = Harness::new();

    assert!(matches!(
        harness.categories.delete(Uuid::new_v4()).await,
        Err(AdminError::NotFound)
    ));
    assert!(matches!(
        harness.patterns.get(Uuid::new_v4()).await,
        Err(AdminError::NotFound)
    ));
}

#[tokio::test]
async fn pattern_requires_an_existing_category() {
    let harness = Harness::new();

    let err = harness
        .patterns
        .create(PatternInput {
            category_id: None,
            ..pattern_input(Uuid::nil(), "单例", "Singleton")
        })
        .await
        .expect_err("missing category");
    expect_field(err, "category_id");

    let err = harness
        .patterns
        .create(pattern_input(Uuid::new_v4(), "单例", "Singleton"))
        .await
        .expect_err("unknown category");
    assert!(matches!(err, AdminError::UnknownCategory));
}

#[tokio::test]
async fn pattern_delete_removes_body_files() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    let pattern = harness
        .patterns
        .create(pattern_input(category.id, "单例", "Singleton"))
        .await
        .expect("create");
    assert_eq!(pattern.slug, "dan-li");

    let saved = harness
        .patterns
        .save_content(pattern.id, Locale::En, "# Singleton\n")
        .await
        .expect("save");
    let path = harness
        .content_dir
        .path()
        .join(saved.content_path(Locale::En).expect("path"));
    assert!(path.exists());

    harness.patterns.delete(pattern.id).await.expect("delete");
    assert!(!path.exists());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    let pattern = harness
        .seed_pattern(&category, "singleton", "单例", "Singleton", true)
        .await;

    let err = harness
        .patterns
        .save_content(pattern.id, Locale::Zh, &"x".repeat(1024 * 1024 + 1))
        .await
        .expect_err("too large");
    expect_field(err, "markdown");
    assert_eq!(
        harness.patterns.read_content(pattern.id, Locale::Zh).await.expect("read"),
        ""
    );
}

/// A cache entry under a key no invalidation routine knows about still drops
/// when the pattern it read from changes.
#[tokio::test]
async fn entries_under_unlisted_keys_follow_their_pattern() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    let pattern = harness
        .seed_pattern(&category, "singleton", "单例", "Singleton", true)
        .await;

    let produced = Arc::new(AtomicUsize::new(0));
    let read_name = |id: Uuid| {
        let harness = &harness;
        let produced = Arc::clone(&produced);
        async move {
            harness
                .cache
                .remember_for(
                    CacheKey::new(format!("sidebar-widget:{id}")),
                    Duration::from_secs(3600),
                    std::iter::empty::<CacheTag>(),
                    || async move {
                        produced.fetch_add(1, Ordering::SeqCst);
                        deps::record(CacheTag::Pattern(id));
                        let record: Option<PatternRecord> = harness.repos.pattern(id);
                        Ok::<_, Infallible>(
                            record
                                .map(|p| p.name.resolve(Locale::En, Locale::Zh).to_string())
                                .unwrap_or_default(),
                        )
                    },
                )
                .await
                .unwrap_or_else(|never| match never {})
        }
    };

    assert_eq!(read_name(pattern.id).await, "Singleton");
    assert_eq!(read_name(pattern.id).await, "Singleton");
    assert_eq!(produced.load(Ordering::SeqCst), 1);

    harness
        .patterns
        .update(pattern.id, pattern_input(category.id, "单例", "Singleton (renamed)"))
        .await
        .expect("update");

    assert_eq!(read_name(pattern.id).await, "Singleton (renamed)");
    assert_eq!(produced.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn moving_a_pattern_refreshes_both_category_listings() {
    let harness = Harness::new();
    let creational = harness.seed_category("creational", "创建型", "Creational").await;
    let structural = harness.seed_category("structural", "结构型", "Structural").await;
    let pattern = harness
        .seed_pattern(&creational, "singleton", "单例", "Singleton", true)
        .await;

    let before = harness.catalog.pattern_index(Locale::Zh).await.expect("index");
    assert_eq!(before[0].patterns.len(), 1);

    harness
        .patterns
        .update(pattern.id, pattern_input(structural.id, "单例", "Singleton"))
        .await
        .expect("move");

    let after = harness.catalog.pattern_index(Locale::Zh).await.expect("index");
    assert!(after[0].patterns.is_empty());
    assert_eq!(after[1].patterns.len(), 1);
}
