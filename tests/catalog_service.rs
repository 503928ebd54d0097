mod support;

use std::sync::atomic::Ordering;

use patternbook::application::catalog::CatalogError;
use patternbook::domain::locale::Locale;
use support::Harness;

#[tokio::test]
async fn home_lists_only_categories_with_published_patterns() {
    let harness = Harness::new();
    let creational = harness.seed_category("creational", "创建型", "Creational").await;
    let structural = harness.seed_category("structural", "结构型", "Structural").await;
    harness
        .seed_pattern(&creational, "singleton", "单例", "Singleton", true)
        .await;
    harness
        .seed_pattern(&creational, "draft", "草稿", "Draft", false)
        .await;
    harness
        .seed_pattern(&structural, "adapter", "适配器", "Adapter", false)
        .await;

    let home = harness.catalog.home(Locale::En).await.expect("home");

    assert_eq!(home.len(), 1);
    assert_eq!(home[0].slug, "creational");
    assert_eq!(home[0].name, "Creational");
    let slugs: Vec<_> = home[0].patterns.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["singleton"]);

    let index = harness.catalog.pattern_index(Locale::En).await.expect("index");
    assert_eq!(index.len(), 2);
    assert!(index[1].patterns.is_empty());
}

#[tokio::test]
async fn names_fall_back_to_the_default_locale() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "").await;
    harness
        .seed_pattern(&category, "singleton", "单例", "", true)
        .await;

    let home = harness.catalog.home(Locale::En).await.expect("home");
    assert_eq!(home[0].name, "创建型");
    assert_eq!(home[0].patterns[0].name, "单例");
}

#[tokio::test]
async fn listings_are_served_from_cache_until_a_mutation() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    let pattern = harness
        .seed_pattern(&category, "singleton", "单例", "Singleton", true)
        .await;

    harness.catalog.home(Locale::Zh).await.expect("home");
    harness.catalog.home(Locale::Zh).await.expect("home");
    assert_eq!(harness.repos.list_pattern_calls.load(Ordering::SeqCst), 1);

    harness.patterns.delete(pattern.id).await.expect("delete");

    let home = harness.catalog.home(Locale::Zh).await.expect("home");
    assert!(home.is_empty());
    assert_eq!(harness.repos.list_pattern_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn detail_renders_body_outline_and_related() {
    let harness = Harness::new();
    let category = harness.seed_category("behavioral", "行为型", "Behavioral").await;
    let observer = harness
        .seed_pattern(&category, "observer", "观察者", "Observer", true)
        .await;
    harness
        .seed_pattern(&category, "strategy", "策略", "Strategy", true)
        .await;
    harness
        .seed_pattern(&category, "hidden", "隐藏", "Hidden", false)
        .await;
    harness
        .write_body(
            &observer,
            Locale::En,
            "## Intent\n\n```mermaid\ngraph TD\nA-->B\n```\n",
        )
        .await;

    let detail = harness
        .catalog
        .pattern_detail("observer", Locale::En)
        .await
        .expect("detail");

    assert_eq!(detail.name, "Observer");
    assert_eq!(detail.category.slug, "behavioral");
    assert!(detail.body.contains_mermaid);
    assert!(!detail.body.fallback);
    assert_eq!(detail.body.served_locale, Some(Locale::En));
    assert_eq!(detail.headings.len(), 1);
    assert_eq!(detail.headings[0].anchor, "intent");
    let related: Vec<_> = detail.related.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(related, vec!["strategy"]);
}

#[tokio::test]
async fn detail_marks_untranslated_bodies() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    let pattern = harness
        .seed_pattern(&category, "builder", "生成器", "Builder", true)
        .await;
    harness.write_body(&pattern, Locale::Zh, "## 意图\n").await;

    let detail = harness
        .catalog
        .pattern_detail("builder", Locale::En)
        .await
        .expect("detail");

    assert!(detail.body.fallback);
    assert_eq!(detail.body.served_locale, Some(Locale::Zh));
    assert!(detail.body.html.contains("意图"));
}

#[tokio::test]
async fn detail_without_any_body_is_missing_not_fallback() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    harness
        .seed_pattern(&category, "prototype", "原型", "Prototype", true)
        .await;

    let detail = harness
        .catalog
        .pattern_detail("prototype", Locale::En)
        .await
        .expect("detail");

    assert!(detail.body.missing);
    assert!(!detail.body.fallback);
    assert_eq!(detail.body.served_locale, None);
}

#[tokio::test]
async fn unpublished_and_unknown_slugs_are_not_found() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    harness
        .seed_pattern(&category, "draft", "草稿", "Draft", false)
        .await;

    for slug in ["draft", "missing"] {
        let err = harness
            .catalog
            .pattern_detail(slug, Locale::Zh)
            .await
            .expect_err("not found");
        assert!(matches!(err, CatalogError::NotFound), "{slug}");
    }
}

#[tokio::test]
async fn content_edit_is_visible_on_the_next_detail_read() {
    let harness = Harness::new();
    let category = harness.seed_category("creational", "创建型", "Creational").await;
    let pattern = harness
        .seed_pattern(&category, "factory", "工厂", "Factory", true)
        .await;
    harness.write_body(&pattern, Locale::Zh, "旧版本").await;

    let before = harness
        .catalog
        .pattern_detail("factory", Locale::Zh)
        .await
        .expect("detail");
    assert!(before.body.html.contains("旧版本"));

    harness
        .patterns
        .save_content(pattern.id, Locale::Zh, "新版本")
        .await
        .expect("save");

    let after = harness
        .catalog
        .pattern_detail("factory", Locale::Zh)
        .await
        .expect("detail");
    assert!(after.body.html.contains("新版本"));
}

#[tokio::test]
async fn category_lookup_by_slug() {
    let harness = Harness::new();
    harness.seed_category("creational", "创建型", "Creational").await;

    assert!(harness.catalog.category_exists("creational").await.expect("lookup"));
    assert!(!harness.catalog.category_exists("unknown").await.expect("lookup"));
}
