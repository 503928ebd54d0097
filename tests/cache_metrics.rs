use std::collections::HashSet;
use std::convert::Infallible;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use patternbook::cache::{
    CacheConfig, CacheKey, CacheTag, ContentCache, METRIC_CACHE_EVICT_TOTAL,
    METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_INVALIDATED_TOTAL, METRIC_CACHE_MISS_TOTAL,
};

async fn fill(cache: &ContentCache, key: &str) {
    let _: Result<u8, Infallible> = cache
        .remember_for(
            CacheKey::new(key),
            Duration::from_secs(60),
            [CacheTag::PatternList],
            || async { Ok(1) },
        )
        .await;
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = ContentCache::new(CacheConfig {
        max_entries: 1,
        ..Default::default()
    });

    fill(&cache, "first").await; // miss
    fill(&cache, "first").await; // hit
    fill(&cache, "second").await; // miss, evicts "first"
    cache.invalidate(&[CacheTag::PatternList]);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [
        METRIC_CACHE_HIT_TOTAL,
        METRIC_CACHE_MISS_TOTAL,
        METRIC_CACHE_EVICT_TOTAL,
        METRIC_CACHE_INVALIDATED_TOTAL,
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
