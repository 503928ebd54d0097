//! Dependency collector for tag-based invalidation.
//!
//! Uses `tokio::task_local!` so services can record which content they read
//! without threading a collector through every call. `ContentCache` scopes a
//! collector around each producer and registers the recorded tags with the
//! produced entry.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::keys::CacheTag;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::deps";

type Collector = Arc<Mutex<HashSet<CacheTag>>>;

tokio::task_local! {
    static DEPS: Collector;
}

/// Record a content dependency (called from the service layer).
///
/// If no collector is active, the call is silently ignored.
///
/// ```ignore
/// crate::cache::deps::record(CacheTag::Pattern(pattern.id));
/// ```
pub fn record(tag: CacheTag) {
    let _ = DEPS.try_with(|deps| {
        mutex_lock(deps, SOURCE, "record").insert(tag);
    });
}

/// Record several dependencies at once.
pub fn record_all<I>(tags: I)
where
    I: IntoIterator<Item = CacheTag>,
{
    let _ = DEPS.try_with(|deps| {
        mutex_lock(deps, SOURCE, "record_all").extend(tags);
    });
}

/// Run a future with a fresh collector and return its output together with
/// every tag recorded while it ran.
///
/// ```ignore
/// let (value, tags) = deps::with_collector(async { load().await }).await;
/// ```
pub async fn with_collector<F, R>(f: F) -> (R, HashSet<CacheTag>)
where
    F: std::future::Future<Output = R>,
{
    let collector: Collector = Arc::new(Mutex::new(HashSet::new()));
    let result = DEPS.scope(Arc::clone(&collector), f).await;
    let collected = std::mem::take(&mut *mutex_lock(&collector, SOURCE, "with_collector"));
    (result, collected)
}
