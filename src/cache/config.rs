//! Cache configuration.
//!
//! Controls the in-process content cache via the `[cache]` section of
//! `patternbook.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_MAX_ENTRIES: usize = 1024;
const DEFAULT_LISTING_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_HEADINGS_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_DETAIL_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_PURGE_INTERVAL_SECONDS: u64 = 5 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every lookup runs its producer.
    pub enabled: bool,
    /// Maximum number of entries before least-recently-used eviction.
    pub max_entries: usize,
    /// TTL for home and pattern index listings.
    pub listing_ttl_seconds: u64,
    /// TTL for heading outlines.
    pub headings_ttl_seconds: u64,
    /// TTL for pattern detail pages, rendered bodies and related lists.
    pub detail_ttl_seconds: u64,
    /// Interval of the background task that drops expired entries.
    pub purge_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            listing_ttl_seconds: DEFAULT_LISTING_TTL_SECONDS,
            headings_ttl_seconds: DEFAULT_HEADINGS_TTL_SECONDS,
            detail_ttl_seconds: DEFAULT_DETAIL_TTL_SECONDS,
            purge_interval_seconds: DEFAULT_PURGE_INTERVAL_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries.get(),
            listing_ttl_seconds: settings.listing_ttl_seconds.get(),
            headings_ttl_seconds: settings.headings_ttl_seconds.get(),
            detail_ttl_seconds: settings.detail_ttl_seconds.get(),
            purge_interval_seconds: settings.purge_interval_seconds.get(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_seconds)
    }

    pub fn headings_ttl(&self) -> Duration {
        Duration::from_secs(self.headings_ttl_seconds)
    }

    pub fn detail_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_ttl_seconds)
    }

    /// Purge interval, never shorter than one second.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds.max(1))
    }
}
