//! Cache configuration.
//!
//! Freshness windows, the LRU bound and the loader retry budget, read from the
//! `[cache]` section of `patientdesk.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_TTL_MS: u64 = 60_000;
const DEFAULT_SUMMARY_TTL_MS: u64 = 5 * 60 * 1000;
const DEFAULT_MAX_ENTRIES: usize = 256;
const DEFAULT_RETRY_ATTEMPTS: u32 = 1;

/// Cache configuration from `patientdesk.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window (ms) for patient lists, records and notes.
    pub default_ttl_ms: u64,
    /// Freshness window (ms) for generated summaries.
    pub summary_ttl_ms: u64,
    /// Maximum entries kept per resource cache before LRU eviction.
    pub max_entries: usize,
    /// Automatic retries for transient loader failures.
    pub retry_attempts: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: DEFAULT_TTL_MS,
            summary_ttl_ms: DEFAULT_SUMMARY_TTL_MS,
            max_entries: DEFAULT_MAX_ENTRIES,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            default_ttl_ms: settings.default_ttl_ms,
            summary_ttl_ms: settings.summary_ttl_ms,
            max_entries: settings.max_entries.get(),
            retry_attempts: settings.retry_attempts,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn summary_ttl(&self) -> Duration {
        Duration::from_millis(self.summary_ttl_ms)
    }

    /// Returns the entry bound as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
