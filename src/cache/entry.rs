//! Cache entry state.

use std::time::Duration;

use tokio::time::Instant;

use crate::application::error::ApiError;

/// Lifecycle of a cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// State of one cached read.
///
/// `Success` always carries data and a fetch time; `Error` always carries an
/// error. A failed refresh keeps whatever data an earlier success stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    status: QueryStatus,
    data: Option<T>,
    error: Option<ApiError>,
    fetched_at: Option<Instant>,
    stale_after: Option<Instant>,
    invalidated: bool,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            stale_after: None,
            invalidated: false,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn stale_after(&self) -> Option<Instant> {
        self.stale_after
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// True once a write has marked this entry stale and no newer fetch has replaced it.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Fresh entries are served without calling the loader.
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.status == QueryStatus::Success
            && !self.invalidated
            && self.stale_after.is_some_and(|deadline| now < deadline)
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        !self.is_fresh(now)
    }

    /// Consumes the entry: data on success, the error otherwise.
    ///
    /// Entries that never completed yield `None`.
    pub fn into_result(self) -> Option<Result<T, ApiError>> {
        match self.status {
            QueryStatus::Success => self.data.map(Ok),
            QueryStatus::Error => self.error.map(Err),
            QueryStatus::Idle | QueryStatus::Loading => None,
        }
    }

    pub(crate) fn begin_loading(&mut self) {
        self.status = QueryStatus::Loading;
    }

    pub(crate) fn resolve(&mut self, data: T, now: Instant, ttl: Duration) {
        self.status = QueryStatus::Success;
        self.data = Some(data);
        self.error = None;
        self.fetched_at = Some(now);
        self.stale_after = Some(now + ttl);
    }

    pub(crate) fn reject(&mut self, error: ApiError) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
    }

    pub(crate) fn set_invalidated(&mut self, invalidated: bool) {
        self.invalidated = invalidated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn success_is_fresh_until_ttl_elapses() {
        let mut entry = CacheEntry::default();
        let now = Instant::now();
        entry.resolve(7_u32, now, Duration::from_secs(30));

        assert_eq!(entry.status(), QueryStatus::Success);
        assert!(entry.is_fresh(now));
        assert!(entry.is_fresh(now + Duration::from_secs(29)));
        assert!(entry.is_stale(now + Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn reject_keeps_previous_data() {
        let mut entry = CacheEntry::default();
        let now = Instant::now();
        entry.resolve("first".to_string(), now, Duration::from_secs(1));
        entry.begin_loading();
        entry.reject(ApiError::network("connection reset"));

        assert_eq!(entry.status(), QueryStatus::Error);
        assert_eq!(entry.data().map(String::as_str), Some("first"));
        assert!(entry.error().is_some());
        assert!(entry.is_stale(now));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidated_entry_is_stale() {
        let mut entry = CacheEntry::default();
        let now = Instant::now();
        entry.resolve(1_u8, now, Duration::from_secs(60));
        entry.set_invalidated(true);

        assert!(entry.is_stale(now));
        assert!(matches!(entry.into_result(), Some(Ok(1))));
    }

    #[test]
    fn idle_entry_has_no_result() {
        let entry: CacheEntry<u8> = CacheEntry::default();
        assert!(entry.into_result().is_none());
    }
}
