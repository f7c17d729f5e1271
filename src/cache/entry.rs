//! Cache entry state and the typed snapshots handed to consumers.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::QueryKey;
use crate::error::FetchError;

/// Type-erased payload stored in the cache.
pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Never fetched.
    Idle,
    /// A fetch is in flight. Data from an earlier fetch may still be present.
    Loading,
    /// The last fetch succeeded.
    Success,
    /// The last fetch failed. Data from an earlier fetch may still be present.
    Error,
}

// What the cache actually stores per key.
#[derive(Debug, Clone)]
pub(crate) struct RawEntry {
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<AnyData>,
    pub(crate) error: Option<FetchError>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) invalidated: bool,
}

impl RawEntry {
    pub(crate) fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            invalidated: false,
        }
    }

    pub(crate) fn is_fresh(&self, max_age: Duration, now: Instant) -> bool {
        self.status == QueryStatus::Success
            && !self.invalidated
            && self
                .fetched_at
                .is_some_and(|at| now.saturating_duration_since(at) < max_age)
    }

    pub(crate) fn snapshot<T>(&self, key: &QueryKey) -> CacheEntry<T>
    where
        T: Send + Sync + 'static,
    {
        let data = match self.data.clone().map(|data| data.downcast::<T>()) {
            Some(Ok(data)) => Some(data),
            Some(Err(_)) => {
                debug!(
                    key = %key,
                    expected = std::any::type_name::<T>(),
                    "cached payload has a different type"
                );
                None
            }
            None => None,
        };

        CacheEntry {
            key: key.clone(),
            status: self.status,
            data,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            invalidated: self.invalidated,
        }
    }
}

/// A point-in-time copy of one cache entry.
///
/// Invariants: `Success` implies `data` and `fetched_at` are present;
/// `Error` implies `error` is present.
///
/// The one exception is reading a key as a different `T` than it was fetched
/// with. That is a caller error: the snapshot keeps its status but `data` is
/// `None`, and the mismatch is logged at `debug`.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<FetchError>,
    pub fetched_at: Option<Instant>,
    /// Set by [`QueryCache::invalidate`](super::QueryCache::invalidate) until
    /// the next fetch for this key starts.
    pub invalidated: bool,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            invalidated: self.invalidated,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    /// A request for this key is in flight.
    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Time since the last successful fetch.
    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    /// Would [`ensure_fresh`](super::QueryCache::ensure_fresh) serve this
    /// entry without a network call?
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.is_success() && !self.invalidated && self.age().is_some_and(|age| age < max_age)
    }

    /// Converts a settled entry into the caller-facing result.
    ///
    /// Entries that are not `Success` or `Error` (or hold data of another
    /// type) yield `None`.
    pub fn into_result(self) -> Option<Result<Arc<T>, FetchError>> {
        match self.status {
            QueryStatus::Success => self.data.map(Ok),
            QueryStatus::Error => self.error.map(Err),
            QueryStatus::Idle | QueryStatus::Loading => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(data: AnyData, fetched_at: Instant) -> RawEntry {
        RawEntry {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            fetched_at: Some(fetched_at),
            invalidated: false,
        }
    }

    #[test]
    fn snapshot_downcasts() {
        let raw = success(Arc::new(7u32), Instant::now());
        let key = QueryKey::users_page(1);

        let hit: CacheEntry<u32> = raw.snapshot(&key);
        assert_eq!(hit.data.as_deref(), Some(&7));

        let wrong: CacheEntry<String> = raw.snapshot(&key);
        assert!(wrong.data.is_none());
        assert!(wrong.into_result().is_none());
    }

    #[test]
    fn mismatched_type_keeps_status_without_data() {
        let raw = success(Arc::new(7u32), Instant::now());
        let wrong: CacheEntry<String> = raw.snapshot(&QueryKey::user("u1"));
        assert!(wrong.is_success());
        assert!(wrong.data.is_none());
        assert!(wrong.fetched_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn freshness_window() {
        let raw = success(Arc::new(()), Instant::now());
        let window = Duration::from_secs(60);
        assert!(raw.is_fresh(window, Instant::now()));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!raw.is_fresh(window, Instant::now()));
    }

    #[test]
    fn invalidated_is_never_fresh() {
        let mut raw = success(Arc::new(()), Instant::now());
        raw.invalidated = true;
        assert!(!raw.is_fresh(Duration::from_secs(600), Instant::now()));
    }

    #[test]
    fn idle_entries_have_no_result() {
        let entry: CacheEntry<()> = RawEntry::idle().snapshot(&QueryKey::user("u1"));
        assert!(entry.is_idle());
        assert!(entry.into_result().is_none());
    }
}
