//! Hover prefetching and the detail read it speeds up.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::cache::{CacheEntry, QueryCache, QueryKey};
use crate::client::UserApi;
use crate::config::QueryConfig;
use crate::error::FetchError;
use crate::model::UserSummary;

/// Warms `("user", id)` entries ahead of navigation to a detail view.
///
/// Both [`prefetch`](Self::prefetch) and [`fetch_user`](Self::fetch_user) go
/// through the same key and freshness window, so a detail view opened within
/// the window after a successful prefetch is served straight from the cache.
#[derive(Clone)]
pub struct Prefetcher {
    cache: QueryCache,
    api: Arc<dyn UserApi>,
    stale_time: Duration,
}

impl Prefetcher {
    pub fn new(cache: QueryCache, api: Arc<dyn UserApi>, config: &QueryConfig) -> Self {
        Self {
            cache,
            api,
            stale_time: config.user_stale_time,
        }
    }

    /// The freshness window applied to single-user entries.
    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// Starts warming the cache for `user_id` and returns immediately.
    ///
    /// Repeated calls within the freshness window issue no further requests.
    /// Failures are logged at `debug` and otherwise dropped. Outside a Tokio
    /// runtime this is a no-op.
    pub fn prefetch(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let Ok(runtime) = Handle::try_current() else {
            debug!(user_id = %user_id, "no async runtime; prefetch skipped");
            return;
        };

        let this = self.clone();
        runtime.spawn(async move {
            match this.ensure(&user_id).await.into_result() {
                Some(Err(e)) => debug!(user_id = %user_id, error = %e, "prefetch failed"),
                _ => trace!(user_id = %user_id, "prefetch settled"),
            }
        });
    }

    /// Reads a user for the detail view, fetching only when the cached copy
    /// is missing or older than the freshness window.
    pub async fn fetch_user(&self, user_id: &str) -> Result<Arc<UserSummary>, FetchError> {
        self.ensure(user_id).await.into_result().unwrap_or_else(|| {
            Err(FetchError::network(io::Error::new(
                io::ErrorKind::Interrupted,
                "user entry was dropped before the fetch settled",
            )))
        })
    }

    /// The cached state of `user_id` without fetching.
    pub fn cached(&self, user_id: &str) -> CacheEntry<UserSummary> {
        self.cache.read(&QueryKey::user(user_id))
    }

    async fn ensure(&self, user_id: &str) -> CacheEntry<UserSummary> {
        let api = Arc::clone(&self.api);
        let id = user_id.to_owned();
        self.cache
            .ensure_fresh(
                QueryKey::user(user_id),
                move || async move { api.fetch_user_by_id(&id).await },
                self.stale_time,
            )
            .await
    }
}
