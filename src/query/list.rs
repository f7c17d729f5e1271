//! Paginated user list, a view over the cache keyed by page number.
//!
//! The list publishes a [`ListState`] every time something the table shows
//! changes:
//!
//! | Situation                                   | `data`   | `is_loading` | `is_fetching` |
//! |---------------------------------------------|----------|--------------|---------------|
//! | first fetch for the page in flight          | `None`   | `true`       | `true`        |
//! | cached page, background refetch in flight   | `Some`   | `false`      | `true`        |
//! | fetch settled                               | `Some`   | `false`      | `false`       |
//! | fetch failed, nothing cached for the page   | `None`   | `false`      | `false`       |
//!
//! A failed refetch of a page that already has data keeps that data and
//! reports the error alongside it.
//!
//! Results are only published for the page currently requested: a response
//! for a page the user has already moved away from still lands in the cache
//! but never overwrites the list's state.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, QueryCache, QueryKey};
use crate::client::UserApi;
use crate::config::QueryConfig;
use crate::error::FetchError;
use crate::model::Page;

use super::Pagination;

/// What the table renders for the current page.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    /// The page this state describes (1-based; 0 before the first request).
    pub page: u32,
    pub data: Option<Arc<Page>>,
    /// No data for this page yet and a request is in flight.
    pub is_loading: bool,
    /// A request for this page is in flight.
    pub is_fetching: bool,
    /// `data` belongs to the previously shown page (`keep_previous_data`).
    pub is_previous_data: bool,
    pub error: Option<FetchError>,
}

impl ListState {
    /// Pagination for the shown data, once a page has been loaded.
    pub fn pagination(&self, page_size: u32) -> Option<Pagination> {
        self.data
            .as_ref()
            .map(|data| Pagination::new(data.total_count, self.page, page_size))
    }

    /// Text to show instead of the table, if any.
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(FetchError::user_message)
    }

    fn derive(
        page: u32,
        entry: &CacheEntry<Page>,
        pending: bool,
        previous: &ListState,
        keep_previous_data: bool,
    ) -> Self {
        let is_fetching = entry.is_fetching() || pending;
        let error = if entry.is_error() {
            entry.error.clone()
        } else {
            None
        };

        match &entry.data {
            Some(data) => Self {
                page,
                data: Some(Arc::clone(data)),
                is_loading: false,
                is_fetching,
                is_previous_data: false,
                error,
            },
            None if keep_previous_data && is_fetching && previous.data.is_some() => Self {
                page,
                data: previous.data.clone(),
                is_loading: false,
                is_fetching,
                is_previous_data: true,
                error: None,
            },
            None => Self {
                page,
                data: None,
                is_loading: is_fetching,
                is_fetching,
                is_previous_data: false,
                error,
            },
        }
    }
}

// The page the view currently wants. Guarded together with publication so
// every published state belongs to the latest request.
struct Desired {
    page: u32,
    generation: u64,
    mounted: bool,
    follower: Option<JoinHandle<()>>,
}

pub(crate) struct ListInner {
    cache: QueryCache,
    api: Arc<dyn UserApi>,
    config: QueryConfig,
    desired: Mutex<Desired>,
    state: watch::Sender<ListState>,
}

impl ListInner {
    fn key(page: u32) -> QueryKey {
        QueryKey::users_page(page)
    }

    pub(crate) async fn set_page(self: &Arc<Self>, page: u32) -> ListState {
        let page = page.max(1);
        let generation = {
            let mut desired = self.desired.lock();
            if !desired.mounted {
                return self.state.borrow().clone();
            }
            desired.page = page;
            desired.generation += 1;
            if let Some(follower) = desired.follower.take() {
                follower.abort();
            }
            desired.generation
        };

        let key = Self::key(page);
        let pending = !self
            .cache
            .read::<Page>(&key)
            .is_fresh(self.config.list_stale_time);
        self.sync(generation, pending);
        self.follow(key.clone(), generation);

        self.fetch(key, page, generation).await
    }

    pub(crate) async fn refetch(self: &Arc<Self>) -> ListState {
        let (page, generation) = {
            let desired = self.desired.lock();
            if !desired.mounted || desired.generation == 0 {
                return self.state.borrow().clone();
            }
            (desired.page, desired.generation)
        };

        let key = Self::key(page);
        self.cache.invalidate(&key);
        self.sync(generation, true);

        self.fetch(key, page, generation).await
    }

    async fn fetch(self: &Arc<Self>, key: QueryKey, page: u32, generation: u64) -> ListState {
        let api = Arc::clone(&self.api);
        let entry = self
            .cache
            .ensure_fresh(
                key,
                move || async move { api.fetch_user_page(page).await },
                self.config.list_stale_time,
            )
            .await;

        if entry.is_error() {
            if let Some(err) = &entry.error {
                warn!(page, error = %err, "user page fetch failed");
            }
        }
        if !self.sync(generation, false) {
            debug!(page, "discarding result for a page no longer shown");
        }
        self.state.borrow().clone()
    }

    // Re-derives the published state from the cache. Returns `false` when
    // `generation` is no longer the current request (or the view is gone).
    fn sync(&self, generation: u64, pending: bool) -> bool {
        let desired = self.desired.lock();
        if !desired.mounted || desired.generation != generation {
            return false;
        }

        let entry = self.cache.read::<Page>(&Self::key(desired.page));
        self.state.send_modify(|state| {
            *state = ListState::derive(
                desired.page,
                &entry,
                pending,
                state,
                self.config.keep_previous_data,
            );
        });
        true
    }

    // Mirrors transitions of `key` started elsewhere (e.g. another consumer
    // refetching the same page) into the list state.
    fn follow(self: &Arc<Self>, key: QueryKey, generation: u64) {
        let mut subscription = self.cache.subscribe::<Page>(key);
        let inner: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while subscription.changed().await.is_some() {
                let Some(inner) = inner.upgrade() else { break };
                if !inner.sync(generation, false) {
                    break;
                }
            }
        });

        let mut desired = self.desired.lock();
        if desired.generation == generation && desired.mounted {
            desired.follower = Some(handle);
        } else {
            handle.abort();
        }
    }

    fn unmount(&self) {
        let mut desired = self.desired.lock();
        desired.mounted = false;
        if let Some(follower) = desired.follower.take() {
            follower.abort();
        }
    }
}

/// The paginated user list.
///
/// Dropping the query (or calling [`unmount`](Self::unmount)) stops all
/// further state publication; fetches already in flight still fill the cache.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rquery::{ClientConfig, HttpUserClient, QueryCache, QueryConfig, UserListQuery};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let api = Arc::new(HttpUserClient::new(ClientConfig::from_env()?)?);
/// let list = UserListQuery::new(QueryCache::default(), api, QueryConfig::default());
///
/// let state = list.set_page(1).await;
/// if let Some(page) = &state.data {
///     println!("{} of {} users", page.len(), page.total_count);
/// }
/// # Ok(())
/// # }
/// ```
pub struct UserListQuery {
    inner: Arc<ListInner>,
}

impl UserListQuery {
    /// Creates the query. Nothing is fetched until the first
    /// [`set_page`](Self::set_page).
    pub fn new(cache: QueryCache, api: Arc<dyn UserApi>, config: QueryConfig) -> Self {
        let (state, _rx) = watch::channel(ListState::default());
        Self {
            inner: Arc::new(ListInner {
                cache,
                api,
                config,
                desired: Mutex::new(Desired {
                    page: 0,
                    generation: 0,
                    mounted: true,
                    follower: None,
                }),
                state,
            }),
        }
    }

    /// Shows `page` (0 is treated as 1), fetching it unless the cached copy
    /// is fresh. Resolves once the request settles and returns the state at
    /// that point, which belongs to a later page if the user moved on.
    pub async fn set_page(&self, page: u32) -> ListState {
        self.inner.set_page(page).await
    }

    /// Refetches the current page in the background, keeping its data visible.
    pub async fn refetch(&self) -> ListState {
        self.inner.refetch().await
    }

    /// The latest published state.
    pub fn state(&self) -> ListState {
        self.inner.state.borrow().clone()
    }

    /// Observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.inner.state.subscribe()
    }

    /// The page most recently requested (0 before the first request).
    pub fn current_page(&self) -> u32 {
        self.inner.desired.lock().page
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Stops publishing state. Later calls return the last published state.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    pub(crate) fn shared(&self) -> Arc<ListInner> {
        Arc::clone(&self.inner)
    }
}

impl Drop for UserListQuery {
    fn drop(&mut self) {
        self.inner.unmount();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::cache::QueryStatus;
    use crate::model::UserSummary;

    fn entry(status: QueryStatus, data: Option<Page>, error: Option<FetchError>) -> CacheEntry<Page> {
        CacheEntry {
            key: QueryKey::users_page(1),
            status,
            data: data.map(Arc::new),
            error,
            fetched_at: Some(Instant::now()),
            invalidated: false,
        }
    }

    fn page() -> Page {
        Page::new(vec![UserSummary::new("u1", "Ana", "ana@x.com", "2023-01-01")], 1)
    }

    #[test]
    fn first_load() {
        let state = ListState::derive(
            1,
            &entry(QueryStatus::Loading, None, None),
            false,
            &ListState::default(),
            false,
        );
        assert!(state.is_loading && state.is_fetching);
        assert!(state.data.is_none());
    }

    #[test]
    fn revalidating_keeps_data() {
        let state = ListState::derive(
            1,
            &entry(QueryStatus::Loading, Some(page()), None),
            false,
            &ListState::default(),
            false,
        );
        assert!(!state.is_loading);
        assert!(state.is_fetching);
        assert_eq!(state.data.unwrap().len(), 1);
    }

    #[test]
    fn error_without_data() {
        let state = ListState::derive(
            1,
            &entry(QueryStatus::Error, None, Some(FetchError::Server { status: 500 })),
            false,
            &ListState::default(),
            false,
        );
        assert!(!state.is_loading && !state.is_fetching);
        assert!(state.data.is_none());
        assert_eq!(
            state.error_message(),
            Some("There was a problem loading the users table")
        );
    }

    #[test]
    fn error_with_stale_data_keeps_both() {
        let state = ListState::derive(
            1,
            &entry(
                QueryStatus::Error,
                Some(page()),
                Some(FetchError::Server { status: 502 }),
            ),
            false,
            &ListState::default(),
            false,
        );
        assert!(state.data.is_some());
        assert!(matches!(state.error, Some(FetchError::Server { status: 502 })));
    }

    #[test]
    fn previous_data_only_when_enabled() {
        let shown = ListState {
            page: 1,
            data: Some(Arc::new(page())),
            ..ListState::default()
        };
        let loading = entry(QueryStatus::Loading, None, None);

        let kept = ListState::derive(2, &loading, false, &shown, true);
        assert!(kept.is_previous_data);
        assert!(!kept.is_loading && kept.is_fetching);
        assert_eq!(kept.page, 2);

        let blank = ListState::derive(2, &loading, false, &shown, false);
        assert!(blank.data.is_none());
        assert!(blank.is_loading);
    }

    #[test]
    fn pending_marks_fetching_before_the_cache_does() {
        let idle = CacheEntry {
            status: QueryStatus::Idle,
            fetched_at: None,
            ..entry(QueryStatus::Idle, None, None)
        };
        let state = ListState::derive(1, &idle, true, &ListState::default(), false);
        assert!(state.is_loading && state.is_fetching);
    }

    #[test]
    fn pagination_from_data() {
        let state = ListState {
            page: 1,
            data: Some(Arc::new(page())),
            ..ListState::default()
        };
        assert_eq!(state.pagination(10).unwrap().total_pages(), 1);
        assert!(ListState::default().pagination(10).is_none());
    }
}
