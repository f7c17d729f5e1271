//! The user list page: turns rendering events into query commands.
//!
//! The rendering collaborator (table, pagination control, row links) never
//! talks to the cache. It forwards [`PageEvent`]s to [`UserListPage::handle`]
//! and renders whatever [`UserListPage::view`] returns.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::QueryCache;
use crate::client::UserApi;
use crate::config::QueryConfig;
use crate::error::FetchError;
use crate::model::UserSummary;
use crate::query::{ListState, Pagination, Prefetcher, UserListQuery};

/// Something the user did on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The pagination control asked for a page.
    PageSelected(u32),
    /// The pointer entered a row's user link.
    RowHovered { user_id: String },
}

/// Everything the rendering collaborator needs for one frame.
#[derive(Debug, Clone)]
pub struct PageView {
    pub state: ListState,
    /// `None` until a page of data is available.
    pub pagination: Option<Pagination>,
}

/// The user list page: a paginated list plus hover prefetching.
pub struct UserListPage {
    list: UserListQuery,
    prefetcher: Prefetcher,
}

impl UserListPage {
    pub fn new(cache: QueryCache, api: Arc<dyn UserApi>, config: QueryConfig) -> Self {
        let prefetcher = Prefetcher::new(cache.clone(), Arc::clone(&api), &config);
        Self {
            list: UserListQuery::new(cache, api, config),
            prefetcher,
        }
    }

    /// Shows page 1.
    pub fn open(&self) -> Option<JoinHandle<ListState>> {
        self.handle(PageEvent::PageSelected(1))
    }

    /// Applies one event.
    ///
    /// Page selections outside the known page range are ignored; page 1 and
    /// the current page are always accepted so a failed load can be retried.
    /// Returns the spawned page load, if one was started.
    pub fn handle(&self, event: PageEvent) -> Option<JoinHandle<ListState>> {
        match event {
            PageEvent::PageSelected(page) => {
                if !self.accepts_page(page) {
                    debug!(page, "ignoring out-of-range page selection");
                    return None;
                }
                let Ok(runtime) = Handle::try_current() else {
                    debug!(page, "no async runtime; page selection dropped");
                    return None;
                };
                let list = self.list.shared();
                Some(runtime.spawn(async move { list.set_page(page).await }))
            }
            PageEvent::RowHovered { user_id } => {
                self.prefetcher.prefetch(user_id);
                None
            }
        }
    }

    /// The current frame.
    pub fn view(&self) -> PageView {
        let state = self.list.state();
        let pagination = state.pagination(self.list.config().page_size);
        PageView { state, pagination }
    }

    /// Observes list state changes.
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.list.subscribe()
    }

    /// Loads the user a row links to, as the detail view does after
    /// navigation. Served from the cache when a prefetch already warmed it.
    pub async fn open_user(&self, user_id: &str) -> Result<Arc<UserSummary>, FetchError> {
        self.prefetcher.fetch_user(user_id).await
    }

    pub fn list(&self) -> &UserListQuery {
        &self.list
    }

    pub fn prefetcher(&self) -> &Prefetcher {
        &self.prefetcher
    }

    fn accepts_page(&self, page: u32) -> bool {
        if page == 0 {
            return false;
        }
        if page == 1 || page == self.list.current_page() {
            return true;
        }
        self.view()
            .pagination
            .is_some_and(|pagination| pagination.contains(page))
    }
}
