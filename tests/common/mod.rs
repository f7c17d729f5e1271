//! Shared fixtures: an in-memory `UserApi` with per-request delays and call counters.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Once;
use std::time::Duration;

use parking_lot::Mutex;
use rquery::client::BoxFuture;
use rquery::{FetchError, Page, UserApi, UserSummary};

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn user(id: &str, name: &str) -> UserSummary {
    UserSummary::new(
        id,
        name,
        format!("{}@x.com", name.to_lowercase()),
        "2023-01-01",
    )
}

#[derive(Default)]
pub struct FakeApi {
    pages: Mutex<HashMap<u32, Result<Page, FetchError>>>,
    page_delays: Mutex<HashMap<u32, Duration>>,
    page_calls: Mutex<HashMap<u32, usize>>,
    users: Mutex<HashMap<String, UserSummary>>,
    user_calls: Mutex<HashMap<String, usize>>,
    user_delay: Mutex<Duration>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: u32, result: Result<Page, FetchError>) -> Self {
        self.set_page(page, result);
        self
    }

    pub fn with_page_delay(self, page: u32, delay: Duration) -> Self {
        self.page_delays.lock().insert(page, delay);
        self
    }

    pub fn with_user(self, user: UserSummary) -> Self {
        self.users.lock().insert(user.id.clone(), user);
        self
    }

    pub fn with_user_delay(self, delay: Duration) -> Self {
        *self.user_delay.lock() = delay;
        self
    }

    /// Replaces what the next request for `page` returns.
    pub fn set_page(&self, page: u32, result: Result<Page, FetchError>) {
        self.pages.lock().insert(page, result);
    }

    pub fn page_calls(&self, page: u32) -> usize {
        self.page_calls.lock().get(&page).copied().unwrap_or(0)
    }

    pub fn user_calls(&self, id: &str) -> usize {
        self.user_calls.lock().get(id).copied().unwrap_or(0)
    }
}

impl UserApi for FakeApi {
    fn fetch_user_page(&self, page: u32) -> BoxFuture<'_, Result<Page, FetchError>> {
        *self.page_calls.lock().entry(page).or_default() += 1;
        let delay = self
            .page_delays
            .lock()
            .get(&page)
            .copied()
            .unwrap_or(Duration::from_millis(20));
        let result = self
            .pages
            .lock()
            .get(&page)
            .cloned()
            .unwrap_or(Err(FetchError::Server { status: 404 }));

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            result
        })
    }

    fn fetch_user_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<UserSummary, FetchError>> {
        *self.user_calls.lock().entry(id.to_owned()).or_default() += 1;
        let delay = *self.user_delay.lock();
        let result = self
            .users
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { id: id.to_owned() });

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            result
        })
    }
}
