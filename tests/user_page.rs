mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeApi, init_tracing, user};
use rquery::{FetchError, Page, PageEvent, QueryCache, QueryConfig, UserListPage};

fn page_of(first: &str, total: u64) -> Page {
    Page::new(vec![user(first, "Ana")], total)
}

fn setup(api: FakeApi) -> (Arc<FakeApi>, UserListPage) {
    init_tracing();
    let api = Arc::new(api);
    let page = UserListPage::new(QueryCache::default(), api.clone(), QueryConfig::default());
    (api, page)
}

fn hover(id: &str) -> PageEvent {
    PageEvent::RowHovered {
        user_id: id.to_owned(),
    }
}

#[tokio::test(start_paused = true)]
async fn open_loads_first_page() {
    let (_api, page) = setup(FakeApi::new().with_page(1, Ok(page_of("u1", 1))));

    let state = page.open().expect("page load").await.expect("load task");
    assert!(state.data.is_some());

    let view = page.view();
    let pagination = view.pagination.expect("pagination");
    assert_eq!(pagination.total_pages(), 1);
    assert_eq!(pagination.row_range(), Some((1, 1)));
    assert!(!view.state.is_loading && !view.state.is_fetching);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_pages_are_ignored() {
    let (api, page) = setup(
        FakeApi::new()
            .with_page(1, Ok(page_of("u1", 25)))
            .with_page(3, Ok(page_of("u21", 25))),
    );

    assert!(page.handle(PageEvent::PageSelected(2)).is_none());
    page.open().expect("page load").await.expect("load task");

    assert!(page.handle(PageEvent::PageSelected(0)).is_none());
    assert!(page.handle(PageEvent::PageSelected(4)).is_none());

    let state = page
        .handle(PageEvent::PageSelected(3))
        .expect("page 3 load")
        .await
        .expect("load task");
    assert_eq!(state.page, 3);
    assert_eq!(page.view().pagination.expect("pagination").row_range(), Some((21, 25)));
    assert_eq!(api.page_calls(4), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_hovers_fetch_once() {
    let (api, page) = setup(
        FakeApi::new()
            .with_user(user("u1", "Ana"))
            .with_user_delay(Duration::from_millis(50)),
    );

    for _ in 0..5 {
        assert!(page.handle(hover("u1")).is_none());
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(api.user_calls("u1"), 1);
    assert!(page.prefetcher().cached("u1").is_success());

    let opened = page.open_user("u1").await.expect("cached user");
    assert_eq!(opened.name, "Ana");
    assert_eq!(api.user_calls("u1"), 1);
}

#[tokio::test(start_paused = true)]
async fn opening_during_prefetch_joins_it() {
    let (api, page) = setup(
        FakeApi::new()
            .with_user(user("u1", "Ana"))
            .with_user_delay(Duration::from_millis(50)),
    );

    page.handle(hover("u1"));
    tokio::task::yield_now().await;
    let opened = page.open_user("u1").await.expect("user");

    assert_eq!(opened.id, "u1");
    assert_eq!(api.user_calls("u1"), 1);
}

#[tokio::test(start_paused = true)]
async fn prefetched_user_expires_after_ten_minutes() {
    let (api, page) = setup(FakeApi::new().with_user(user("u1", "Ana")));

    page.handle(hover("u1"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::advance(Duration::from_secs(9 * 60)).await;
    page.handle(hover("u1"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(api.user_calls("u1"), 1);

    tokio::time::advance(Duration::from_secs(60)).await;
    page.open_user("u1").await.expect("user");
    assert_eq!(api.user_calls("u1"), 2);
}

#[tokio::test(start_paused = true)]
async fn prefetch_failures_are_swallowed() {
    let (api, page) = setup(FakeApi::new());

    page.handle(hover("ghost"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(api.user_calls("ghost"), 1);
    assert!(page.prefetcher().cached("ghost").is_error());
    let err = page.open_user("ghost").await.expect_err("missing user");
    assert!(matches!(err, FetchError::NotFound { ref id } if id == "ghost"));
    assert_eq!(api.user_calls("ghost"), 2);
}

#[test]
fn hover_outside_runtime_is_a_no_op() {
    init_tracing();
    let api = Arc::new(FakeApi::new().with_user(user("u1", "Ana")));
    let page = UserListPage::new(QueryCache::default(), api.clone(), QueryConfig::default());

    assert!(page.handle(hover("u1")).is_none());
    assert!(page.handle(PageEvent::PageSelected(1)).is_none());
    assert_eq!(api.user_calls("u1"), 0);
}
