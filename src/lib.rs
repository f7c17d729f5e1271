//! # rquery
//!
//! Async data layer for a paginated user listing: a deduplicating,
//! staleness-aware query cache, a paginated list query with
//! stale-while-revalidate semantics, and hover prefetching of user details.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rquery::{ClientConfig, HttpUserClient, PageEvent, QueryCache, QueryConfig, UserListPage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(HttpUserClient::new(ClientConfig::from_env()?)?);
//!     let page = UserListPage::new(QueryCache::default(), api, QueryConfig::default());
//!
//!     if let Some(load) = page.open() {
//!         load.await?;
//!     }
//!     let view = page.view();
//!     for user in view.state.data.iter().flat_map(|p| p.users.iter()) {
//!         println!("{} <{}>", user.name, user.email);
//!     }
//!
//!     // Hovering a row warms the detail view's cache entry.
//!     page.handle(PageEvent::RowHovered { user_id: "u1".into() });
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod page;
pub mod query;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheEntry, QueryCache, QueryKey, QueryStatus};
pub use client::{HttpUserClient, UserApi};
pub use config::{CacheConfig, ClientConfig, QueryConfig};
pub use error::{ConfigError, FetchError};
pub use model::{Page, UserSummary};
pub use page::{PageEvent, PageView, UserListPage};
pub use query::{ListState, Pagination, Prefetcher, UserListQuery};
