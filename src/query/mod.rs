//! Queries built on the [`QueryCache`](crate::cache::QueryCache): the
//! paginated user list, hover prefetching and pagination arithmetic.

pub mod list;
pub mod pagination;
pub mod prefetch;

pub use list::{ListState, UserListQuery};
pub use pagination::Pagination;
pub use prefetch::Prefetcher;
