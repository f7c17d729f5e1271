//! Resource client: `GET` access to the user-listing API.
//!
//! [`UserApi`] is the seam the cache consumers fetch through; the production
//! implementation is [`HttpUserClient`]. Each call is a single attempt: no
//! retries and no caching happen at this layer.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::debug;

use crate::config::{ClientConfig, Endpoint};
use crate::error::{ConfigError, FetchError};
use crate::http::{Request, Response, StatusCode};
use crate::model::{Page, UserSummary};

mod transport;

/// A pinned, boxed, `Send` future, as returned by [`UserApi`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches user records from wherever they live.
///
/// # Contract
///
/// - `fetch_user_page` fails with [`FetchError::Network`],
///   [`FetchError::Server`] or [`FetchError::Decode`].
/// - `fetch_user_by_id` fails the same ways, plus [`FetchError::NotFound`]
///   when the server has no such id.
/// - Implementations must be `Send + Sync`: one client is shared by every
///   query and by fetch tasks spawned on the runtime.
pub trait UserApi: Send + Sync {
    /// Fetches page `page` (1-based) of the user collection.
    fn fetch_user_page(&self, page: u32) -> BoxFuture<'_, Result<Page, FetchError>>;

    /// Fetches a single user.
    fn fetch_user_by_id<'a>(&'a self, id: &'a str)
    -> BoxFuture<'a, Result<UserSummary, FetchError>>;
}

// `GET /users?page=n` body. `totalCount` may instead arrive in `x-total-count`.
#[derive(Deserialize)]
struct PageBody {
    users: Vec<UserSummary>,
    #[serde(rename = "totalCount", default)]
    total_count: Option<u64>,
}

// `GET /users/:id` body, either bare or wrapped as `{"user": {...}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserBody {
    Wrapped { user: UserSummary },
    Bare(UserSummary),
}

/// [`UserApi`] over plain HTTP/1.1.
///
/// # Examples
///
/// ```rust,no_run
/// use rquery::client::HttpUserClient;
/// use rquery::config::ClientConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = HttpUserClient::new(ClientConfig::new("http://localhost:3000/api"))?;
///     let page = client.user_page(1).await?;
///     println!("{} users in total", page.total_count);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpUserClient {
    endpoint: Endpoint,
    config: ClientConfig,
}

impl HttpUserClient {
    /// Creates a client for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the base URL is not a valid `http://` URL.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        Ok(Self { endpoint, config })
    }

    /// Returns the endpoint requests are sent to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// `GET /users?page={page}`.
    pub async fn user_page(&self, page: u32) -> Result<Page, FetchError> {
        let response = self.get(&format!("/users?page={page}")).await?;
        if !response.is_success() {
            return Err(FetchError::Server {
                status: response.status(),
            });
        }

        let body: PageBody = serde_json::from_slice(response.body())?;
        let total_count = body
            .total_count
            .or_else(|| response.headers().get_u64("x-total-count"))
            .ok_or_else(|| {
                FetchError::from(<serde_json::Error as serde::de::Error>::missing_field(
                    "totalCount",
                ))
            })?;

        Ok(Page::new(body.users, total_count))
    }

    /// `GET /users/{id}`.
    pub async fn user(&self, id: &str) -> Result<UserSummary, FetchError> {
        let response = self
            .get(&format!("/users/{}", encode_path_segment(id)))
            .await?;

        match response.status_code() {
            Some(StatusCode::NotFound) => {
                return Err(FetchError::NotFound { id: id.to_owned() });
            }
            _ if !response.is_success() => {
                return Err(FetchError::Server {
                    status: response.status(),
                });
            }
            _ => {}
        }

        Ok(match serde_json::from_slice(response.body())? {
            UserBody::Wrapped { user } | UserBody::Bare(user) => user,
        })
    }

    async fn get(&self, path: &str) -> Result<Response, FetchError> {
        let target = format!("{}{}", self.endpoint.base_path, path);
        let request = Request::get(target.as_str())
            .host(self.endpoint.authority())
            .headers(
                self.config
                    .default_headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );

        let result = transport::send(&self.endpoint, request, self.config.timeout).await;
        match &result {
            Ok(response) => debug!(path = %target, status = response.status(), "GET completed"),
            Err(e) => debug!(path = %target, error = %e, "GET failed"),
        }
        result
    }
}

impl UserApi for HttpUserClient {
    fn fetch_user_page(&self, page: u32) -> BoxFuture<'_, Result<Page, FetchError>> {
        Box::pin(self.user_page(page))
    }

    fn fetch_user_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<UserSummary, FetchError>> {
        Box::pin(self.user(id))
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
