//! Client, query and cache configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// Default base URL of the user-listing API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Environment variable overriding [`ClientConfig::base_url`].
pub const ENV_BASE_URL: &str = "RQUERY_BASE_URL";

/// Environment variable overriding [`ClientConfig::timeout`], in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "RQUERY_TIMEOUT_MS";

/// Where the API lives, split out of a `http://host[:port][/prefix]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Path prefix without a trailing slash; empty for the root.
    pub base_path: String,
}

impl Endpoint {
    /// Parses a plain-HTTP base URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use rquery::config::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("http://localhost:3000/api/").unwrap();
    /// assert_eq!(endpoint.host, "localhost");
    /// assert_eq!(endpoint.port, 3000);
    /// assert_eq!(endpoint.base_path, "/api");
    /// assert_eq!(endpoint.authority(), "localhost:3000");
    /// ```
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let rest = url
            .strip_prefix("http://")
            .ok_or_else(|| ConfigError::UnsupportedScheme {
                url: url.to_owned(),
            })?;

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(ConfigError::InvalidUrl {
                url: url.to_owned(),
                reason: "missing host",
            });
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| ConfigError::InvalidUrl {
                    url: url.to_owned(),
                    reason: "port is not a number",
                })?;
                (host, port)
            }
            None => (authority, 80),
        };

        Ok(Self {
            host: host.to_owned(),
            port,
            base_path: path.trim_end_matches('/').to_owned(),
        })
    }

    /// `host` or `host:port`, as sent in the `Host` header.
    pub fn authority(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Configuration for [`HttpUserClient`](crate::client::HttpUserClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Deadline for a whole request: connect, send and receive.
    pub timeout: Duration,
    /// Extra headers sent with every request (e.g. authorization).
    pub default_headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(10),
            default_headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Builds a config from `RQUERY_BASE_URL` and `RQUERY_TIMEOUT_MS`,
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            let millis = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TIMEOUT_MS,
                value: value.clone(),
            })?;
            config.timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.base_url)
    }
}

/// Freshness windows and list behaviour for the queries.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long a fetched user page is served without refetching.
    pub list_stale_time: Duration,
    /// How long a fetched single user is served without refetching; also
    /// the prefetch freshness window.
    pub user_stale_time: Duration,
    /// Rows per page the server returns; drives page-count arithmetic.
    pub page_size: u32,
    /// Keep showing the previous page while an uncached page loads.
    pub keep_previous_data: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            list_stale_time: Duration::from_secs(5),
            user_stale_time: Duration::from_secs(10 * 60),
            page_size: 10,
            keep_previous_data: false,
        }
    }
}

impl QueryConfig {
    pub fn with_list_stale_time(mut self, stale_time: Duration) -> Self {
        self.list_stale_time = stale_time;
        self
    }

    pub fn with_user_stale_time(mut self, stale_time: Duration) -> Self {
        self.user_stale_time = stale_time;
        self
    }

    /// Zero is treated as one row per page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }
}

/// Size policy for the [`QueryCache`](crate::cache::QueryCache).
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Upper bound on stored entries; `None` keeps everything until it is
    /// invalidated, replaced or cleared.
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }
}
