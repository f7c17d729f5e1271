//! HTTP/1.1 `GET` request builder.
//!
//! Provides a fluent builder for the requests the resource client issues and
//! serializes them to a byte buffer for transmission over TCP.

use bytes::{BufMut, BytesMut};

use super::Headers;

const USER_AGENT: &str = concat!("rquery/", env!("CARGO_PKG_VERSION"));

/// An outgoing HTTP/1.1 `GET` request, ready to be serialized and sent.
///
/// Every request asks the server to close the connection once the response is
/// written, so a response body without framing headers ends at EOF.
///
/// # Examples
///
/// ```
/// use rquery::http::Request;
///
/// let request = Request::get("/users?page=2")
///     .host("localhost:3000")
///     .header("Authorization", "Bearer abc");
///
/// let bytes = request.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("GET /users?page=2 HTTP/1.1\r\n"));
/// assert!(text.contains("Host: localhost:3000\r\n"));
/// assert!(text.ends_with("\r\n\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    target: String,
    host: Option<String>,
    headers: Headers,
}

impl Request {
    /// Creates a `GET` request for the given origin-form target (`/path?query`).
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            host: None,
            headers: Headers::new(),
        }
    }

    /// Sets the `Host` header value (`host` or `host:port`).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends every header from `headers`.
    #[must_use]
    pub fn headers<'a>(mut self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (name, value) in headers {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns the request target (path and query string).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Serializes the request into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Adds `Host`, `Accept: application/json`, `User-Agent` and
    /// `Connection: close` unless the caller already set them.
    pub fn into_bytes(mut self) -> BytesMut {
        if let Some(host) = self.host.take() {
            if !self.headers.contains("host") {
                self.headers.insert("Host", host);
            }
        }
        if !self.headers.contains("accept") {
            self.headers.insert("Accept", "application/json");
        }
        if !self.headers.contains("user-agent") {
            self.headers.insert("User-Agent", USER_AGENT);
        }
        if !self.headers.contains("connection") {
            self.headers.insert("Connection", "close");
        }

        let estimated_size = 32 + self.target.len() + self.headers.len() * 48;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("GET {} HTTP/1.1\r\n", self.target).as_bytes());
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.put(&b"\r\n"[..]);

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn default_headers() {
        let s = to_string(Request::get("/users/u1").host("api.local").into_bytes());
        assert!(s.starts_with("GET /users/u1 HTTP/1.1\r\n"));
        assert!(s.contains("Host: api.local\r\n"));
        assert!(s.contains("Accept: application/json\r\n"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.contains("User-Agent: rquery/"));
    }

    #[test]
    fn caller_headers_win() {
        let s = to_string(
            Request::get("/")
                .header("Accept", "text/plain")
                .header("Connection", "keep-alive")
                .into_bytes(),
        );
        assert!(s.contains("Accept: text/plain\r\n"));
        assert!(!s.contains("application/json"));
        assert!(!s.contains("Connection: close"));
    }

    #[test]
    fn no_host_when_unset() {
        let s = to_string(Request::get("/").into_bytes());
        assert!(!s.contains("Host:"));
    }
}
