//! HTTP header map with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per [RFC 9110 §5].

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// Used both for the headers the client sends and for the headers parsed off
/// a response head.
///
/// # Examples
///
/// ```
/// use rquery::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("X-Total-Count", "42");
/// headers.insert("Content-Length", "17");
///
/// assert_eq!(headers.get("x-total-count"), Some("42"));
/// assert_eq!(headers.content_length(), Some(17));
/// assert!(!headers.is_chunked());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the headers `httparse` produced for a response head.
    ///
    /// Values that are not valid UTF-8 are skipped.
    pub fn from_parsed(raw: &[httparse::Header<'_>]) -> Self {
        let mut headers = Self {
            inner: Vec::with_capacity(raw.len()),
        };
        for header in raw {
            if let Ok(value) = std::str::from_utf8(header.value) {
                headers.insert(header.name, value.trim());
            }
        }
        headers
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first value for `name` parsed as an unsigned integer.
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name)?.trim().parse().ok()
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// The `Content-Length` header, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.get("content-length")?.trim().parse().ok()
    }

    /// Returns `true` when the last transfer coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.get("transfer-encoding")
            .and_then(|te| te.rsplit(',').next())
            .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
