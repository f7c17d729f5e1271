//! HTTP/1.1 response parsing using the [`httparse`] crate.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::{Headers, StatusCode};

/// Maximum size of a complete HTTP response we will buffer before giving up (8 MiB).
pub const MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024;

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete; more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("malformed chunked transfer encoding")]
    InvalidChunk,

    #[error("connection closed before the response was complete")]
    UnexpectedEof,

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },
}

/// A fully received HTTP/1.1 response.
///
/// Created by [`Response::parse`] from the bytes read off a connection. The
/// body is de-chunked when the server used `Transfer-Encoding: chunked`.
///
/// # Examples
///
/// ```
/// use rquery::http::Response;
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nX-Total-Count: 7\r\n\r\n{}";
/// let response = Response::parse(raw, false).unwrap();
///
/// assert_eq!(response.status(), 200);
/// assert!(response.is_success());
/// assert_eq!(response.headers().get_u64("x-total-count"), Some(7));
/// assert_eq!(&response.body()[..], b"{}");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: String,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Maximum number of headers we accept per response.
    const MAX_HEADERS: usize = 64;

    /// Parses a complete response from `buf`.
    ///
    /// `eof` tells the parser the peer has closed the connection, so a body
    /// without `Content-Length` or chunked framing ends at the buffer's end.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`]: more data is needed (head or body).
    /// - [`ResponseError::UnexpectedEof`]: `eof` is set but the framing says
    ///   more bytes were due.
    /// - [`ResponseError::Parse`] / [`ResponseError::InvalidChunk`]: the data
    ///   is malformed.
    pub fn parse(buf: &[u8], eof: bool) -> Result<Self, ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial if eof => return Err(ResponseError::UnexpectedEof),
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let status = raw.code.ok_or(ResponseError::MissingField { field: "status" })?;
        let reason = raw.reason.unwrap_or_default().to_owned();
        let headers = Headers::from_parsed(raw.headers);
        let rest = &buf[body_offset..];

        let body = if status == 204 || status == 304 || (100..200).contains(&status) {
            Bytes::new()
        } else if headers.is_chunked() {
            match decode_chunked(rest)? {
                Some(body) => body,
                None if eof => return Err(ResponseError::UnexpectedEof),
                None => return Err(ResponseError::Incomplete),
            }
        } else if let Some(length) = headers.content_length() {
            if rest.len() >= length {
                Bytes::copy_from_slice(&rest[..length])
            } else if eof {
                return Err(ResponseError::UnexpectedEof);
            } else {
                return Err(ResponseError::Incomplete);
            }
        } else if eof {
            Bytes::copy_from_slice(rest)
        } else {
            return Err(ResponseError::Incomplete);
        };

        Ok(Self {
            status,
            reason,
            headers,
            body,
        })
    }

    /// Returns the raw numeric status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the status as a known [`StatusCode`], if it is one.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status)
    }

    /// Returns the reason phrase the server sent.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns `true` for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the (de-chunked) body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Decodes a chunked body. Returns `Ok(None)` while the terminating chunk
/// (and trailer section) has not fully arrived.
fn decode_chunked(mut buf: &[u8]) -> Result<Option<Bytes>, ResponseError> {
    let mut body = BytesMut::new();

    loop {
        let (offset, size) = match httparse::parse_chunk_size(buf) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(_) => return Err(ResponseError::InvalidChunk),
        };
        buf = &buf[offset..];

        if size == 0 {
            return Ok(skip_trailers(buf).map(|()| body.freeze()));
        }

        let size = usize::try_from(size).map_err(|_| ResponseError::InvalidChunk)?;
        if size > MAX_RESPONSE_SIZE.saturating_sub(body.len()) {
            return Err(ResponseError::TooLarge {
                max_bytes: MAX_RESPONSE_SIZE,
            });
        }
        let end = size.checked_add(2).ok_or(ResponseError::InvalidChunk)?;
        if buf.len() < end {
            return Ok(None);
        }
        if &buf[size..end] != b"\r\n" {
            return Err(ResponseError::InvalidChunk);
        }
        body.extend_from_slice(&buf[..size]);
        buf = &buf[end..];
    }
}

// Trailer fields end with an empty line; `None` until it has arrived.
fn skip_trailers(mut buf: &[u8]) -> Option<()> {
    loop {
        let line_end = buf.windows(2).position(|w| w == b"\r\n")?;
        if line_end == 0 {
            return Some(());
        }
        buf = &buf[line_end + 2..];
    }
}
