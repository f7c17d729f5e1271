//! Failure taxonomy shared by the resource client, the cache and the queries.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::http::ResponseError;

/// A failed fetch of a user resource.
///
/// Cache snapshots hand the same failure to every waiter, so the error is
/// `Clone`; non-clonable sources are kept behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-level failure: connect, read, write, timeout or a response
    /// that is not valid HTTP.
    #[error("network error: {0}")]
    Network(Arc<io::Error>),

    /// The server answered with a non-2xx status.
    #[error("server responded with status {status}")]
    Server { status: u16 },

    /// The body did not match the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(Arc<serde_json::Error>),

    /// The server reported that no user has this id.
    #[error("user {id} not found")]
    NotFound { id: String },
}

impl FetchError {
    /// Builds a [`FetchError::Network`] from any I/O error.
    pub fn network(err: io::Error) -> Self {
        Self::Network(Arc::new(err))
    }

    /// Returns `true` for failures that happened before the server answered.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// The HTTP status the server answered with, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Text a rendering collaborator shows in place of the user table.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested user does not exist",
            _ => "There was a problem loading the users table",
        }
    }
}

impl From<io::Error> for FetchError {
    fn from(err: io::Error) -> Self {
        Self::network(err)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(Arc::new(err))
    }
}

impl From<ResponseError> for FetchError {
    fn from(err: ResponseError) -> Self {
        let kind = match err {
            ResponseError::UnexpectedEof => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::InvalidData,
        };
        Self::network(io::Error::new(kind, err))
    }
}

/// Errors raised while building a client or query configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported URL scheme in {url:?}: only http:// is supported")]
    UnsupportedScheme { url: String },

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_kind() {
        assert_eq!(FetchError::Server { status: 502 }.status(), Some(502));
        assert_eq!(
            FetchError::NotFound { id: "u1".into() }.status(),
            Some(404)
        );
        let net = FetchError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(net.is_network());
        assert_eq!(net.status(), None);
    }

    #[test]
    fn response_errors_are_network_failures() {
        let err = FetchError::from(ResponseError::UnexpectedEof);
        match err {
            FetchError::Network(io) => assert_eq!(io.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_errors_wrap_serde() {
        let err: FetchError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(err.to_string().starts_with("failed to decode response body"));
    }
}
