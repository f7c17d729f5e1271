//! One request per TCP connection over Tokio.
//!
//! Connects, writes a serialized [`Request`], then reads until a complete
//! [`Response`] has been buffered or the peer closes the connection.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::config::Endpoint;
use crate::error::FetchError;
use crate::http::{MAX_RESPONSE_SIZE, Request, Response, ResponseError};

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Sends `request` to `endpoint` and waits for the full response.
///
/// # Errors
///
/// Every failure is a [`FetchError::Network`]: connect/read/write errors, the
/// `timeout` elapsing, or bytes that are not a valid HTTP/1.1 response.
pub(crate) async fn send(
    endpoint: &Endpoint,
    request: Request,
    timeout: Duration,
) -> Result<Response, FetchError> {
    match tokio::time::timeout(timeout, exchange(endpoint, request)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::network(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("request timed out after {timeout:?}"),
        ))),
    }
}

async fn exchange(endpoint: &Endpoint, request: Request) -> Result<Response, FetchError> {
    let mut stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
    trace!(host = %endpoint.host, port = endpoint.port, "connected");

    stream.write_all(&request.into_bytes()).await?;
    stream.flush().await?;

    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;
        let eof = bytes_read == 0;

        if buf.len() > MAX_RESPONSE_SIZE {
            return Err(ResponseError::TooLarge {
                max_bytes: MAX_RESPONSE_SIZE,
            }
            .into());
        }

        match Response::parse(&buf, eof) {
            Ok(response) => return Ok(response),
            // Head or body not fully received yet.
            Err(ResponseError::Incomplete) if !eof => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
