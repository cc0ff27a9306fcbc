use crate::feed::parser::{parse_releases, ParseError, ReleaseEntry};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Release feeds are tiny; anything past this is not a feed.
const MAX_FEED_SIZE: usize = 1024 * 1024; // 1MB
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur retrieving or parsing the watched feed.
///
/// All of these are recovered at the cycle boundary: the cycle aborts,
/// the watermark stays put, and the next tick tries again.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 1MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Document could not be parsed as an Atom feed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Fetch and parse the release feed at `url`.
///
/// Issues a single GET with a 30-second timeout, validates the HTTP status,
/// reads the body through a size-limited stream, and hands the bytes to the
/// parser. Entries come back in document order; callers select by timestamp,
/// never by position.
pub async fn fetch_releases(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<ReleaseEntry>, FetchError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    Ok(parse_releases(&bytes)?)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
