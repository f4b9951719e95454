use crate::util::{validate_feed_url, UrlValidationError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that can occur while retrieving a feed body.
///
/// These cover the transport side only; a body that arrives intact but does
/// not parse is a [`super::ParseError`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL rejected before any request was made
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The task running the fetch ended without a result
    #[error("Fetch task aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

/// How a single feed is requested.
///
/// `max_retries` is the retry seam: with the default of 0 every failure is
/// final. When raised, 429, 5xx and truncated bodies are retried with
/// exponential backoff (`backoff`, `2 * backoff`, `4 * backoff`, ...).
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Per-request timeout covering connect, headers and body
    pub timeout: Duration,
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Base delay between attempts
    pub backoff: Duration,
    /// Largest body accepted, in bytes
    pub max_body_bytes: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            backoff: DEFAULT_BACKOFF,
            max_body_bytes: MAX_FEED_SIZE,
        }
    }
}

impl FetchPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Builds the HTTP client shared by every fetch in a run.
pub fn build_client(policy: &FetchPolicy) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(policy.timeout)
        .user_agent(concat!("feed2md/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Fetches a feed and returns its body as text.
///
/// # Arguments
///
/// * `client` - HTTP client (caller controls configuration)
/// * `url` - Feed URL; validated before the request is made
/// * `policy` - Timeout, retry and size limits
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] - Not an http(s) URL with a host
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Request exceeded `policy.timeout`
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::RateLimited`] - 429 response after max retries
/// - [`FetchError::ResponseTooLarge`] - Body exceeded `policy.max_body_bytes`
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    policy: &FetchPolicy,
) -> Result<String, FetchError> {
    let url = validate_feed_url(url)?;
    let mut retry_count = 0;

    let bytes = loop {
        let response = tokio::time::timeout(policy.timeout, client.get(url.clone()).send())
            .await
            .map_err(|_| FetchError::Timeout)??;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= policy.max_retries {
                return Err(FetchError::RateLimited(retry_count));
            }

            let delay = policy.delay_for(retry_count);
            tracing::warn!(
                feed = %url,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, backing off"
            );

            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if status.is_server_error() {
            if retry_count >= policy.max_retries {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let delay = policy.delay_for(retry_count);
            tracing::warn!(
                feed = %url,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Server error, retrying after delay"
            );

            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        // 4xx and other non-success statuses fail immediately
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, policy.max_body_bytes).await {
            Ok(bytes) => break bytes,
            Err(FetchError::IncompleteResponse { expected, received }) => {
                if retry_count >= policy.max_retries {
                    return Err(FetchError::IncompleteResponse { expected, received });
                }

                let delay = policy.delay_for(retry_count);
                tracing::debug!(
                    feed = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    "Retrying incomplete download"
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
    };

    tracing::debug!(feed = %url, bytes = bytes.len(), "Fetched feed");

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // Fewer bytes than Content-Length means the connection dropped mid-body
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
