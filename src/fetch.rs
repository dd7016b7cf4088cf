//! Outbound HTTP for every source the hub talks to.
//!
//! All requests carry the configured user agent, run under a per-call timeout
//! and read the body as a size-limited stream. Every failure becomes a
//! [`SourceError`]; callers decide which safe default it degrades to.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use crate::config::Config;

/// Errors that can occur while talking to one node or peer.
///
/// Every variant is recoverable at the boundary of the component that meets it.
/// None of them aborts a build.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network-level error (DNS, connection refused, TLS, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded its timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("response too large")]
    TooLarge,
    /// HTTP response with non-2xx status code
    #[error("HTTP {0}")]
    HttpStatus(u16),
    /// Response arrived but could not be understood (e.g. malformed peer manifest)
    #[error("parse error: {0}")]
    Parse(String),
    /// Page fetched but the required back-link is absent or points elsewhere
    #[error("{0}")]
    Verification(String),
}

/// Coarse failure classes, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Http,
    Parse,
    Verification,
}

impl SourceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Network(_) | SourceError::Timeout | SourceError::TooLarge => {
                FailureKind::Network
            }
            SourceError::HttpStatus(_) => FailureKind::Http,
            SourceError::Parse(_) => FailureKind::Parse,
            SourceError::Verification(_) => FailureKind::Verification,
        }
    }
}

/// HTTP client wrapper shared by the verifier, the peer client and the engine.
///
/// Cheap to clone: `reqwest::Client` is reference counted.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    page_timeout: Duration,
    feed_timeout: Duration,
    max_response_bytes: usize,
}

impl Fetcher {
    /// Builds a fetcher from configuration.
    ///
    /// The client keeps reqwest's default redirect policy and sends
    /// `config.user_agent` on every request.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            feed_timeout: Duration::from_secs(config.feed_timeout_secs),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Fetches an HTML page or manifest document under the page timeout (10 s by default).
    pub async fn get_page(&self, url: &str) -> Result<String, SourceError> {
        self.get_text(url, self.page_timeout).await
    }

    /// Fetches a feed document under the feed timeout (15 s by default).
    pub async fn get_feed(&self, url: &str) -> Result<String, SourceError> {
        self.get_text(url, self.feed_timeout).await
    }

    /// Single attempt, no retries: a failed source stays failed for this build.
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, SourceError> {
        with_timeout(timeout, async {
            let response = self.client.get(url).send().await?;

            if !response.status().is_success() {
                return Err(SourceError::HttpStatus(response.status().as_u16()));
            }

            let bytes = read_limited_bytes(response, self.max_response_bytes).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
        .await
    }
}

/// Runs `fut` under `timeout`; overrunning counts as [`SourceError::Timeout`].
async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, SourceError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| SourceError::Timeout)?
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, SourceError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(SourceError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(SourceError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
