//! HTTP transport with bounded connection retry
//!
//! Posts a request document to the gateway and returns the raw response
//! body. Retry applies to connection-level failures only and is bounded at
//! [`SageConfig::max_attempts`] total attempts with no backoff; any success
//! short-circuits it. HTTP error status codes are *not* treated as
//! failures here: the protocol signals errors inside the response body, so
//! the body is surfaced to the caller unchanged.

use crate::config::SageConfig;
use crate::error::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use url::Url;

/// Trait for errors that can be classified as retryable or not
///
/// Connection-level failures (refused, reset, timed out) are transient and
/// should return `true`. Anything the server actually answered is permanent
/// from the transport's point of view.
pub trait IsRetryable {
    /// Returns true if the error is transient and the send should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_connect() || e.is_timeout(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Execute an async send with bounded, backoff-free retry.
///
/// At most `max_attempts` attempts are made; only errors classified
/// retryable by [`IsRetryable`] trigger another attempt. The last error is
/// returned once attempts are exhausted or a non-retryable error occurs.
pub async fn send_with_retry<F, Fut, T, E>(
    max_attempts: u32,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    "connection failure, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

/// HTTP transport bound to one gateway endpoint
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    endpoint: Url,
    max_attempts: u32,
}

impl Transport {
    /// Build a transport from the gateway configuration.
    ///
    /// The per-attempt timeout is applied at the HTTP client level; an
    /// unparseable endpoint URL is a configuration error.
    pub fn new(config: &SageConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| Error::Config {
            message: format!("invalid gateway endpoint {:?}: {e}", config.endpoint),
            key: Some("SAGE_ENDPOINT".to_string()),
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint,
            max_attempts: config.max_attempts,
        })
    }

    /// Send a request document; returns the raw response body.
    ///
    /// Connection failures are retried up to the configured attempt budget;
    /// exhaustion yields [`Error::ConnectionExhausted`].
    pub async fn send(&self, document: &str) -> Result<String> {
        match send_with_retry(self.max_attempts, || self.post(document)).await {
            Ok(body) => Ok(body),
            Err(e) if e.is_retryable() => Err(Error::ConnectionExhausted {
                attempts: self.max_attempts,
                source: Box::new(e),
            }),
            Err(e) => Err(e),
        }
    }

    async fn post(&self, document: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/xml")
            .body(document.to_string())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%status, bytes = body.len(), "gateway responded");
        Ok(body)
    }
}
