//! HTTP client wrapper shared by the probe and the chunk workers.
//!
//! Both are specializations of the same fetch primitive: a GET request with
//! an optional byte-range header. The client applies the per-attempt timeout
//! to connect and to each body read, never to the whole request, so a slow
//! but steady transfer is not aborted by a global deadline.

use std::time::Duration;

use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::TransferError;

/// Default per-attempt timeout (connect and per-read).
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for ranged streaming fetches.
///
/// Designed to be created once per engine and reused across the probe and
/// all workers, taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl HttpClient {
    /// Creates a client with the given per-attempt timeout.
    ///
    /// Compression is left disabled: transparent content decoding would
    /// desynchronize decoded byte counts from the byte ranges written to
    /// the destination file.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(attempt_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(attempt_timeout)
            .read_timeout(attempt_timeout)
            .user_agent(concat!("parget/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a GET request, optionally with a byte-range header.
    ///
    /// Both `200 OK` and `206 Partial Content` pass through; callers decide
    /// whether a full-body answer to a range request is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Timeout`] when the attempt times out,
    /// [`TransferError::Network`] for connection-level failures, and
    /// [`TransferError::HttpStatus`] for non-success responses.
    pub async fn get(
        &self,
        url: &str,
        range: Option<&str>,
    ) -> Result<reqwest::Response, TransferError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }

        debug!(url, ?range, "sending GET");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransferError::timeout(url)
            } else {
                TransferError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::http_status(url, status.as_u16()));
        }

        Ok(response)
    }

    /// Whether a response honored the byte-range request it was sent for.
    #[must_use]
    pub fn is_partial_content(response: &reqwest::Response) -> bool {
        response.status() == StatusCode::PARTIAL_CONTENT
    }
}
