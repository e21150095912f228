//! Resource probe: discovers total size and byte-range support.
//!
//! One metadata request per attempt: a GET with a one-byte test range. A
//! `206 Partial Content` answer proves range support and carries the total
//! size in `Content-Range`. A `200 OK` answer means the server ignored the
//! range; the size then comes from `Content-Length` and may be unknown.
//!
//! Transient failures are retried with the fixed backoff from the retry
//! policy; fatal failures (name resolution, any 4xx/5xx) surface
//! immediately.

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE};
use tracing::{debug, instrument, warn};

use crate::client::HttpClient;
use crate::error::TransferError;
use crate::retry::{RetryBudget, RetryDecision, RetryPolicy, classify};

/// Test range requested by the probe.
const PROBE_RANGE: &str = "bytes=0-0";

/// What the probe learned about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    /// Total size in bytes; `None` means the server did not declare one.
    pub total_size: Option<u64>,
    /// Whether the server honors byte-range requests.
    pub supports_ranges: bool,
}

impl ProbeResult {
    /// Whether the resource can be split into parallel chunks at all.
    /// Chunking requires both a known total size and range support.
    #[must_use]
    pub fn allows_chunking(&self) -> bool {
        self.supports_ranges && self.total_size.is_some()
    }
}

/// Probes a resource, retrying transient failures per the policy.
///
/// # Errors
///
/// Returns the last error once the retry budget for its kind is exhausted,
/// or immediately for fatal kinds.
#[instrument(skip(client, policy))]
pub async fn probe(
    client: &HttpClient,
    url: &str,
    policy: &RetryPolicy,
) -> Result<ProbeResult, TransferError> {
    let mut budget = RetryBudget::default();

    loop {
        match probe_once(client, url).await {
            Ok(result) => {
                debug!(
                    total_size = ?result.total_size,
                    supports_ranges = result.supports_ranges,
                    "probe complete"
                );
                return Ok(result);
            }
            Err(error) => match policy.should_retry(classify(&error), &mut budget) {
                RetryDecision::Retry { delay, attempt } => {
                    warn!(%error, attempt, delay_ms = delay.as_millis(), "probe failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "probe not retried");
                    return Err(error);
                }
            },
        }
    }
}

/// Issues one probe request and interprets the response headers.
async fn probe_once(client: &HttpClient, url: &str) -> Result<ProbeResult, TransferError> {
    let response = client.get(url, Some(PROBE_RANGE)).await?;

    if HttpClient::is_partial_content(&response) {
        let total_size = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        return Ok(ProbeResult {
            total_size,
            supports_ranges: true,
        });
    }

    // Server ignored the test range; fall back to the declared length.
    let total_size = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    Ok(ProbeResult {
        total_size,
        supports_ranges: false,
    })
}

/// Parses the total size out of a `Content-Range` value such as
/// `bytes 0-0/12345`. Returns `None` for the unknown-size form `bytes 0-0/*`
/// and for anything malformed.
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}
