//! Failure classification and bounded fixed-delay retry.
//!
//! Every transport failure is mapped to an [`ErrorKind`]. Three kinds are
//! retryable: timeouts, connection resets, and connection refusals. Each of
//! those carries its own attempt counter inside a [`RetryBudget`], so a
//! server that alternates failure modes still terminates within a bounded
//! number of attempts per kind.
//!
//! The inter-attempt delay is fixed and equal to the configured per-attempt
//! timeout. This throttles retries proportionally to how slow the server
//! already is.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use parget::retry::{classify, RetryBudget, RetryDecision, RetryPolicy};
//! use parget::TransferError;
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(30));
//! let mut budget = RetryBudget::default();
//! let error = TransferError::timeout("https://example.com/file.iso");
//!
//! match policy.should_retry(classify(&error), &mut budget) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("retrying in {delay:?} (attempt {attempt})");
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("not retrying: {reason}");
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::TransferError;

/// Default maximum retry attempts per error kind.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A network attempt exceeded the per-attempt timeout. Retryable.
    Timeout,

    /// The peer reset or closed the connection mid-exchange. Retryable.
    ConnectionReset,

    /// The peer refused the connection. Retryable.
    ConnectionRefused,

    /// Hostname could not be resolved. Fatal: retrying the same name
    /// immediately would not help.
    NameResolution,

    /// The server completed the exchange with a 4xx/5xx status. Fatal.
    HttpStatus(u16),

    /// Anything else. Fatal, and always propagated to the caller.
    Unknown,
}

impl ErrorKind {
    /// Whether failures of this kind may succeed on retry.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectionReset | Self::ConnectionRefused
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::NameResolution => write!(f, "name resolution failure"),
            Self::HttpStatus(status) => write!(f, "HTTP status {status}"),
            Self::Unknown => write!(f, "unknown failure"),
        }
    }
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// How many retries of this kind have now been spent (1-indexed).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Per-kind attempt counters for one logical operation.
///
/// A fresh budget is created for each probe and for each chunk worker, so
/// retries in one part of the transfer never starve another.
#[derive(Debug, Default, Clone)]
pub struct RetryBudget {
    timeouts: u32,
    resets: u32,
    refused: u32,
}

/// Bounded fixed-delay retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries per error kind.
    max_retries: u32,
    /// Fixed delay between attempts.
    backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given per-kind retry limit and fixed delay.
    #[must_use]
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Returns the per-kind retry limit.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the fixed inter-attempt delay.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Decides whether a failed attempt should be retried, consuming one
    /// unit of the budget for retryable kinds.
    pub fn should_retry(&self, kind: ErrorKind, budget: &mut RetryBudget) -> RetryDecision {
        let counter = match kind {
            ErrorKind::Timeout => &mut budget.timeouts,
            ErrorKind::ConnectionReset => &mut budget.resets,
            ErrorKind::ConnectionRefused => &mut budget.refused,
            ErrorKind::NameResolution | ErrorKind::HttpStatus(_) | ErrorKind::Unknown => {
                return RetryDecision::DoNotRetry {
                    reason: format!("{kind} is fatal"),
                };
            }
        };

        if *counter >= self.max_retries {
            debug!(%kind, max = self.max_retries, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retry budget ({}) exhausted for {kind}", self.max_retries),
            };
        }

        *counter += 1;
        debug!(%kind, attempt = *counter, delay_ms = self.backoff.as_millis(), "will retry");
        RetryDecision::Retry {
            delay: self.backoff,
            attempt: *counter,
        }
    }
}

/// Classifies a transfer error into an [`ErrorKind`].
///
/// | Error | Kind |
/// |-------|------|
/// | `Timeout` | `Timeout` |
/// | `HttpStatus` | `HttpStatus(code)` |
/// | `Truncated` | `ConnectionReset` (peer stopped sending early) |
/// | `Network` | inspected further, see below |
/// | everything else | `Unknown` |
///
/// `WorkerFailed` delegates to the wrapped error, so the orchestrator can
/// report the kind the worker actually hit.
#[must_use]
pub fn classify(error: &TransferError) -> ErrorKind {
    match error {
        TransferError::Timeout { .. } => ErrorKind::Timeout,
        TransferError::HttpStatus { status, .. } => ErrorKind::HttpStatus(*status),
        TransferError::Truncated { .. } => ErrorKind::ConnectionReset,
        TransferError::Network { source, .. } => classify_network(source),
        TransferError::WorkerFailed { source, .. } => classify(source),
        _ => ErrorKind::Unknown,
    }
}

/// Classifies a reqwest error by walking its source chain.
///
/// The IO error kind is authoritative when present. Some failure modes only
/// surface as opaque hyper errors, so a lowercased message match is kept as
/// a fallback.
fn classify_network(error: &reqwest::Error) -> ErrorKind {
    if error.is_timeout() {
        return ErrorKind::Timeout;
    }

    if let Some(io) = find_io_source(error) {
        match io.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => return ErrorKind::ConnectionReset,
            std::io::ErrorKind::ConnectionRefused => return ErrorKind::ConnectionRefused,
            std::io::ErrorKind::TimedOut => return ErrorKind::Timeout,
            _ => {}
        }
    }

    let message = error.to_string().to_lowercase();
    if message.contains("dns error") || message.contains("failed to lookup address") {
        ErrorKind::NameResolution
    } else if message.contains("connection reset")
        || message.contains("reset by peer")
        || message.contains("connection closed")
        || message.contains("incomplete message")
        || message.contains("broken pipe")
        || message.contains("unexpected eof")
    {
        ErrorKind::ConnectionReset
    } else if message.contains("connection refused") {
        ErrorKind::ConnectionRefused
    } else {
        ErrorKind::Unknown
    }
}

/// Finds the deepest `std::io::Error` in an error's source chain.
fn find_io_source(error: &reqwest::Error) -> Option<&std::io::Error> {
    let mut source = std::error::Error::source(error);
    let mut found = None;
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            found = Some(io);
        }
        source = inner.source();
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_timeout() {
        let error = TransferError::timeout("http://example.com");
        assert_eq!(classify(&error), ErrorKind::Timeout);
    }

    #[test]
    fn test_classify_http_status_carries_code() {
        let error = TransferError::http_status("http://example.com", 503);
        assert_eq!(classify(&error), ErrorKind::HttpStatus(503));
    }

    #[test]
    fn test_classify_truncated_as_reset() {
        let error = TransferError::truncated("http://example.com", 100, 40);
        assert_eq!(classify(&error), ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_classify_io_error_unknown() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = TransferError::io("/path/to/file", io_err);
        assert_eq!(classify(&error), ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_invalid_url_unknown() {
        let error = TransferError::invalid_url("not-a-url");
        assert_eq!(classify(&error), ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_range_not_supported_unknown() {
        let error = TransferError::RangeNotSupported {
            url: "http://example.com".to_string(),
        };
        assert_eq!(classify(&error), ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_worker_failed_delegates_to_inner() {
        let inner = TransferError::timeout("http://example.com");
        let error = TransferError::worker_failed(3, inner);
        assert_eq!(classify(&error), ErrorKind::Timeout);
    }

    // ==================== Retryability Tests ====================

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::ConnectionReset.is_retryable());
        assert!(ErrorKind::ConnectionRefused.is_retryable());
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(!ErrorKind::NameResolution.is_retryable());
        assert!(!ErrorKind::HttpStatus(404).is_retryable());
        assert!(!ErrorKind::HttpStatus(503).is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    // ==================== Policy Tests ====================

    #[test]
    fn test_should_retry_uses_fixed_backoff_delay() {
        let policy = RetryPolicy::new(3, Duration::from_secs(7));
        let mut budget = RetryBudget::default();
        let decision = policy.should_retry(ErrorKind::Timeout, &mut budget);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_secs(7),
                attempt: 1,
            }
        );
    }

    #[test]
    fn test_should_retry_http_status_is_fatal() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let mut budget = RetryBudget::default();
        let decision = policy.should_retry(ErrorKind::HttpStatus(500), &mut budget);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
    }

    #[test]
    fn test_should_retry_name_resolution_is_fatal() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let mut budget = RetryBudget::default();
        let decision = policy.should_retry(ErrorKind::NameResolution, &mut budget);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
    }

    #[test]
    fn test_budget_exhausts_after_max_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let mut budget = RetryBudget::default();

        assert!(matches!(
            policy.should_retry(ErrorKind::Timeout, &mut budget),
            RetryDecision::Retry { attempt: 1, .. }
        ));
        assert!(matches!(
            policy.should_retry(ErrorKind::Timeout, &mut budget),
            RetryDecision::Retry { attempt: 2, .. }
        ));

        let decision = policy.should_retry(ErrorKind::Timeout, &mut budget);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
        if let RetryDecision::DoNotRetry { reason } = decision {
            assert!(reason.contains("exhausted"), "unexpected reason: {reason}");
        }
    }

    #[test]
    fn test_budget_counters_are_independent_per_kind() {
        let policy = RetryPolicy::new(1, Duration::from_millis(10));
        let mut budget = RetryBudget::default();

        // Spend the timeout budget.
        assert!(matches!(
            policy.should_retry(ErrorKind::Timeout, &mut budget),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(ErrorKind::Timeout, &mut budget),
            RetryDecision::DoNotRetry { .. }
        ));

        // Reset and refused budgets are untouched.
        assert!(matches!(
            policy.should_retry(ErrorKind::ConnectionReset, &mut budget),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(ErrorKind::ConnectionRefused, &mut budget),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn test_zero_retries_fails_on_first_transient_error() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        let mut budget = RetryBudget::default();
        assert!(matches!(
            policy.should_retry(ErrorKind::ConnectionReset, &mut budget),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(ErrorKind::HttpStatus(404).to_string(), "HTTP status 404");
        assert_eq!(
            ErrorKind::NameResolution.to_string(),
            "name resolution failure"
        );
    }
}
