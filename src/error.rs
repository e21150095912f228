//! Error types for transfer operations.
//!
//! This module defines structured errors for every stage of a transfer,
//! providing context-rich messages for debugging and user feedback. The
//! classification of these errors into retryable and fatal kinds lives in
//! [`crate::retry`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during a file transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level error (DNS resolution, connection refused/reset, TLS, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during the transfer (create file, seek, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server answered a chunk range request with a full-body response.
    ///
    /// Writing a full body at a chunk offset would corrupt the file, so a
    /// worker that sees this stops immediately and fails the transfer.
    #[error("server ignored byte-range request for {url}")]
    RangeNotSupported {
        /// The URL that was requested with a Range header.
        url: String,
    },

    /// The response body ended before the requested range was delivered.
    ///
    /// Treated like a connection reset: the worker retries the remaining
    /// suffix of its range.
    #[error("truncated body from {url}: expected {expected} bytes, received {received}")]
    Truncated {
        /// The URL whose body ended early.
        url: String,
        /// Bytes the range request asked for.
        expected: u64,
        /// Bytes actually received.
        received: u64,
    },

    /// Final file size does not match the size reported by the probe.
    #[error("size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Destination path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected: u64,
        /// Actual size in bytes.
        actual: u64,
    },

    /// Invalid worker count supplied at engine construction.
    #[error("invalid worker count {value}: must be between 1 and 19")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },

    /// A chunk worker failed, failing the whole transfer.
    #[error("worker {index} failed: {source}")]
    WorkerFailed {
        /// Index of the failed worker's chunk.
        index: usize,
        /// The error the worker reported.
        #[source]
        source: Box<TransferError>,
    },

    /// Failure that does not fit any known kind. Propagated, never swallowed.
    #[error("unknown transfer failure: {message}")]
    Unknown {
        /// Description of what went wrong.
        message: String,
    },
}

impl TransferError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a truncated body error.
    pub fn truncated(url: impl Into<String>, expected: u64, received: u64) -> Self {
        Self::Truncated {
            url: url.into(),
            expected,
            received,
        }
    }

    /// Creates a size mismatch error.
    pub fn size_mismatch(path: impl Into<PathBuf>, expected: u64, actual: u64) -> Self {
        Self::SizeMismatch {
            path: path.into(),
            expected,
            actual,
        }
    }

    /// Wraps a worker's error with its chunk index.
    pub fn worker_failed(index: usize, source: TransferError) -> Self {
        Self::WorkerFailed {
            index,
            source: Box::new(source),
        }
    }

    /// Creates an unknown failure from a message.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`
// because our error variants require context (url, path) that the source errors
// don't provide. The helper constructor methods are the correct pattern here.
