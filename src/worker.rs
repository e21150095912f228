//! Chunk worker: fetches one byte range and writes it at its file offset.
//!
//! One abstraction covers both execution modes. A ranged worker owns a
//! disjoint chunk of the byte space and writes it with positioned writes;
//! a sequential worker streams the whole resource from offset zero. Because
//! range ownership is partitioned at planning time, no lock is needed on
//! the shared destination file: each worker opens its own handle and seeks
//! to offsets only it may touch.
//!
//! On a transient failure the worker retries only the remaining suffix of
//! its range, resuming from `start + bytes_written`. Sequential workers on
//! a server without range support restart from byte zero instead. Fatal
//! failures raise the shared cancellation flag so sibling workers stop at
//! their next stream read.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::StreamExt;
use reqwest::header::CONTENT_RANGE;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use crate::client::HttpClient;
use crate::error::TransferError;
use crate::retry::{RetryBudget, RetryDecision, RetryPolicy, classify};

/// How a worker's chunk is fetched.
#[derive(Debug, Clone, Copy)]
pub enum WorkerMode {
    /// Fetch exactly `[start, start + length)` with a range request.
    Ranged {
        /// First byte offset owned by this worker.
        start: u64,
        /// Number of bytes owned by this worker.
        length: u64,
    },
    /// Stream the whole resource from offset zero, one request at a time.
    Sequential {
        /// Whether a retry may resume mid-file with a range request.
        resumable: bool,
    },
}

/// Terminal state of a worker that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The worker wrote its entire range.
    Completed,
    /// The worker observed the cancellation flag and stopped early.
    Cancelled,
}

/// How one fetch attempt ended.
enum AttemptEnd {
    Complete,
    Cancelled,
}

/// A unit of concurrent execution owning one chunk of the transfer.
pub struct ChunkWorker {
    index: usize,
    mode: WorkerMode,
    policy: RetryPolicy,
    /// Cumulative bytes written by this worker, read by the aggregator.
    bytes_written: Arc<AtomicU64>,
    /// Shared cooperative cancellation flag, checked between stream reads.
    cancel: Arc<AtomicBool>,
}

impl ChunkWorker {
    /// Creates a worker for one chunk of the plan.
    #[must_use]
    pub fn new(
        index: usize,
        mode: WorkerMode,
        policy: RetryPolicy,
        bytes_written: Arc<AtomicU64>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            index,
            mode,
            policy,
            bytes_written,
            cancel,
        }
    }

    /// Runs the worker to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns the fatal error (or the last transient error once its retry
    /// budget is exhausted) that stopped this worker. The cancellation flag
    /// is raised before returning so sibling workers stand down.
    #[instrument(skip(self, client, url, path), fields(index = self.index))]
    pub async fn run(
        mut self,
        client: HttpClient,
        url: String,
        path: PathBuf,
    ) -> Result<WorkerOutcome, TransferError> {
        let mut budget = RetryBudget::default();
        let mut written: u64 = 0;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                debug!("worker cancelled before attempt");
                return Ok(WorkerOutcome::Cancelled);
            }

            match self.attempt(&client, &url, &path, &mut written).await {
                Ok(AttemptEnd::Complete) => {
                    debug!(bytes = written, "worker complete");
                    return Ok(WorkerOutcome::Completed);
                }
                Ok(AttemptEnd::Cancelled) => {
                    debug!(bytes = written, "worker cancelled mid-stream");
                    return Ok(WorkerOutcome::Cancelled);
                }
                Err(error) => match self.policy.should_retry(classify(&error), &mut budget) {
                    RetryDecision::Retry { delay, attempt } => {
                        warn!(
                            %error,
                            attempt,
                            resume_from = written,
                            delay_ms = delay.as_millis(),
                            "worker attempt failed, retrying remainder"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(%reason, "worker failure is final");
                        self.cancel.store(true, Ordering::SeqCst);
                        return Err(error);
                    }
                },
            }
        }
    }

    /// Performs one fetch attempt, resuming from `written` bytes into the
    /// chunk.
    async fn attempt(
        &mut self,
        client: &HttpClient,
        url: &str,
        path: &Path,
        written: &mut u64,
    ) -> Result<AttemptEnd, TransferError> {
        match self.mode {
            WorkerMode::Ranged { start, length } => {
                if *written >= length {
                    return Ok(AttemptEnd::Complete);
                }
                let lo = start + *written;
                let hi = start + length - 1;
                let response = client.get(url, Some(&format!("bytes={lo}-{hi}"))).await?;

                // A full-body answer here would overwrite bytes owned by
                // other workers; stop before writing anything. The same
                // applies to a 206 for a range other than the one asked.
                if !HttpClient::is_partial_content(&response)
                    || content_range_start(&response) != Some(lo)
                {
                    return Err(TransferError::RangeNotSupported {
                        url: url.to_string(),
                    });
                }

                let end = self
                    .stream_to_offset(response, path, lo, Some(length - *written), false, written)
                    .await?;
                if matches!(end, AttemptEnd::Cancelled) {
                    return Ok(AttemptEnd::Cancelled);
                }
                if *written < length {
                    // The body ended cleanly but short; retry the suffix.
                    return Err(TransferError::truncated(url, length, *written));
                }
                Ok(AttemptEnd::Complete)
            }

            WorkerMode::Sequential { resumable } => {
                if *written > 0 && resumable {
                    let response = client.get(url, Some(&format!("bytes={written}-"))).await?;
                    if HttpClient::is_partial_content(&response) {
                        // A 206 for some other offset cannot be spliced in
                        // safely.
                        if content_range_start(&response) != Some(*written) {
                            return Err(TransferError::RangeNotSupported {
                                url: url.to_string(),
                            });
                        }
                        let offset = *written;
                        return self
                            .stream_to_offset(response, path, offset, None, false, written)
                            .await;
                    }
                    // The server ignored the resume range and sent the whole
                    // body; write it from the beginning instead.
                    debug!("resume range ignored, restarting stream from zero");
                    self.reset_progress(written);
                    return self
                        .stream_to_offset(response, path, 0, None, true, written)
                        .await;
                }

                self.reset_progress(written);
                let response = client.get(url, None).await?;
                self.stream_to_offset(response, path, 0, None, true, written)
                    .await
            }
        }
    }

    /// Streams a response body into the destination file starting at
    /// `offset`, honoring an optional byte limit and the cancellation flag.
    ///
    /// `truncate` discards any existing file content first; sequential
    /// restarts use it so a shorter second body cannot leave a stale tail.
    async fn stream_to_offset(
        &self,
        response: reqwest::Response,
        path: &Path,
        offset: u64,
        limit: Option<u64>,
        truncate: bool,
        written: &mut u64,
    ) -> Result<AttemptEnd, TransferError> {
        let url = response.url().to_string();
        let file = OpenOptions::new()
            .write(true)
            .truncate(truncate)
            .open(path)
            .await
            .map_err(|e| TransferError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| TransferError::io(path, e))?;

        let mut remaining = limit;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            if self.cancel.load(Ordering::SeqCst) {
                writer
                    .flush()
                    .await
                    .map_err(|e| TransferError::io(path, e))?;
                return Ok(AttemptEnd::Cancelled);
            }

            let mut chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(error) => {
                    // Bytes already counted may still sit in the write
                    // buffer; flush before surfacing the body error so the
                    // resume offset matches what actually reached the file.
                    writer
                        .flush()
                        .await
                        .map_err(|e| TransferError::io(path, e))?;
                    return Err(TransferError::network(&url, error));
                }
            };

            // Never write past the owned range, even if the server sends
            // more than asked for.
            if let Some(room) = remaining {
                if chunk.len() as u64 > room {
                    #[allow(clippy::cast_possible_truncation)]
                    chunk.truncate(room as usize);
                }
            }
            if chunk.is_empty() {
                continue;
            }

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(path, e))?;

            let len = chunk.len() as u64;
            *written += len;
            self.bytes_written.fetch_add(len, Ordering::Relaxed);
            if let Some(room) = remaining.as_mut() {
                *room -= len;
                if *room == 0 {
                    break;
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| TransferError::io(path, e))?;
        Ok(AttemptEnd::Complete)
    }

    /// Discards partial progress before a from-scratch restart.
    fn reset_progress(&self, written: &mut u64) {
        if *written > 0 {
            self.bytes_written
                .fetch_sub(*written, Ordering::Relaxed);
            *written = 0;
        }
    }
}

/// Extracts the start offset from a response's `Content-Range` header,
/// e.g. `bytes 100-149/200` yields `100`.
fn content_range_start(response: &reqwest::Response) -> Option<u64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}
