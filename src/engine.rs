//! Transfer engine: orchestrates probe, planning, workers, and progress.
//!
//! This module provides the [`TransferEngine`] which drives one transfer
//! end to end: it probes the resource, builds a chunk plan, pre-allocates
//! the destination file, runs one worker task per chunk, and samples their
//! byte counters on a fixed tick to report aggregate progress.
//!
//! # Example
//!
//! ```no_run
//! use parget::engine::{TransferConfig, TransferEngine, TransferRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TransferEngine::new(TransferConfig::default())?;
//! let outcome = engine
//!     .transfer(TransferRequest::new(
//!         "https://example.com/data.bin",
//!         "./downloads",
//!     ))
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::client::{DEFAULT_ATTEMPT_TIMEOUT, HttpClient};
use crate::error::TransferError;
use crate::filename::{filename_from_url, sanitize_filename};
use crate::plan::{ChunkPlan, DEFAULT_PARALLELISM_THRESHOLD, DEFAULT_WORKER_COUNT, plan};
use crate::probe::probe;
use crate::progress::{ProgressSnapshot, SAMPLE_INTERVAL, SpeedWindow};
use crate::retry::{DEFAULT_MAX_RETRIES, RetryPolicy};
use crate::worker::{ChunkWorker, WorkerMode, WorkerOutcome};

/// Minimum allowed worker count.
const MIN_WORKER_COUNT: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKER_COUNT: usize = 19;

/// Tuning knobs for a [`TransferEngine`].
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Number of parallel chunk workers (1-19).
    pub worker_count: usize,
    /// Resources at most this many bytes are fetched sequentially.
    pub parallelism_threshold: u64,
    /// Per-attempt timeout, applied to connect and to each body read.
    /// Also used as the fixed backoff between retry attempts.
    pub attempt_timeout: Duration,
    /// Retry budget per transient error kind.
    pub max_retries: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            parallelism_threshold: DEFAULT_PARALLELISM_THRESHOLD,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// One transfer to perform.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source URL.
    pub url: String,
    /// Directory the file is written into.
    pub dest_dir: PathBuf,
    /// Explicit destination filename; derived from the URL when `None`.
    pub filename: Option<String>,
}

impl TransferRequest {
    /// Creates a request with the filename derived from the URL.
    pub fn new(url: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest_dir: dest_dir.into(),
            filename: None,
        }
    }

    /// Overrides the destination filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// How a transfer ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file was fully downloaded and verified.
    Completed {
        /// Destination path.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// The destination already existed; nothing was fetched.
    AlreadyExists {
        /// The pre-existing path.
        path: PathBuf,
    },
}

/// Orchestrates chunked, resumable transfers.
///
/// # Concurrency Model
///
/// - Each chunk runs in its own Tokio task with its own file handle
/// - Workers publish progress through lock-free atomic byte counters
/// - The engine samples the counters on a fixed tick for aggregate progress
/// - A fatal worker failure raises a shared flag that stops the siblings
#[derive(Debug)]
pub struct TransferEngine {
    client: HttpClient,
    config: TransferConfig,
    policy: RetryPolicy,
}

impl TransferEngine {
    /// Creates an engine from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidWorkerCount`] if `worker_count` is
    /// outside the valid range (1-19).
    pub fn new(config: TransferConfig) -> Result<Self, TransferError> {
        if !(MIN_WORKER_COUNT..=MAX_WORKER_COUNT).contains(&config.worker_count) {
            return Err(TransferError::InvalidWorkerCount {
                value: config.worker_count,
            });
        }

        debug!(
            worker_count = config.worker_count,
            parallelism_threshold = config.parallelism_threshold,
            attempt_timeout_ms = config.attempt_timeout.as_millis(),
            max_retries = config.max_retries,
            "creating transfer engine"
        );

        let client = HttpClient::new(config.attempt_timeout);
        let policy = RetryPolicy::new(config.max_retries, config.attempt_timeout);
        Ok(Self {
            client,
            config,
            policy,
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Runs one transfer without progress reporting.
    ///
    /// # Errors
    ///
    /// See [`TransferEngine::transfer_with_progress`].
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferOutcome, TransferError> {
        self.transfer_with_progress(request, |_| {}).await
    }

    /// Runs one transfer, invoking `on_progress` with a fresh snapshot on
    /// every sample tick and once more when the workers finish.
    ///
    /// On failure the partial destination file is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidUrl`] for unparseable URLs,
    /// [`TransferError::WorkerFailed`] wrapping the first worker error,
    /// [`TransferError::SizeMismatch`] when the final file length does not
    /// match the declared total, and probe or I/O errors as they occur.
    #[instrument(skip(self, request, on_progress), fields(url = %request.url))]
    pub async fn transfer_with_progress<F>(
        &self,
        request: TransferRequest,
        mut on_progress: F,
    ) -> Result<TransferOutcome, TransferError>
    where
        F: FnMut(ProgressSnapshot),
    {
        let url = Url::parse(&request.url)
            .map_err(|_| TransferError::invalid_url(&request.url))?;

        let filename = match &request.filename {
            Some(name) => sanitize_filename(name),
            None => filename_from_url(&url),
        };
        let path = request.dest_dir.join(&filename);

        // Existing files are never clobbered; skip before touching the
        // network.
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| TransferError::io(&path, e))?
        {
            info!(path = %path.display(), "destination exists, skipping");
            return Ok(TransferOutcome::AlreadyExists { path });
        }

        let probed = probe(&self.client, url.as_str(), &self.policy).await?;
        let plan = plan(
            probed.total_size,
            probed.supports_ranges,
            self.config.worker_count,
            self.config.parallelism_threshold,
        );
        info!(
            total_size = ?probed.total_size,
            supports_ranges = probed.supports_ranges,
            workers = plan.worker_count(),
            "transfer planned"
        );

        tokio::fs::create_dir_all(&request.dest_dir)
            .await
            .map_err(|e| TransferError::io(&request.dest_dir, e))?;
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| TransferError::io(&path, e))?;
        if matches!(plan, ChunkPlan::Parallel { .. })
            && let Some(total) = plan.total_size()
        {
            // Pre-allocate so ranged workers can write at their offsets.
            // Sequential streams grow the file as they go, which keeps the
            // final length check able to catch a short body.
            file.set_len(total)
                .await
                .map_err(|e| TransferError::io(&path, e))?;
        }
        drop(file);

        let total_size = plan.total_size();
        let (counters, handles) = self.spawn_workers(&plan, url.as_str(), &path);

        // Sample the worker counters between polls of the join future so
        // progress keeps flowing while the workers run.
        let mut window = SpeedWindow::default();
        let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
        let mut join_all = Box::pin(futures_util::future::join_all(handles));
        let results = loop {
            tokio::select! {
                results = &mut join_all => break results,
                _ = interval.tick() => {
                    let downloaded: u64 =
                        counters.iter().map(|c| c.load(Ordering::Relaxed)).sum();
                    window.push(Instant::now(), downloaded);
                    on_progress(ProgressSnapshot::new(
                        downloaded,
                        total_size,
                        window.bytes_per_sec(),
                    ));
                }
            }
        };

        let downloaded: u64 = counters.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        window.push(Instant::now(), downloaded);
        on_progress(ProgressSnapshot::new(
            downloaded,
            total_size,
            window.bytes_per_sec(),
        ));

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(WorkerOutcome::Completed)) => {}
                Ok(Ok(WorkerOutcome::Cancelled)) => {
                    debug!(index, "worker cancelled");
                }
                Ok(Err(error)) => {
                    warn!(index, %error, "worker failed, partial file left in place");
                    return Err(TransferError::worker_failed(index, error));
                }
                Err(join_error) => {
                    warn!(index, %join_error, "worker task panicked");
                    return Err(TransferError::unknown(format!(
                        "worker task {index} panicked: {join_error}"
                    )));
                }
            }
        }

        let written = tokio::fs::metadata(&path)
            .await
            .map_err(|e| TransferError::io(&path, e))?
            .len();
        if let Some(expected) = total_size
            && written != expected
        {
            return Err(TransferError::size_mismatch(&path, expected, written));
        }

        info!(path = %path.display(), bytes = written, "transfer complete");
        Ok(TransferOutcome::Completed {
            path,
            bytes: written,
        })
    }

    /// Spawns one worker task per chunk of the plan, returning the shared
    /// byte counters (in chunk order) and the join handles.
    fn spawn_workers(
        &self,
        plan: &ChunkPlan,
        url: &str,
        path: &std::path::Path,
    ) -> (
        Vec<Arc<AtomicU64>>,
        Vec<tokio::task::JoinHandle<Result<WorkerOutcome, TransferError>>>,
    ) {
        let cancel = Arc::new(AtomicBool::new(false));
        let modes: Vec<WorkerMode> = match plan {
            ChunkPlan::Sequential { resumable, .. } => vec![WorkerMode::Sequential {
                resumable: *resumable,
            }],
            ChunkPlan::Parallel { chunks } => chunks
                .iter()
                .map(|c| WorkerMode::Ranged {
                    start: c.start,
                    length: c.length,
                })
                .collect(),
        };

        let mut counters = Vec::with_capacity(modes.len());
        let mut handles = Vec::with_capacity(modes.len());
        for (index, mode) in modes.into_iter().enumerate() {
            let counter = Arc::new(AtomicU64::new(0));
            let worker = ChunkWorker::new(
                index,
                mode,
                self.policy.clone(),
                Arc::clone(&counter),
                Arc::clone(&cancel),
            );
            let client = self.client.clone();
            let url = url.to_string();
            let path = path.to_path_buf();
            counters.push(counter);
            handles.push(tokio::spawn(worker.run(client, url, path)));
        }
        (counters, handles)
    }
}
