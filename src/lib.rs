//! Parget Core Library
//!
//! This library implements a resumable, concurrent HTTP file-transfer
//! engine: resources are probed for size and byte-range support, split into
//! chunks, fetched by parallel workers with positioned writes, and resumed
//! mid-chunk after transient failures.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`client`] - HTTP client shared by the probe and the workers
//! - [`probe`] - Resource metadata discovery (size, range support)
//! - [`plan`] - Partitioning of the byte space into chunks
//! - [`worker`] - Per-chunk fetch tasks with retry and resume
//! - [`progress`] - Sliding-window throughput and ETA estimation
//! - [`engine`] - End-to-end transfer orchestration
//! - [`retry`] - Error classification and per-kind retry budgets
//! - [`error`] - The crate-wide error type
//! - [`filename`] - Destination filename derivation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod engine;
pub mod error;
pub mod filename;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod worker;

// Re-export commonly used types
pub use client::{DEFAULT_ATTEMPT_TIMEOUT, HttpClient};
pub use engine::{TransferConfig, TransferEngine, TransferOutcome, TransferRequest};
pub use error::TransferError;
pub use plan::{
    ChunkPlan, ChunkSpec, DEFAULT_PARALLELISM_THRESHOLD, DEFAULT_WORKER_COUNT, plan,
};
pub use probe::{ProbeResult, probe};
pub use progress::{ProgressSnapshot, SpeedWindow};
pub use retry::{DEFAULT_MAX_RETRIES, ErrorKind, RetryDecision, RetryPolicy, classify};
