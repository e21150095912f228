//! Chunk planner: partitions the byte space of a transfer.
//!
//! Given the probe result and configuration, the planner decides between a
//! single sequential stream and a set of contiguous, non-overlapping chunks
//! fetched in parallel. The decision and the partition are deterministic:
//! the same inputs always produce the same plan.

/// Default number of parallel workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default minimum resource size for parallel chunking (8 MiB).
pub const DEFAULT_PARALLELISM_THRESHOLD: u64 = 8 * 1024 * 1024;

/// One contiguous byte range owned by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Position of this chunk in the plan.
    pub index: usize,
    /// First byte offset of the chunk.
    pub start: u64,
    /// Number of bytes in the chunk.
    pub length: u64,
}

impl ChunkSpec {
    /// Exclusive end offset of the chunk.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// How a transfer will be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkPlan {
    /// One worker streams the whole resource in order.
    Sequential {
        /// Declared total size, if the server reported one.
        total_size: Option<u64>,
        /// Whether a failed stream may resume mid-file with a range request.
        resumable: bool,
    },
    /// Multiple workers fetch disjoint ranges concurrently.
    Parallel {
        /// The partition, ordered by start offset. Chunks are contiguous,
        /// non-overlapping, and their lengths sum to the total size.
        chunks: Vec<ChunkSpec>,
    },
}

impl ChunkPlan {
    /// Number of workers this plan requires.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        match self {
            Self::Sequential { .. } => 1,
            Self::Parallel { chunks } => chunks.len(),
        }
    }

    /// Total expected bytes, when known.
    #[must_use]
    pub fn total_size(&self) -> Option<u64> {
        match self {
            Self::Sequential { total_size, .. } => *total_size,
            Self::Parallel { chunks } => Some(chunks.iter().map(|c| c.length).sum()),
        }
    }
}

/// Builds a transfer plan.
///
/// Sequential mode is chosen when the size is unknown, the server does not
/// honor byte ranges, or the resource is at most `threshold` bytes. Otherwise
/// the byte space is cut into `worker_count` chunks of
/// `ceil(total / worker_count)` bytes, the last truncated to the remainder.
/// When the chunk size exceeds the remaining bytes early (tiny resources with
/// many workers), the plan simply contains fewer chunks.
#[must_use]
pub fn plan(
    total_size: Option<u64>,
    range_supported: bool,
    worker_count: usize,
    threshold: u64,
) -> ChunkPlan {
    let Some(total) = total_size else {
        return ChunkPlan::Sequential {
            total_size: None,
            resumable: range_supported,
        };
    };

    if !range_supported || total <= threshold || worker_count <= 1 {
        return ChunkPlan::Sequential {
            total_size: Some(total),
            resumable: range_supported,
        };
    }

    let chunk_size = total.div_ceil(worker_count as u64);
    let mut chunks = Vec::with_capacity(worker_count);
    let mut start = 0u64;
    while start < total {
        let length = chunk_size.min(total - start);
        chunks.push(ChunkSpec {
            index: chunks.len(),
            start,
            length,
        });
        start += length;
    }

    ChunkPlan::Parallel { chunks }
}
