//! Aggregate progress sampling, throughput, and ETA estimation.
//!
//! The orchestrator samples the workers' byte counters on a fixed tick and
//! feeds them into a [`SpeedWindow`], a fixed-length sliding window of
//! `(instant, total bytes)` samples. Throughput is the byte delta between
//! the newest and oldest sample divided by the elapsed time between them;
//! the ETA follows from the remaining bytes. Both degrade to "unknown"
//! instead of dividing by zero.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Interval between progress samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Number of samples kept in the sliding window.
pub const WINDOW_CAPACITY: usize = 10;

/// Fixed-length sliding window of `(instant, cumulative bytes)` samples.
#[derive(Debug)]
pub struct SpeedWindow {
    samples: VecDeque<(Instant, u64)>,
    capacity: usize,
}

impl Default for SpeedWindow {
    fn default() -> Self {
        Self::new(WINDOW_CAPACITY)
    }
}

impl SpeedWindow {
    /// Creates a window holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
        }
    }

    /// Records a sample, evicting the oldest when the window is full.
    pub fn push(&mut self, at: Instant, total_bytes: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((at, total_bytes));
    }

    /// Instantaneous throughput over the window, in bytes per second.
    ///
    /// Returns `None` with fewer than two samples or when the elapsed time
    /// between the oldest and newest sample is too small to divide by.
    #[must_use]
    pub fn bytes_per_sec(&self) -> Option<f64> {
        let (oldest_at, oldest_bytes) = self.samples.front()?;
        let (newest_at, newest_bytes) = self.samples.back()?;
        if self.samples.len() < 2 {
            return None;
        }

        let elapsed = newest_at.duration_since(*oldest_at).as_secs_f64();
        if elapsed <= f64::EPSILON {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        Some((newest_bytes.saturating_sub(*oldest_bytes)) as f64 / elapsed)
    }
}

/// A point-in-time view of the whole transfer, recomputed each tick.
/// Never authoritative: always derivable from the worker counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes written so far, summed over all workers.
    pub bytes_downloaded: u64,
    /// Expected total, when the probe reported one.
    pub total_bytes: Option<u64>,
    /// Throughput over the sliding window, when computable.
    pub bytes_per_sec: Option<f64>,
    /// Estimated time remaining, when computable.
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    /// Builds a snapshot, deriving the ETA from the remaining bytes and the
    /// window throughput. The ETA is `None` when the total is unknown or the
    /// throughput is zero or unknown.
    #[must_use]
    pub fn new(bytes_downloaded: u64, total_bytes: Option<u64>, bytes_per_sec: Option<f64>) -> Self {
        let eta = match (total_bytes, bytes_per_sec) {
            (Some(total), Some(speed)) if speed > 0.0 => {
                #[allow(clippy::cast_precision_loss)]
                let remaining = total.saturating_sub(bytes_downloaded) as f64;
                Some(Duration::from_secs_f64(remaining / speed))
            }
            _ => None,
        };
        Self {
            bytes_downloaded,
            total_bytes,
            bytes_per_sec,
            eta,
        }
    }

    /// Completion percentage, when the total is known and non-zero.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        match self.total_bytes {
            #[allow(clippy::cast_precision_loss)]
            Some(total) if total > 0 => {
                Some(self.bytes_downloaded as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }

    /// Human-readable one-line summary:
    /// `"<speed>/s, <percent>%, ETA <time>, <done>/<total>"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let speed = match self.bytes_per_sec {
            Some(speed) => format!("{}/s", format_size(speed)),
            None => "unknown/s".to_string(),
        };
        let percent = match self.percent() {
            Some(percent) => format!("{percent:.2}%"),
            None => "--%".to_string(),
        };
        let eta = match self.eta {
            Some(eta) => format_eta(eta),
            None => "unknown".to_string(),
        };
        #[allow(clippy::cast_precision_loss)]
        let done = format_size(self.bytes_downloaded as f64);
        let total = match self.total_bytes {
            #[allow(clippy::cast_precision_loss)]
            Some(total) => format_size(total as f64),
            None => "unknown".to_string(),
        };
        format!("{speed}, {percent}, ETA {eta}, {done}/{total}")
    }
}

/// Formats a byte count with a 1024 unit ladder and two decimals.
#[must_use]
pub fn format_size(bytes: f64) -> String {
    let mut value = bytes;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}

/// Formats a duration as whole hours, minutes, and seconds, omitting the
/// larger units when zero.
#[must_use]
pub fn format_eta(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let (minutes, secs) = (total_secs / 60, total_secs % 60);
    let mut formatted = format!("{secs} s");
    if minutes > 0 {
        let (hours, minutes) = (minutes / 60, minutes % 60);
        formatted = format!("{minutes} min {formatted}");
        if hours > 0 {
            formatted = format!("{hours} h {formatted}");
        }
    }
    formatted
}
