//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use parget::{DEFAULT_MAX_RETRIES, DEFAULT_PARALLELISM_THRESHOLD, DEFAULT_WORKER_COUNT};

/// Download a file over HTTP with parallel, resumable chunk transfers.
///
/// Parget probes the server for byte-range support, splits large resources
/// into chunks fetched concurrently, and resumes interrupted chunks from
/// where they stopped.
#[derive(Parser, Debug)]
#[command(name = "parget")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the file to download
    pub url: String,

    /// Directory to save the file into
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Destination filename (derived from the URL if omitted)
    #[arg(short = 'n', long)]
    pub filename: Option<String>,

    /// Number of parallel chunk workers (1-19)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKER_COUNT as u8, value_parser = clap::value_parser!(u8).range(1..=19))]
    pub workers: u8,

    /// Minimum file size in bytes for parallel chunking
    #[arg(long, default_value_t = DEFAULT_PARALLELISM_THRESHOLD)]
    pub threshold: u64,

    /// Per-attempt timeout in seconds (connect and per-read)
    #[arg(short = 't', long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// Maximum retry attempts per transient failure kind (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["parget", "https://example.com/f.bin"]).unwrap();
        assert_eq!(args.url, "https://example.com/f.bin");
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.filename, None);
        assert_eq!(args.workers, 4); // DEFAULT_WORKER_COUNT
        assert_eq!(args.threshold, 8 * 1024 * 1024); // DEFAULT_PARALLELISM_THRESHOLD
        assert_eq!(args.timeout, 30);
        assert_eq!(args.max_retries, 3); // DEFAULT_MAX_RETRIES
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_missing_url_rejected() {
        let result = Args::try_parse_from(["parget"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["parget", "-v", "http://x/y"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["parget", "-vv", "http://x/y"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["parget", "-q", "http://x/y"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        // --help causes early exit, so we check it returns an error with Help kind
        let result = Args::try_parse_from(["parget", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["parget", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    // ==================== Workers Tests ====================

    #[test]
    fn test_cli_workers_short_flag() {
        let args = Args::try_parse_from(["parget", "-w", "8", "http://x/y"]).unwrap();
        assert_eq!(args.workers, 8);
    }

    #[test]
    fn test_cli_workers_min_and_max() {
        let args = Args::try_parse_from(["parget", "-w", "1", "http://x/y"]).unwrap();
        assert_eq!(args.workers, 1);

        let args = Args::try_parse_from(["parget", "-w", "19", "http://x/y"]).unwrap();
        assert_eq!(args.workers, 19);
    }

    #[test]
    fn test_cli_workers_zero_rejected() {
        let result = Args::try_parse_from(["parget", "-w", "0", "http://x/y"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_workers_over_max_rejected() {
        let result = Args::try_parse_from(["parget", "-w", "20", "http://x/y"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Max Retries Tests ====================

    #[test]
    fn test_cli_max_retries_zero_allowed() {
        // 0 retries means no retry, just single attempt
        let args = Args::try_parse_from(["parget", "-r", "0", "http://x/y"]).unwrap();
        assert_eq!(args.max_retries, 0);
    }

    #[test]
    fn test_cli_max_retries_over_max_rejected() {
        let result = Args::try_parse_from(["parget", "-r", "11", "http://x/y"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Other Flags ====================

    #[test]
    fn test_cli_output_dir_and_filename() {
        let args = Args::try_parse_from([
            "parget",
            "-o",
            "/tmp/dl",
            "-n",
            "renamed.bin",
            "http://x/y",
        ])
        .unwrap();
        assert_eq!(args.output_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(args.filename.as_deref(), Some("renamed.bin"));
    }

    #[test]
    fn test_cli_timeout_zero_rejected() {
        let result = Args::try_parse_from(["parget", "-t", "0", "http://x/y"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_combined_all_flags() {
        let args = Args::try_parse_from([
            "parget",
            "-w",
            "8",
            "-r",
            "5",
            "-t",
            "60",
            "--threshold",
            "1048576",
            "http://x/y",
        ])
        .unwrap();
        assert_eq!(args.workers, 8);
        assert_eq!(args.max_retries, 5);
        assert_eq!(args.timeout, 60);
        assert_eq!(args.threshold, 1_048_576);
    }
}
