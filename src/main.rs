//! CLI entry point for the parget tool.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use parget::{TransferConfig, TransferEngine, TransferOutcome, TransferRequest};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let engine = TransferEngine::new(TransferConfig {
        worker_count: usize::from(args.workers),
        parallelism_threshold: args.threshold,
        attempt_timeout: Duration::from_secs(args.timeout),
        max_retries: u32::from(args.max_retries),
    })?;

    let mut request = TransferRequest::new(&args.url, &args.output_dir);
    if let Some(filename) = &args.filename {
        request = request.with_filename(filename);
    }

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };

    let outcome = {
        let bar = bar.clone();
        engine
            .transfer_with_progress(request, move |snapshot| {
                bar.set_message(snapshot.summary());
            })
            .await
    };

    bar.finish_and_clear();

    match outcome {
        Ok(TransferOutcome::Completed { path, bytes }) => {
            info!(path = %path.display(), bytes, "download complete");
            println!("saved {} ({bytes} bytes)", path.display());
        }
        Ok(TransferOutcome::AlreadyExists { path }) => {
            warn!(path = %path.display(), "file already exists, nothing to do");
            println!("{} already exists, skipping", path.display());
        }
        Err(error) => return Err(error.into()),
    }

    Ok(())
}
