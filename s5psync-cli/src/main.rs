//! s5psync CLI - command-line front end for the ingestion pipeline.
//!
//! Wires configuration (INI file and/or flags), logging, and the ingestor.
//! The partition is an explicit parameter; there is no interactive input.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use s5psync::config::DEFAULT_RETRY_DELAY_SECS;
use s5psync::{IngestConfig, Ingestor, NetcdfProbe, Partition, ReqwestTransport, RetryPolicy, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "s5psync", version, about = "Sentinel-5P archive ingestion")]
struct Args {
    /// INI configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing CSV manifest listings.
    #[arg(long)]
    manifest_dir: Option<PathBuf>,

    /// Directory downloads are written into.
    #[arg(long)]
    incoming_dir: Option<PathBuf>,

    /// Directory of files already handed off downstream.
    #[arg(long)]
    processed_dir: Option<PathBuf>,

    /// Month-range partition to process (1, 2 or 3).
    #[arg(short, long)]
    partition: Option<Partition>,

    /// Maximum simultaneously in-flight downloads.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum download attempts per file.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Delay between attempts in seconds (fixed backoff).
    #[arg(long)]
    retry_delay_secs: Option<u64>,

    /// Use exponential backoff instead of a fixed delay.
    #[arg(long)]
    exponential_backoff: bool,

    /// Re-probe files in the processed directory instead of trusting them.
    #[arg(long)]
    no_trust_processed: bool,

    /// Default log filter (overridable via RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    s5psync::telemetry::init(&args.log_level);

    match run(args).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "ingestion run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunSummary, Box<dyn Error>> {
    let config = build_config(&args)?;
    let transport = ReqwestTransport::new(config.credentials.clone())?;
    let ingestor = Ingestor::new(config, transport, NetcdfProbe);
    Ok(ingestor.run().await?)
}

fn build_config(args: &Args) -> Result<IngestConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => IngestConfig::from_ini(path)?,
        None => {
            let require = |value: &Option<PathBuf>, flag: &str| -> Result<PathBuf, Box<dyn Error>> {
                value
                    .clone()
                    .ok_or_else(|| format!("{} is required without --config", flag).into())
            };
            let partition = args
                .partition
                .ok_or("--partition is required without --config")?;
            IngestConfig::new(
                require(&args.manifest_dir, "--manifest-dir")?,
                require(&args.incoming_dir, "--incoming-dir")?,
                require(&args.processed_dir, "--processed-dir")?,
                partition,
            )
        }
    };

    if let Some(partition) = args.partition {
        config.partition = partition;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrent_downloads = concurrency;
    }
    if args.max_attempts.is_some() || args.retry_delay_secs.is_some() || args.exponential_backoff {
        let max_attempts = args.max_attempts.unwrap_or(config.retry.max_attempts());
        config.retry = if args.exponential_backoff {
            RetryPolicy::exponential(max_attempts)
        } else {
            let delay = args.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS);
            RetryPolicy::fixed(max_attempts, Duration::from_secs(delay))
        };
    }
    if args.no_trust_processed {
        config.trust_processed = false;
    }

    Ok(config)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Downloaded {} of {} candidates ({} bytes) in {:.1}s; {} abandoned, {} already valid.",
        summary.completed,
        summary.attempted,
        summary.bytes,
        summary.elapsed.as_secs_f64(),
        summary.abandoned,
        summary.already_valid,
    );
}
