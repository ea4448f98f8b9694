//! Quote-Harvest main entry point
//!
//! This is the command-line interface for the Quote-Harvest link harvester.

use clap::Parser;
use quote_harvest::config::{build_config, Overrides};
use quote_harvest::crawler::harvest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Quote-Harvest: a repeat-fetch link harvester
///
/// Fetches one page over and over, records every distinct link target it
/// finds, and stops after too many consecutive duplicates or on CTRL-C.
#[derive(Parser, Debug)]
#[command(name = "quote-harvest")]
#[command(version)]
#[command(about = "A repeat-fetch link harvester", long_about = None)]
struct Cli {
    /// Optional TOML configuration file (command-line flags take precedence)
    #[arg(short, long, value_name = "FILE", env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Page to harvest links from
    #[arg(long, visible_alias = "ws", value_name = "URL", env = "HARVEST_WEBSITE")]
    website: Option<String>,

    /// Number of concurrent fetch workers
    #[arg(short, long, env = "HARVEST_WORKERS")]
    workers: Option<usize>,

    /// Seconds between status reports
    #[arg(short, long, value_name = "SECS", env = "HARVEST_REPORT_INTERVAL")]
    report_interval: Option<u64>,

    /// Consecutive duplicates that stop the run
    #[arg(short, long, env = "HARVEST_DUP_TO_STOP")]
    dup_to_stop: Option<u64>,

    /// Fingerprint log path
    #[arg(long, visible_alias = "hf", value_name = "PATH", env = "HARVEST_HASH_FILE")]
    hash_file: Option<PathBuf>,

    /// Value log path
    #[arg(long, visible_alias = "qf", value_name = "PATH", env = "HARVEST_QUOTES_FILE")]
    quotes_file: Option<PathBuf>,

    /// Pause after each fetched page, in milliseconds
    #[arg(long, value_name = "MS")]
    fetch_delay_ms: Option<u64>,

    /// Per-request timeout, in seconds
    #[arg(long = "request-timeout", value_name = "SECS")]
    request_timeout_secs: Option<u64>,

    /// Retries for a failed fetch before the run aborts (0 = fail fast)
    #[arg(long)]
    fetch_retries: Option<u32>,

    /// Delay before the first retry, doubled on each further retry, in milliseconds
    #[arg(long, value_name = "MS")]
    retry_backoff_ms: Option<u64>,

    /// User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Items buffered between workers and the consumer
    #[arg(long)]
    channel_capacity: Option<usize>,

    /// How long to wait for workers after stopping, in milliseconds
    #[arg(long, value_name = "MS")]
    shutdown_grace_ms: Option<u64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            workers: self.workers,
            report_interval: self.report_interval,
            dup_to_stop: self.dup_to_stop,
            hash_file: self.hash_file.clone(),
            quotes_file: self.quotes_file.clone(),
            website: self.website.clone(),
            fetch_delay_ms: self.fetch_delay_ms,
            request_timeout_secs: self.request_timeout_secs,
            fetch_retries: self.fetch_retries,
            retry_backoff_ms: self.retry_backoff_ms,
            user_agent: self.user_agent.clone(),
            channel_capacity: self.channel_capacity,
            shutdown_grace_ms: self.shutdown_grace_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Build and validate configuration before any file is opened
    let (config, config_hash) = match build_config(cli.config.as_deref(), &cli.overrides()) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(hash) = config_hash {
        tracing::info!("Configuration file loaded (hash: {})", hash);
    }

    tracing::info!(
        "Harvesting {} with {} workers, stopping after {} consecutive duplicates",
        config.website,
        config.workers,
        config.dup_to_stop
    );

    match harvest(&config, interrupt_signal()).await {
        Ok(summary) => {
            println!("{}", summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quote_harvest=info,warn"),
            1 => EnvFilter::new("quote_harvest=debug,info"),
            2 => EnvFilter::new("quote_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves on the first CTRL-C
///
/// If the handler cannot be installed the run continues without it.
async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
}
