//! Crawler module for the harvest pipeline
//!
//! This module contains the producer/consumer pipeline:
//! - HTTP fetching of the target page
//! - HTML link extraction
//! - The fetch workers and the pool that supervises them
//! - The controller that drives dedup, reporting and termination

mod controller;
mod fetcher;
mod parser;
mod pool;
mod worker;

pub use controller::{Controller, RunSummary, StopReason};
pub use fetcher::{build_http_client, fetch_page};
pub use parser::extract_links;
pub use pool::{WorkerExit, WorkerPool};
pub use worker::FetchWorker;

use crate::config::Config;
use crate::store::{DedupEngine, HashStore};
use crate::HarvestError;
use std::future::Future;

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Load the hash store from the fingerprint log
/// 2. Open both logs for appending
/// 3. Build the HTTP client and start the worker pool
/// 4. Run the controller until STOPPED
/// 5. Cancel the workers and wait briefly for them to exit
///
/// Nothing is persisted after the controller stops.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `interrupt` - Resolves when the operator asks to stop
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run stopped normally
/// * `Err(HarvestError)` - Startup failed, a worker failed fatally, or an append failed
///
/// # Example
///
/// ```no_run
/// use quote_harvest::config::Config;
/// use quote_harvest::crawler::harvest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::new("https://quotes.example.com/");
/// let summary = harvest(&config, async {
///     let _ = tokio::signal::ctrl_c().await;
/// })
/// .await?;
/// println!("{}", summary);
/// # Ok(())
/// # }
/// ```
pub async fn harvest<I>(config: &Config, interrupt: I) -> Result<RunSummary, HarvestError>
where
    I: Future<Output = ()>,
{
    let hash_file_found = config.hash_file.exists();
    if hash_file_found {
        println!("Reading fingerprints from {}...", config.hash_file.display());
    } else {
        println!(
            "Fingerprint log {} not found, a new one will be created.",
            config.hash_file.display()
        );
    }

    let store = HashStore::load(&config.hash_file)?;
    if hash_file_found {
        println!("Done. Fingerprints loaded: {}", store.size());
    }

    let engine = DedupEngine::open(store, &config.hash_file, &config.quotes_file)?;

    let client = build_http_client(&config.fetch)?;
    let mut pool = WorkerPool::spawn(config, client)?;
    println!("Workers started: {}", config.workers);

    let mut controller = Controller::from_config(engine, config);
    let outcome = controller.run(&mut pool, interrupt).await;

    pool.shutdown(config.shutdown_grace()).await;

    outcome
}
