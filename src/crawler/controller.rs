//! Termination and reporting controller
//!
//! A single loop multiplexes four event sources:
//! - operator interrupt
//! - report timer
//! - worker task exits
//! - harvested items
//!
//! Exactly one event is handled per iteration. The loop ends in STOPPED on
//! interrupt, on the duplicate threshold, when every producer is gone, or on a
//! fatal worker/store error.

use crate::config::Config;
use crate::crawler::pool::{WorkerExit, WorkerPool};
use crate::store::{DedupEngine, Outcome};
use crate::{HarvestError, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The consecutive-duplicate run reached the configured threshold
    DuplicateThreshold,
    /// The operator sent an interrupt
    Interrupted,
    /// Every worker exited and the channel drained
    ProducersGone,
}

/// Final state of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    /// Distinct fingerprints known at stop time
    pub distinct: usize,
    /// Status lines emitted during the run
    pub reports: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            StopReason::DuplicateThreshold => write!(
                f,
                "Duplicate limit reached, stopping. Total records: {}",
                self.distinct
            ),
            StopReason::Interrupted => {
                write!(f, "CTRL-C: stopping. Total records: {}", self.distinct)
            }
            StopReason::ProducersGone => write!(
                f,
                "All workers stopped. Total records: {}",
                self.distinct
            ),
        }
    }
}

enum Event {
    Interrupt,
    Tick,
    WorkerExit(WorkerExit),
    Item(Option<String>),
}

/// Drives the dedup engine from the worker channel
pub struct Controller {
    engine: DedupEngine,
    report_period: Duration,
    dup_to_stop: u64,
    reports: u64,
}

impl Controller {
    pub fn new(engine: DedupEngine, report_period: Duration, dup_to_stop: u64) -> Self {
        Self {
            engine,
            report_period,
            dup_to_stop,
            reports: 0,
        }
    }

    pub fn from_config(engine: DedupEngine, config: &Config) -> Self {
        Self::new(engine, config.report_period(), config.dup_to_stop)
    }

    /// Runs until STOPPED
    ///
    /// # Arguments
    ///
    /// * `pool` - Source of items and worker exits
    /// * `interrupt` - Resolves when the operator asks to stop
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Normal stop (threshold, interrupt, producers gone)
    /// * `Err(HarvestError)` - A worker failed fatally or an append failed
    pub async fn run<I>(&mut self, pool: &mut WorkerPool, interrupt: I) -> Result<RunSummary>
    where
        I: Future<Output = ()>,
    {
        tokio::pin!(interrupt);

        let mut ticker = interval_at(Instant::now() + self.report_period, self.report_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let (items, workers) = pool.channels();

        loop {
            let event = tokio::select! {
                biased;
                _ = &mut interrupt => Event::Interrupt,
                _ = ticker.tick() => Event::Tick,
                Some(exit) = workers.join_next() => Event::WorkerExit(exit),
                item = items.recv() => Event::Item(item),
            };

            match event {
                Event::Interrupt => return Ok(self.stop(StopReason::Interrupted)),

                Event::Tick => self.report(),

                Event::WorkerExit(exit) => {
                    if let Err(e) = fatal(exit) {
                        tracing::error!("Worker failed: {}", e);
                        return Err(e);
                    }
                    tracing::warn!("A worker exited while the run was active");
                }

                Event::Item(None) => {
                    // Senders drop before their task's result is ready
                    while let Some(exit) = workers.join_next().await {
                        if let Err(e) = fatal(exit) {
                            tracing::error!("Worker failed: {}", e);
                            return Err(e);
                        }
                    }
                    return Ok(self.stop(StopReason::ProducersGone));
                }
                Event::Item(Some(item)) => {
                    if let Some(reason) = self.handle_item(&item)? {
                        return Ok(self.stop(reason));
                    }
                }
            }
        }
    }

    /// Feeds one item to the engine and checks the duplicate threshold
    fn handle_item(&mut self, item: &str) -> Result<Option<StopReason>> {
        let outcome = self.engine.ingest(item)?;

        if outcome == Outcome::Duplicate && self.engine.duplicate_run() == self.dup_to_stop {
            return Ok(Some(StopReason::DuplicateThreshold));
        }

        Ok(None)
    }

    fn report(&mut self) {
        let report = self.engine.take_report(self.report_period);
        self.reports += 1;
        println!("{}", report);
        tracing::debug!(
            "Report {}: {} items this period",
            self.reports,
            report.items
        );
    }

    fn stop(&self, reason: StopReason) -> RunSummary {
        tracing::info!("Stopping: {:?}", reason);
        RunSummary {
            reason,
            distinct: self.engine.distinct(),
            reports: self.reports,
        }
    }

    pub fn engine(&self) -> &DedupEngine {
        &self.engine
    }
}

/// A worker that returned an error or panicked ends the run
fn fatal(exit: WorkerExit) -> Result<()> {
    match exit {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HarvestError::Fetch(e)),
        Err(e) => Err(HarvestError::Worker(e)),
    }
}
