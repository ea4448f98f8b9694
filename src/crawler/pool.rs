//! Worker pool for the fetch workers
//!
//! This module handles:
//! - Spawning N workers that share one HTTP client and one bounded channel
//! - Supervising worker exits through a `JoinSet`
//! - Cancelling, then aborting, workers on shutdown

use crate::config::Config;
use crate::crawler::worker::FetchWorker;
use crate::url::parse_target;
use crate::{FetchError, HarvestError};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Exit status of one worker task as seen by the supervisor
pub type WorkerExit = Result<Result<(), FetchError>, JoinError>;

/// Owns the worker tasks and the receiving end of their shared channel
///
/// The channel holds at most `channel_capacity` items. Once it is full every
/// worker blocks in `send` until the consumer catches up, which is the only
/// backpressure in the pipeline.
pub struct WorkerPool {
    receiver: mpsc::Receiver<String>,
    tasks: JoinSet<Result<(), FetchError>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Starts `config.workers` fetch workers against `config.website`
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `client` - HTTP client shared by every worker
    ///
    /// # Returns
    ///
    /// * `Ok(WorkerPool)` - Workers are running
    /// * `Err(HarvestError)` - The target URL could not be parsed
    pub fn spawn(config: &Config, client: Client) -> Result<Self, HarvestError> {
        let target = parse_target(&config.website)?;
        let (sender, receiver) = mpsc::channel(config.pipeline.channel_capacity);
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for id in 0..config.workers {
            let worker = FetchWorker::new(
                id,
                client.clone(),
                target.clone(),
                config.fetch.clone(),
                sender.clone(),
                cancel.clone(),
            );
            tasks.spawn(worker.run());
        }

        tracing::info!(
            "Spawned {} workers for {} (channel capacity {})",
            config.workers,
            target,
            config.pipeline.channel_capacity
        );

        Ok(Self {
            receiver,
            tasks,
            cancel,
        })
    }

    /// A pool with no workers that drains an existing channel
    #[cfg(test)]
    pub(crate) fn detached(receiver: mpsc::Receiver<String>) -> Self {
        Self {
            receiver,
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Receives the next item; `None` once every sender is gone
    #[cfg(test)]
    pub(crate) async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Borrows the item channel and the task set at the same time
    pub(crate) fn channels(
        &mut self,
    ) -> (
        &mut mpsc::Receiver<String>,
        &mut JoinSet<Result<(), FetchError>>,
    ) {
        (&mut self.receiver, &mut self.tasks)
    }

    /// Number of worker tasks not yet reaped
    #[cfg(test)]
    pub(crate) fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Token observed by every worker between iterations
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels every worker and waits up to `grace` for them to exit
    ///
    /// Items still queued in the channel are discarded. Workers that have not
    /// exited when the grace period ends are aborted.
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel.cancel();
        self.receiver.close();

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(grace, async {
            while let Some(exit) = tasks.join_next().await {
                log_exit(&exit);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "{} workers still running after {:?}, aborting",
                self.tasks.len(),
                grace
            );
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }
    }
}

fn log_exit(exit: &WorkerExit) {
    match exit {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Worker ended with error during shutdown: {}", e),
        Err(e) => tracing::debug!("Worker task ended abnormally during shutdown: {}", e),
    }
}
