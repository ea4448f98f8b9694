//! Fetch worker loop
//!
//! Each worker repeats, until cancelled or a fetch fails for good:
//! - Fetch the target page, retrying with exponential backoff
//! - Extract and resolve every link, sending each on the shared channel
//! - Sleep for the configured delay

use crate::config::FetchConfig;
use crate::crawler::fetcher::fetch_page;
use crate::crawler::parser::extract_links;
use crate::url::resolve;
use crate::FetchError;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One independently scheduled producer
///
/// A worker loops until cancelled or until the consumer goes away. A fetch
/// that keeps failing after the configured retries ends the worker with an
/// error, which the pool supervisor reports to the controller.
pub struct FetchWorker {
    id: usize,
    client: Client,
    target: Url,
    config: FetchConfig,
    sender: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl FetchWorker {
    pub fn new(
        id: usize,
        client: Client,
        target: Url,
        config: FetchConfig,
        sender: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            client,
            target,
            config,
            sender,
            cancel,
        }
    }

    /// Runs the fetch loop
    ///
    /// # Loop
    ///
    /// 1. Stop if cancelled
    /// 2. Fetch the target (with retry and backoff)
    /// 3. Extract anchor targets and resolve each against the target
    /// 4. Send each one to the consumer, blocking while the channel is full
    /// 5. Sleep the inter-iteration delay
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Cancelled, or the consumer dropped the channel
    /// * `Err(FetchError)` - A fetch failed on every attempt
    pub async fn run(self) -> Result<(), FetchError> {
        tracing::debug!("Worker {} started", self.id);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let body = match self.fetch_with_retry().await? {
                Some(body) => body,
                None => break,
            };

            let links = extract_links(&body);
            let mut emitted = 0usize;

            for href in links {
                let item = match resolve(&self.target, &href) {
                    Ok(item) => item,
                    Err(e) => {
                        tracing::debug!("Worker {}: skipping link: {}", self.id, e);
                        continue;
                    }
                };

                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    sent = self.sender.send(item) => {
                        if sent.is_err() {
                            tracing::debug!("Worker {}: consumer closed the channel", self.id);
                            return Ok(());
                        }
                    }
                }
                emitted += 1;
            }

            tracing::trace!("Worker {} emitted {} links", self.id, emitted);

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.delay()) => {}
            }
        }

        tracing::debug!("Worker {} stopped", self.id);
        Ok(())
    }

    /// Fetches the target, retrying with exponential backoff
    ///
    /// Returns `Ok(None)` if cancelled while fetching or backing off.
    async fn fetch_with_retry(&self) -> Result<Option<String>, FetchError> {
        let mut attempt = 0u32;

        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                result = fetch_page(&self.client, &self.target) => result,
            };

            match result {
                Ok(body) => return Ok(Some(body)),
                Err(e) if attempt < self.config.retries => {
                    attempt += 1;
                    let wait = self.config.backoff(attempt);
                    tracing::warn!(
                        "Worker {}: fetch failed ({}), retry {}/{} in {:?}",
                        self.id,
                        e,
                        attempt,
                        self.config.retries,
                        wait
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
