use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of concurrent fetch workers
pub const DEFAULT_WORKERS: usize = 2;

/// Default report cadence in seconds
pub const DEFAULT_REPORT_INTERVAL: u64 = 10;

/// Default number of consecutive duplicates that stops a run
pub const DEFAULT_DUP_TO_STOP: u64 = 500;

/// Default fingerprint log path
pub const DEFAULT_HASH_FILE: &str = "hash.bin";

/// Default value log path
pub const DEFAULT_QUOTES_FILE: &str = "quotes.txt";

/// Main configuration structure for Quote-Harvest
///
/// Built once at startup from defaults, an optional TOML file and the command
/// line, then validated. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of concurrent fetch workers (>= 1)
    pub workers: usize,

    /// Seconds between status reports (> 0)
    pub report_interval: u64,

    /// Consecutive duplicates that end the run (> 0)
    pub dup_to_stop: u64,

    /// Fingerprint log (raw 16-byte records)
    pub hash_file: PathBuf,

    /// Value log (text records)
    pub quotes_file: PathBuf,

    /// Page to fetch repeatedly
    pub website: String,

    pub fetch: FetchConfig,

    pub pipeline: PipelineConfig,
}

/// Settings for the HTTP side of each worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Pause after each fully emitted page (milliseconds)
    pub delay_ms: u64,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Extra attempts after a failed fetch before the worker gives up
    pub retries: u32,

    /// Base delay before the first retry, doubled per attempt (milliseconds)
    pub retry_backoff_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Settings for the producer/consumer pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Items buffered between workers and the consumer before sends block
    pub channel_capacity: usize,

    /// How long to wait for workers to exit after the run stops (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Config {
    /// Creates a configuration with default settings for the given target
    pub fn new(website: impl Into<String>) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            report_interval: DEFAULT_REPORT_INTERVAL,
            dup_to_stop: DEFAULT_DUP_TO_STOP,
            hash_file: PathBuf::from(DEFAULT_HASH_FILE),
            quotes_file: PathBuf::from(DEFAULT_QUOTES_FILE),
            website: website.into(),
            fetch: FetchConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn report_period(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.pipeline.shutdown_grace_ms)
    }
}

impl FetchConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Backoff before retry number `attempt` (1-based), capped at 2^10 x base
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            request_timeout_secs: 30,
            retries: 3,
            retry_backoff_ms: 500,
            user_agent: format!("quote-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            shutdown_grace_ms: 2000,
        }
    }
}

/// On-disk TOML layout; every key is optional and overrides the default
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub workers: Option<usize>,
    pub report_interval: Option<u64>,
    pub dup_to_stop: Option<u64>,
    pub hash_file: Option<PathBuf>,
    pub quotes_file: Option<PathBuf>,
    pub website: Option<String>,

    #[serde(default)]
    pub fetch: FileFetchConfig,

    #[serde(default)]
    pub pipeline: FilePipelineConfig,
}

/// `[fetch]` table of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileFetchConfig {
    pub delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub user_agent: Option<String>,
}

/// `[pipeline]` table of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePipelineConfig {
    pub channel_capacity: Option<usize>,
    pub shutdown_grace_ms: Option<u64>,
}
