use crate::config::types::{Config, FileConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the config file
///
/// `None` means "not given on the command line".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub report_interval: Option<u64>,
    pub dup_to_stop: Option<u64>,
    pub hash_file: Option<PathBuf>,
    pub quotes_file: Option<PathBuf>,
    pub website: Option<String>,
    pub fetch_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub fetch_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub channel_capacity: Option<usize>,
    pub shutdown_grace_ms: Option<u64>,
}

/// Loads and parses a TOML configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(FileConfig)` - Parsed (not yet validated) file settings
/// * `Err(ConfigError)` - Failed to read or parse the file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use quote_harvest::config::load_file_config;
///
/// let file = load_file_config(Path::new("harvest.toml")).unwrap();
/// println!("Workers: {:?}", file.workers);
/// ```
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let file: FileConfig = toml::from_str(&content)?;
    Ok(file)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a run can be matched to the file it was started with.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Builds the final configuration from defaults, an optional file and overrides
///
/// Precedence, lowest to highest: built-in defaults, the TOML file, the
/// command line. The merged result is validated before it is returned.
///
/// # Returns
///
/// * `Ok((Config, Option<String>))` - Validated configuration and the file hash, if a file was used
/// * `Err(ConfigError)` - Failed to load, parse, or validate
pub fn build_config(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<(Config, Option<String>), ConfigError> {
    let (file, hash) = match path {
        Some(path) => (load_file_config(path)?, Some(compute_config_hash(path)?)),
        None => (FileConfig::default(), None),
    };

    let config = merge(file, overrides);
    validate(&config)?;

    Ok((config, hash))
}

/// Layers the file settings and then the overrides onto the defaults
pub fn merge(file: FileConfig, overrides: &Overrides) -> Config {
    let mut config = Config::new(String::new());

    apply(&mut config.workers, file.workers, overrides.workers);
    apply(
        &mut config.report_interval,
        file.report_interval,
        overrides.report_interval,
    );
    apply(&mut config.dup_to_stop, file.dup_to_stop, overrides.dup_to_stop);
    apply(
        &mut config.hash_file,
        file.hash_file,
        overrides.hash_file.clone(),
    );
    apply(
        &mut config.quotes_file,
        file.quotes_file,
        overrides.quotes_file.clone(),
    );
    apply(&mut config.website, file.website, overrides.website.clone());

    let fetch = &mut config.fetch;
    apply(&mut fetch.delay_ms, file.fetch.delay_ms, overrides.fetch_delay_ms);
    apply(
        &mut fetch.request_timeout_secs,
        file.fetch.request_timeout_secs,
        overrides.request_timeout_secs,
    );
    apply(&mut fetch.retries, file.fetch.retries, overrides.fetch_retries);
    apply(
        &mut fetch.retry_backoff_ms,
        file.fetch.retry_backoff_ms,
        overrides.retry_backoff_ms,
    );
    apply(
        &mut fetch.user_agent,
        file.fetch.user_agent,
        overrides.user_agent.clone(),
    );

    let pipeline = &mut config.pipeline;
    apply(
        &mut pipeline.channel_capacity,
        file.pipeline.channel_capacity,
        overrides.channel_capacity,
    );
    apply(
        &mut pipeline.shutdown_grace_ms,
        file.pipeline.shutdown_grace_ms,
        overrides.shutdown_grace_ms,
    );

    config
}

fn apply<T>(slot: &mut T, from_file: Option<T>, from_cli: Option<T>) {
    if let Some(value) = from_cli.or(from_file) {
        *slot = value;
    }
}
