use crate::config::types::{Config, FetchConfig, PipelineConfig};
use crate::url::parse_target;
use crate::ConfigError;

const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target(&config.website)?;
    validate_counts(config)?;
    validate_paths(config)?;
    validate_fetch_config(&config.fetch)?;
    validate_pipeline_config(&config.pipeline)?;
    Ok(())
}

/// The target must be present and be an absolute HTTP(S) URL
fn validate_target(website: &str) -> Result<(), ConfigError> {
    if website.trim().is_empty() {
        return Err(ConfigError::MissingTarget);
    }

    parse_target(website)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid website '{}': {}", website, e)))?;

    Ok(())
}

fn validate_counts(config: &Config) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.report_interval == 0 {
        return Err(ConfigError::Validation(
            "report_interval must be > 0 seconds".to_string(),
        ));
    }

    if config.dup_to_stop == 0 {
        return Err(ConfigError::Validation(
            "dup_to_stop must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_paths(config: &Config) -> Result<(), ConfigError> {
    if config.hash_file.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "hash_file cannot be empty".to_string(),
        ));
    }

    if config.quotes_file.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "quotes_file cannot be empty".to_string(),
        ));
    }

    // Both logs in one file would interleave binary and text records
    if config.hash_file == config.quotes_file {
        return Err(ConfigError::Validation(format!(
            "hash_file and quotes_file must differ, both are '{}'",
            config.hash_file.display()
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "channel_capacity must be > 0".to_string(),
        ));
    }

    Ok(())
}
