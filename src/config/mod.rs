//! Configuration module for Quote-Harvest
//!
//! Settings come from built-in defaults, an optional TOML file, and the
//! command line, in increasing order of precedence.
//!
//! # Example
//!
//! ```no_run
//! use quote_harvest::config::{build_config, Overrides};
//!
//! let overrides = Overrides {
//!     website: Some("https://quotes.example.com/".to_string()),
//!     ..Overrides::default()
//! };
//! let (config, _hash) = build_config(None, &overrides).unwrap();
//! println!("Harvesting with {} workers", config.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, FileConfig, FileFetchConfig, FilePipelineConfig, PipelineConfig,
};

// Re-export parser functions
pub use parser::{build_config, compute_config_hash, load_file_config, merge, Overrides};
pub use validation::validate;
