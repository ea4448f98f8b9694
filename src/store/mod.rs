//! Storage module for harvested items
//!
//! This module handles everything that touches disk:
//! - Content fingerprints (MD5, 16 bytes)
//! - The hash store loaded from the fingerprint log
//! - The dedup engine that appends to the fingerprint and value logs

mod engine;
mod fingerprint;
mod hash_store;

pub use engine::{DedupEngine, Outcome, StatusReport, RECORD_TERMINATOR};
pub use fingerprint::{Fingerprint, FINGERPRINT_LEN};
pub use hash_store::HashStore;
