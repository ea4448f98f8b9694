//! URL handling module for Quote-Harvest
//!
//! This module turns raw `href` values into absolute URLs and validates the
//! configured target locator.

mod normalize;

pub use normalize::{parse_target, resolve};
