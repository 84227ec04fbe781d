//! Configuration loading and management.
//!
//! - [`types`]: config structs, TOML loading and environment overrides
//! - [`validation`]: startup checks collecting every problem at once

mod types;
pub mod validation;

pub use types::{Config, ContentConfig, RankCardConfig};
