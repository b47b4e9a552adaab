//! Configuration module
//!
//! This module handles all configuration types and loading
//! for the count relay.

mod defaults;
mod loading;
mod types;
mod validation;

pub use loading::{
    ConfigSource, apply_env_overrides, apply_env_overrides_from, create_default_config,
    has_env_overrides, load_config, load_config_with_fallback,
};
pub use types::{AggregationConfig, Config, IngestConfig, UpstreamConfig, UpstreamKind};

// Re-export default functions for use in tests and other modules
pub use defaults::{ingest_host, ingest_port, interval};
