//! Configuration loading from files and environment variables
//!
//! This module handles loading configuration from TOML files and environment variables,
//! with environment variables taking precedence for Docker/container deployments.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use super::types::{Config, UpstreamConfig, UpstreamKind};
use crate::constants::env;
use crate::types::UpstreamName;

/// Where the active configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from the TOML file
    File,
    /// No file; defaults plus environment overrides
    Environment,
    /// No file and no overrides; a default file was written
    DefaultCreated,
}

impl ConfigSource {
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::File => "configuration file",
            Self::Environment => "environment variables",
            Self::DefaultCreated => "default configuration (created)",
        }
    }
}

/// Whether any `COUNT_RELAY_*` override is set in the process environment
#[must_use]
pub fn has_env_overrides() -> bool {
    env::ALL.iter().any(|key| std::env::var_os(key).is_some())
}

/// Apply `COUNT_RELAY_*` overrides from the process environment
///
/// # Errors
/// Returns an error if a variable is set but cannot be parsed.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    apply_env_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides read through `lookup`
///
/// Split out from [`apply_env_overrides`] so tests can supply variables
/// without touching the process environment.
///
/// # Errors
/// Returns an error if a variable is set but cannot be parsed.
pub fn apply_env_overrides_from<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(env::INTERVAL_MS) {
        let millis: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be milliseconds, got '{raw}'", env::INTERVAL_MS))?;
        config.aggregation.interval = std::time::Duration::from_millis(millis);
        info!(interval_ms = millis, "Aggregation interval overridden from environment");
    }

    if let Some(raw) = lookup(env::ON_INVALID_SAMPLE) {
        config.aggregation.on_invalid_sample = raw
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid {}", env::ON_INVALID_SAMPLE))?;
    }

    if let Some(host) = lookup(env::INGEST_HOST) {
        config.ingest.host = host;
    }

    if let Some(raw) = lookup(env::INGEST_PORT) {
        config.ingest.port = raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a port number, got '{raw}'", env::INGEST_PORT))?;
    }

    Ok(())
}

/// Load configuration from a TOML file, with environment variable overrides
///
/// `COUNT_RELAY_*` variables take precedence over the file, so container
/// deployments can adjust the window or listen address without editing it.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, an override is
/// malformed, or the result fails validation.
pub fn load_config(config_path: &str) -> Result<Config> {
    let config_content = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", config_path, e))?;

    let mut config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", config_path, e))?;

    apply_env_overrides(&mut config)?;
    config.validate()?;

    Ok(config)
}

/// Load configuration, falling back when the file does not exist
///
/// 1. If `config_path` exists, load it (plus env overrides).
/// 2. Otherwise, if any `COUNT_RELAY_*` variable is set, use defaults plus overrides.
/// 3. Otherwise write [`create_default_config`] to `config_path` and use it.
///
/// # Errors
/// Returns an error if loading, validation, or writing the default file fails.
pub fn load_config_with_fallback(config_path: &str) -> Result<(Config, ConfigSource)> {
    if Path::new(config_path).exists() {
        return Ok((load_config(config_path)?, ConfigSource::File));
    }

    if has_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(&mut config)?;
        config.validate()?;
        return Ok((config, ConfigSource::Environment));
    }

    warn!(
        "Config file '{}' not found, creating default configuration",
        config_path
    );
    let config = create_default_config();
    let rendered =
        toml::to_string_pretty(&config).context("Failed to render default configuration")?;
    std::fs::write(config_path, rendered)
        .with_context(|| format!("Failed to write default config file '{config_path}'"))?;

    Ok((config, ConfigSource::DefaultCreated))
}

/// Create a default configuration for first runs and testing
///
/// Default aggregation settings, the default ingest address, and a single
/// `log` upstream so snapshots are visible without further setup.
#[must_use]
pub fn create_default_config() -> Config {
    let log = UpstreamName::try_from("log").map(|name| UpstreamConfig::new(name, UpstreamKind::Log));
    Config {
        upstreams: log.into_iter().collect(),
        ..Default::default()
    }
}
