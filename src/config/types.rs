//! Configuration type definitions
//!
//! This module contains all the configuration structures used by the relay.

use super::defaults;
use crate::aggregator::InvalidSamplePolicy;
use crate::scheduler::SchedulerConfig;
use crate::types::{UpstreamName, duration_ms_serde};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Main relay configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// Aggregation window and sample policy
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Datagram front-end settings
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Snapshot destinations
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

/// Aggregation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AggregationConfig {
    /// Time between snapshots
    #[serde(
        rename = "interval_ms",
        with = "duration_ms_serde",
        default = "defaults::interval"
    )]
    pub interval: Duration,
    /// What to do with `NaN` / infinite samples
    #[serde(default)]
    pub on_invalid_sample: InvalidSamplePolicy,
    /// Publish leftover samples once when the scheduler stops
    #[serde(default)]
    pub flush_on_stop: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval: defaults::interval(),
            on_invalid_sample: InvalidSamplePolicy::default(),
            flush_on_stop: false,
        }
    }
}

impl AggregationConfig {
    /// Scheduler settings derived from this section
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.interval,
            flush_on_stop: self.flush_on_stop,
        }
    }
}

/// UDP ingest settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IngestConfig {
    /// Host to bind to
    #[serde(default = "defaults::ingest_host")]
    pub host: String,
    /// Port to bind to
    #[serde(default = "defaults::ingest_port")]
    pub port: u16,
    /// Users allowed to submit; empty means everyone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: defaults::ingest_host(),
            port: defaults::ingest_port(),
            allow: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// `host:port` string suitable for binding
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Kind of snapshot destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamKind {
    /// Keep the newest `options.retain` snapshots in memory (default 1024)
    Memory,
    /// One JSON line per snapshot on stdout
    Stdout,
    /// One structured `info!` event per snapshot
    Log,
    /// Append JSON lines to `options.path`
    File,
    /// In-process broadcast channel, `options.capacity` deep
    Broadcast,
}

impl UpstreamKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Stdout => "stdout",
            Self::Log => "log",
            Self::File => "file",
            Self::Broadcast => "broadcast",
        }
    }
}

impl std::fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named snapshot destination
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UpstreamConfig {
    pub name: UpstreamName,
    #[serde(rename = "type")]
    pub kind: UpstreamKind,
    /// Kind-specific settings
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, toml::Value>,
}

impl UpstreamConfig {
    /// Create an upstream entry without options
    #[must_use]
    pub fn new(name: UpstreamName, kind: UpstreamKind) -> Self {
        Self {
            name,
            kind,
            options: BTreeMap::new(),
        }
    }

    /// Set one option, builder style
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// String option, if present and a string
    #[must_use]
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(toml::Value::as_str)
    }

    /// Non-negative integer option, written either as a number or a numeric string
    ///
    /// # Errors
    /// Returns an error if the option exists but is not a non-negative integer.
    pub fn option_usize(&self, key: &str) -> Result<Option<usize>> {
        let Some(value) = self.options.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            toml::Value::Integer(n) => usize::try_from(*n).ok(),
            toml::Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| anyhow!("option '{key}' must be a non-negative integer, got {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.aggregation.interval, Duration::from_secs(5));
        assert_eq!(config.ingest.port, 55_555);
        assert_eq!(config.ingest.host, "0.0.0.0");
        assert!(config.upstreams.is_empty());
    }

    #[test]
    fn test_full_document() {
        let config: Config = toml::from_str(
            r#"
[aggregation]
interval_ms = 250
on_invalid_sample = "clamp"
flush_on_stop = true

[ingest]
host = "127.0.0.1"
port = 6000
allow = ["alice", "bob"]

[[upstreams]]
name = "archive"
type = "file"
options = { path = "/tmp/snapshots.jsonl" }
"#,
        )
        .unwrap();

        assert_eq!(config.aggregation.interval, Duration::from_millis(250));
        assert_eq!(
            config.aggregation.on_invalid_sample,
            InvalidSamplePolicy::Clamp
        );
        assert!(config.aggregation.flush_on_stop);
        assert_eq!(config.ingest.listen_addr(), "127.0.0.1:6000");
        assert_eq!(config.ingest.allow, vec!["alice", "bob"]);
        assert_eq!(config.upstreams[0].kind, UpstreamKind::File);
        assert_eq!(
            config.upstreams[0].option_str("path"),
            Some("/tmp/snapshots.jsonl")
        );
    }

    #[test]
    fn test_scheduler_config_from_aggregation() {
        let aggregation = AggregationConfig {
            interval: Duration::from_millis(40),
            flush_on_stop: true,
            ..Default::default()
        };
        let scheduler = aggregation.scheduler_config();
        assert_eq!(scheduler.interval, Duration::from_millis(40));
        assert!(scheduler.flush_on_stop);
    }

    #[test]
    fn test_unknown_upstream_type_rejected() {
        let result: Result<Config, _> =
            toml::from_str("[[upstreams]]\nname = \"x\"\ntype = \"http\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_upstream_name_rejected() {
        let result: Result<Config, _> =
            toml::from_str("[[upstreams]]\nname = \"  \"\ntype = \"log\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_option_usize_accepts_number_and_string() {
        let name = UpstreamName::try_from("bus").unwrap();
        let numeric = UpstreamConfig::new(name.clone(), UpstreamKind::Broadcast)
            .with_option("capacity", 16_i64);
        let text =
            UpstreamConfig::new(name.clone(), UpstreamKind::Broadcast).with_option("capacity", "32");
        let negative =
            UpstreamConfig::new(name, UpstreamKind::Broadcast).with_option("capacity", -1_i64);

        assert_eq!(numeric.option_usize("capacity").unwrap(), Some(16));
        assert_eq!(text.option_usize("capacity").unwrap(), Some(32));
        assert_eq!(numeric.option_usize("missing").unwrap(), None);
        assert!(negative.option_usize("capacity").is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = super::super::create_default_config();
        let text = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
