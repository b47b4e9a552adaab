//! Command-line arguments for the count-relay binary
//!
//! Precedence, highest first: these flags, `COUNT_RELAY_*` environment
//! variables (applied while loading), then the config file.

use crate::aggregator::InvalidSamplePolicy;
use crate::config::Config;
use clap::Parser;
use std::time::Duration;

/// Parse a non-zero port
fn parse_port(s: &str) -> Result<u16, String> {
    let port: u16 = s
        .parse()
        .map_err(|e| format!("Invalid port number: {}", e))?;
    if port == 0 {
        return Err("Invalid port: must be greater than zero".to_string());
    }
    Ok(port)
}

/// Parse a non-zero millisecond interval
fn parse_interval_ms(s: &str) -> Result<u64, String> {
    let millis: u64 = s
        .parse()
        .map_err(|e| format!("Invalid interval: {}", e))?;
    if millis == 0 {
        return Err("Invalid interval: must be greater than zero".to_string());
    }
    Ok(millis)
}

/// Per-user count aggregation relay
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "count-relay", version, about)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", env = "COUNT_RELAY_CONFIG")]
    pub config: String,

    /// UDP port to receive counts on (overrides config file)
    #[arg(short, long, value_parser = parse_port)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Milliseconds between snapshots (overrides config file)
    #[arg(short, long = "interval-ms", value_parser = parse_interval_ms)]
    pub interval_ms: Option<u64>,

    /// What to do with NaN / infinite counts (overrides config file)
    #[arg(long, value_enum)]
    pub on_invalid_sample: Option<InvalidSamplePolicy>,

    /// Number of worker threads (default: 1, use 0 for CPU cores)
    #[arg(short, long, env = "COUNT_RELAY_THREADS")]
    pub threads: Option<usize>,

    /// Log to stderr only instead of stdout + debug.log
    #[arg(long)]
    pub no_log_file: bool,
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.ingest.port = port;
        }
        if let Some(host) = &self.host {
            config.ingest.host.clone_from(host);
        }
        if let Some(millis) = self.interval_ms {
            config.aggregation.interval = Duration::from_millis(millis);
        }
        if let Some(policy) = self.on_invalid_sample {
            config.aggregation.on_invalid_sample = policy;
        }
    }
}
