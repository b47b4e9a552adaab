//! Configuration validation
//!
//! This module provides validation logic for the configuration to ensure
//! all settings are valid before the relay starts.

use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;

use super::types::{Config, UpstreamConfig, UpstreamKind};
use crate::constants::aggregation::MIN_RECOMMENDED_INTERVAL_MS;

const MIN_RECOMMENDED_INTERVAL: Duration = Duration::from_millis(MIN_RECOMMENDED_INTERVAL_MS);

impl Config {
    /// Validate configuration for correctness
    ///
    /// Empty user ids and upstream names are already refused by their types.
    /// This checks the remaining semantic constraints:
    /// - The aggregation interval is non-zero (warns when very short)
    /// - The ingest port is non-zero
    /// - Upstream names are unique
    /// - Kind-specific options are present and well formed
    ///
    /// # Errors
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let interval = self.aggregation.interval;
        if interval.is_zero() {
            return Err(anyhow::anyhow!(
                "aggregation.interval_ms must be greater than zero"
            ));
        }
        if interval < MIN_RECOMMENDED_INTERVAL {
            tracing::warn!(
                "aggregation.interval_ms is {:?} (< {:?}). \
                 Every tick publishes a snapshot, even an empty one; consider a longer window.",
                interval,
                MIN_RECOMMENDED_INTERVAL
            );
        }

        if self.ingest.port == 0 {
            return Err(anyhow::anyhow!("ingest.port must be greater than zero"));
        }

        if self.ingest.allow.iter().any(|user| user.trim().is_empty()) {
            return Err(anyhow::anyhow!(
                "ingest.allow must not contain empty user ids"
            ));
        }

        let mut names = HashSet::with_capacity(self.upstreams.len());
        for upstream in &self.upstreams {
            if !names.insert(upstream.name.as_str()) {
                return Err(anyhow::anyhow!(
                    "Duplicate upstream name '{}'",
                    upstream.name
                ));
            }
            validate_upstream(upstream)?;
        }

        Ok(())
    }
}

/// Validate a single upstream entry
fn validate_upstream(upstream: &UpstreamConfig) -> Result<()> {
    match upstream.kind {
        UpstreamKind::File => {
            if upstream
                .option_str("path")
                .is_none_or(|path| path.trim().is_empty())
            {
                return Err(anyhow::anyhow!(
                    "Upstream '{}' of type file needs a non-empty options.path",
                    upstream.name
                ));
            }
        }
        UpstreamKind::Broadcast => {
            if upstream.option_usize("capacity")? == Some(0) {
                return Err(anyhow::anyhow!(
                    "Upstream '{}' has options.capacity = 0; broadcast channels need room for one snapshot",
                    upstream.name
                ));
            }
        }
        UpstreamKind::Memory => {
            if upstream.option_usize("retain")? == Some(0) {
                return Err(anyhow::anyhow!(
                    "Upstream '{}' has options.retain = 0; a memory upstream keeps at least one snapshot",
                    upstream.name
                ));
            }
        }
        UpstreamKind::Stdout | UpstreamKind::Log => {}
    }
    Ok(())
}
