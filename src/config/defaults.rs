//! Default values for configuration fields
//!
//! This module centralizes all default value functions used in serde deserialization.

use crate::constants::{aggregation, ingest};
use std::time::Duration;

/// Default aggregation window
#[inline]
pub fn interval() -> Duration {
    Duration::from_millis(aggregation::DEFAULT_INTERVAL_MS)
}

/// Default ingest listen host
#[inline]
pub fn ingest_host() -> String {
    ingest::DEFAULT_HOST.to_string()
}

/// Default ingest UDP port
#[inline]
pub fn ingest_port() -> u16 {
    ingest::DEFAULT_PORT
}
