//! Constants used throughout count-relay
//!
//! Centralizes default values so config defaults, CLI help and tests agree.

/// Aggregation window constants
pub mod aggregation {
    /// Default interval between snapshots (5 seconds)
    pub const DEFAULT_INTERVAL_MS: u64 = 5_000;

    /// Intervals below this produce a snapshot storm and are warned about
    pub const MIN_RECOMMENDED_INTERVAL_MS: u64 = 100;

    /// Initial per-user capacity for a freshly created sample sequence
    pub const INITIAL_SAMPLES_PER_USER: usize = 4;
}

/// Datagram ingest constants
pub mod ingest {
    /// Default listen host (all interfaces)
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Default UDP port producers send counts to
    pub const DEFAULT_PORT: u16 = 55_555;

    /// Receive buffer size; a `{"user": .., "count": ..}` payload is far smaller
    pub const MAX_DATAGRAM: usize = 2_048;
}

/// Publisher constants
pub mod publish {
    /// Default broadcast channel capacity (snapshots buffered per slow subscriber)
    pub const BROADCAST_CAPACITY: usize = 64;

    /// Snapshots a memory upstream keeps before dropping the oldest
    pub const MEMORY_RETAIN: usize = 1_024;
}

/// Logging constants
pub mod logging {
    /// File that receives the non-blocking copy of every log line
    pub const LOG_FILE: &str = "debug.log";

    /// Filter used when `RUST_LOG` is unset
    pub const DEFAULT_FILTER: &str = "info";
}

/// Environment variable names for config overrides
pub mod env {
    pub const INTERVAL_MS: &str = "COUNT_RELAY_INTERVAL_MS";
    pub const ON_INVALID_SAMPLE: &str = "COUNT_RELAY_ON_INVALID_SAMPLE";
    pub const INGEST_HOST: &str = "COUNT_RELAY_INGEST_HOST";
    pub const INGEST_PORT: &str = "COUNT_RELAY_INGEST_PORT";

    /// All override variables, used to detect env-only deployments
    pub const ALL: [&str; 4] = [INTERVAL_MS, ON_INVALID_SAMPLE, INGEST_HOST, INGEST_PORT];
}
