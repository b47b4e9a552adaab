//! # count-relay
//!
//! Buffers per-user numeric samples, reduces each user's samples to their
//! mean once per fixed interval, and publishes the resulting snapshot.
//!
//! ```no_run
//! use count_relay::{Aggregator, MemoryPublisher, SchedulerConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let aggregator = Aggregator::default();
//! let published = MemoryPublisher::new();
//! let scheduler = aggregator.start(
//!     SchedulerConfig::with_interval(Duration::from_secs(5)),
//!     published.clone(),
//! );
//!
//! aggregator.submit("alice", 10.0)?;
//! aggregator.submit("alice", 20.0)?;
//!
//! tokio::time::sleep(Duration::from_secs(6)).await;
//! assert_eq!(published.last().and_then(|s| s.get("alice")), Some(15.0));
//!
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod args;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod publish;
pub mod reducer;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
pub mod types;

pub use aggregator::{
    Aggregator, AggregatorBuilder, InvalidSamplePolicy, SubmitError, SubmitGuard, SubmitOutcome,
};
pub use buffer::{Extraction, SampleBuffer};
pub use config::{
    Config, ConfigSource, create_default_config, load_config, load_config_with_fallback,
};
pub use error::AggregateError;
pub use publish::{
    BroadcastPublisher, CallbackPublisher, FilePublisher, LogPublisher, MemoryPublisher,
    Publisher, StdoutPublisher, Upstreams,
};
pub use reducer::reduce;
pub use scheduler::{
    Scheduler, SchedulerConfig, SchedulerControl, SchedulerHandle, SchedulerState,
};
pub use snapshot::{Aggregate, Snapshot};
pub use types::{UpstreamName, UserId, ValidationError};
