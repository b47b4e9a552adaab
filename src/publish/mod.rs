//! Snapshot publishers
//!
//! A publisher receives every snapshot the scheduler produces and delivers it
//! somewhere: memory, stdout, a JSON-lines file, an in-process broadcast
//! channel, or any closure registered through `on_snapshot`. The scheduler
//! logs publisher errors and keeps ticking.

mod broadcast;
mod file;
mod memory;
mod stdout;
mod upstreams;

pub use broadcast::BroadcastPublisher;
pub use file::FilePublisher;
pub use memory::MemoryPublisher;
pub use stdout::{LogPublisher, StdoutPublisher};
pub use upstreams::{ReconfigureReport, Upstreams};

use crate::config::{UpstreamConfig, UpstreamKind};
use crate::constants::publish::{BROADCAST_CAPACITY, MEMORY_RETAIN};
use crate::snapshot::Snapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast as tokio_broadcast;

/// Destination for snapshots
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Deliver one snapshot
    ///
    /// Called at most once per tick, never concurrently for the same scheduler.
    async fn publish(&self, snapshot: &Snapshot) -> Result<()>;

    /// Subscribe to an in-process stream of snapshots, if this publisher offers one
    fn subscribe(&self) -> Option<tokio_broadcast::Receiver<Arc<Snapshot>>> {
        None
    }
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        (**self).publish(snapshot).await
    }

    fn subscribe(&self) -> Option<tokio_broadcast::Receiver<Arc<Snapshot>>> {
        (**self).subscribe()
    }
}

/// Publisher backed by a synchronous closure
///
/// This is what `Aggregator::on_snapshot` registers. The closure runs on the
/// scheduler task, so it should hand heavy work off elsewhere.
pub struct CallbackPublisher<F> {
    name: String,
    callback: F,
}

impl<F> CallbackPublisher<F>
where
    F: Fn(&Snapshot) -> Result<()> + Send + Sync,
{
    #[must_use]
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<F> std::fmt::Debug for CallbackPublisher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackPublisher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Publisher for CallbackPublisher<F>
where
    F: Fn(&Snapshot) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        (self.callback)(snapshot)
    }
}

/// Build a publisher from its upstream configuration
///
/// # Errors
/// Returns an error if a required option is missing or malformed.
pub fn build_publisher(config: &UpstreamConfig) -> Result<Arc<dyn Publisher>> {
    let name = config.name.as_str();
    let publisher: Arc<dyn Publisher> = match config.kind {
        UpstreamKind::Memory => {
            let retain = config
                .option_usize("retain")
                .with_context(|| format!("memory upstream '{name}' has an invalid retain"))?
                .unwrap_or(MEMORY_RETAIN);
            Arc::new(MemoryPublisher::with_retain(name, retain))
        }
        UpstreamKind::Stdout => Arc::new(StdoutPublisher::new(name)),
        UpstreamKind::Log => Arc::new(LogPublisher::new(name)),
        UpstreamKind::File => {
            let path = config
                .option_str("path")
                .with_context(|| format!("file upstream '{name}' needs an options.path entry"))?;
            Arc::new(FilePublisher::new(name, path))
        }
        UpstreamKind::Broadcast => {
            let capacity = config
                .option_usize("capacity")
                .with_context(|| format!("broadcast upstream '{name}' has an invalid capacity"))?
                .unwrap_or(BROADCAST_CAPACITY);
            Arc::new(BroadcastPublisher::new(name, capacity)?)
        }
    };
    Ok(publisher)
}
