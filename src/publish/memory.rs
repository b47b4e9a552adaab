//! In-memory publisher that keeps the most recent snapshots

use super::Publisher;
use crate::constants::publish::MEMORY_RETAIN;
use crate::snapshot::Snapshot;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Collects published snapshots in a shared, bounded list
///
/// Only the newest `retain` snapshots are kept; older ones are dropped as
/// new ones arrive. Clones share the same list, so a test can keep one
/// handle and give the other to the scheduler.
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    name: Arc<str>,
    retain: usize,
    pushed: Arc<Mutex<VecDeque<Snapshot>>>,
}

impl MemoryPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::named("memory")
    }

    #[must_use]
    pub fn named(name: &str) -> Self {
        Self::with_retain(name, MEMORY_RETAIN)
    }

    /// Keep at most `retain` snapshots (at least one)
    #[must_use]
    pub fn with_retain(name: &str, retain: usize) -> Self {
        Self {
            name: Arc::from(name),
            retain: retain.max(1),
            pushed: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Maximum number of snapshots kept
    #[must_use]
    pub fn retain(&self) -> usize {
        self.retain
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Snapshot>> {
        self.pushed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the retained snapshots, in delivery order
    #[must_use]
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.lock().iter().cloned().collect()
    }

    /// Number of snapshots currently retained
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Most recent snapshot
    #[must_use]
    pub fn last(&self) -> Option<Snapshot> {
        self.lock().back().cloned()
    }

    /// Drop everything collected so far
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        {
            let mut pushed = self.lock();
            if pushed.len() == self.retain {
                pushed.pop_front();
            }
            pushed.push_back(snapshot.clone());
        }
        tracing::debug!(
            publisher = %self.name,
            sequence = snapshot.sequence,
            "Stored snapshot in memory"
        );
        Ok(())
    }
}
