//! Named registry of upstream publishers
//!
//! Lets one scheduler feed several destinations and swap them at runtime
//! from configuration without restarting the aggregation loop.

use super::{Publisher, build_publisher};
use crate::config::UpstreamConfig;
use crate::snapshot::Snapshot;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

struct Upstream {
    /// Present when the upstream was built from configuration
    config: Option<UpstreamConfig>,
    publisher: Arc<dyn Publisher>,
}

/// Result of applying a new upstream list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconfigureReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Fan-out publisher over a set of named upstreams
///
/// Publishing delivers the snapshot to every upstream in name order. One
/// failing upstream does not prevent delivery to the others; the combined
/// result is an error naming the failures.
#[derive(Default)]
pub struct Upstreams {
    entries: RwLock<BTreeMap<String, Upstream>>,
}

impl std::fmt::Debug for Upstreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstreams")
            .field("names", &self.names())
            .finish()
    }
}

impl Upstreams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration
    ///
    /// # Errors
    /// Returns an error if any upstream cannot be built.
    pub fn from_configs(configs: &[UpstreamConfig]) -> Result<Self> {
        let upstreams = Self::new();
        upstreams.reconfigure(configs)?;
        Ok(upstreams)
    }

    /// Register (or replace) an upstream under `name`
    pub fn add(&self, name: impl Into<String>, publisher: Arc<dyn Publisher>) {
        let name = name.into();
        debug!(upstream = %name, "Added upstream");
        self.write().insert(
            name,
            Upstream {
                config: None,
                publisher,
            },
        );
    }

    /// Remove an upstream, returning whether it existed
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.write().remove(name).is_some();
        if removed {
            debug!(upstream = %name, "Removed upstream");
        }
        removed
    }

    /// Names of all registered upstreams, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Look up one upstream's publisher
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Publisher>> {
        self.read()
            .get(name)
            .map(|upstream| Arc::clone(&upstream.publisher))
    }

    /// Subscribe to a named upstream's in-process stream, if it offers one
    ///
    /// The registry itself has no stream of its own: [`Publisher::subscribe`]
    /// on `Upstreams` always returns `None`.
    #[must_use]
    pub fn subscribe_to(&self, name: &str) -> Option<broadcast::Receiver<Arc<Snapshot>>> {
        self.get(name)?.subscribe()
    }

    /// Apply a new upstream list
    ///
    /// New names are added, names whose type or options changed are rebuilt,
    /// identical entries are kept as-is (subscribers stay attached), and
    /// names absent from `configs` are removed.
    ///
    /// All new publishers are built before the registry is touched, so a bad
    /// entry leaves the current set unchanged.
    ///
    /// # Errors
    /// Returns an error on duplicate names or if an upstream cannot be built.
    pub fn reconfigure(&self, configs: &[UpstreamConfig]) -> Result<ReconfigureReport> {
        let mut seen = HashSet::with_capacity(configs.len());
        for config in configs {
            if !seen.insert(config.name.as_str()) {
                return Err(anyhow!("duplicate upstream name '{}'", config.name));
            }
        }

        let mut report = ReconfigureReport::default();
        let mut rebuilt = Vec::new();
        {
            let entries = self.read();
            for config in configs {
                let name = config.name.to_string();
                match entries.get(&name) {
                    Some(existing) if existing.config.as_ref() == Some(config) => {
                        report.unchanged.push(name);
                    }
                    Some(_) => {
                        rebuilt.push((config.clone(), build_publisher(config)?));
                        report.updated.push(name);
                    }
                    None => {
                        rebuilt.push((config.clone(), build_publisher(config)?));
                        report.added.push(name);
                    }
                }
            }
        }

        let mut entries = self.write();
        entries.retain(|name, _| {
            let keep = seen.contains(name.as_str());
            if !keep {
                report.removed.push(name.clone());
            }
            keep
        });
        for (config, publisher) in rebuilt {
            entries.insert(
                config.name.to_string(),
                Upstream {
                    config: Some(config),
                    publisher,
                },
            );
        }
        drop(entries);

        info!(
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            unchanged = report.unchanged.len(),
            "Upstreams reconfigured"
        );
        Ok(report)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Upstream>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Upstream>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Publisher for Upstreams {
    fn name(&self) -> &str {
        "upstreams"
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        // Snapshot the registry so no lock is held across an await
        let targets: Vec<(String, Arc<dyn Publisher>)> = self
            .read()
            .iter()
            .map(|(name, upstream)| (name.clone(), Arc::clone(&upstream.publisher)))
            .collect();

        let mut failed = Vec::new();
        for (name, publisher) in &targets {
            if let Err(e) = publisher.publish(snapshot).await {
                error!(
                    upstream = %name,
                    sequence = snapshot.sequence,
                    "Push to upstream failed: {:#}",
                    e
                );
                failed.push(name.as_str());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "{} of {} upstream(s) failed: {}",
                failed.len(),
                targets.len(),
                failed.join(", ")
            ))
        }
    }
}
