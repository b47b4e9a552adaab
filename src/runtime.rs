//! Tokio runtime configuration and startup utilities for the binary
//!
//! This module provides:
//! - Testable runtime configuration and builder logic
//! - Config loading with startup logging
//! - Shutdown signal handling

use crate::config::{Config, ConfigSource, load_config_with_fallback};
use crate::publish::Upstreams;
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of worker threads
    worker_threads: usize,
}

impl RuntimeConfig {
    /// Create runtime config from optional thread count
    ///
    /// If `threads` is None, defaults to 1 thread.
    /// If `threads` is Some(0), uses the number of CPU cores.
    /// Single-threaded runtime is used if threads == 1.
    #[must_use]
    pub fn from_args(threads: Option<usize>) -> Self {
        let worker_threads = match threads {
            None => 1,
            Some(0) => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
            Some(n) => n,
        };

        Self { worker_threads }
    }

    /// Get number of worker threads
    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Check if single-threaded
    #[must_use]
    pub const fn is_single_threaded(&self) -> bool {
        self.worker_threads == 1
    }

    /// Build the tokio runtime
    ///
    /// Creates either a current-thread or multi-threaded runtime based on
    /// the configured worker thread count.
    ///
    /// # Errors
    /// Returns error if runtime creation fails
    pub fn build_runtime(self) -> Result<tokio::runtime::Runtime> {
        let rt = if self.is_single_threaded() {
            info!("Starting count relay with single-threaded runtime");
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
        } else {
            info!(
                "Starting count relay with {} worker threads",
                self.worker_threads
            );
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(self.worker_threads)
                .enable_all()
                .build()?
        };

        Ok(rt)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_args(None)
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
///
/// If a handler cannot be installed, that signal source is logged and
/// ignored; the other one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Load configuration and log what will run
///
/// # Errors
/// Returns error if configuration loading fails
pub fn load_and_log_config(config_path: &str) -> Result<(Config, ConfigSource)> {
    let (config, source) = load_config_with_fallback(config_path)?;

    info!("Loaded configuration from {}", source.description());
    log_config(&config);

    Ok((config, source))
}

/// Log the effective settings at startup
pub fn log_config(config: &Config) {
    info!(
        "Aggregating every {:?} (invalid samples: {}, flush on stop: {})",
        config.aggregation.interval,
        config.aggregation.on_invalid_sample,
        config.aggregation.flush_on_stop
    );
    if config.ingest.allow.is_empty() {
        info!("Accepting counts from any user");
    } else {
        info!(
            "Accepting counts from {} allowed user(s)",
            config.ingest.allow.len()
        );
    }
    info!("Publishing to {} upstream(s):", config.upstreams.len());
    for upstream in &config.upstreams {
        info!("  - {} ({})", upstream.name, upstream.kind);
    }
}

/// Build the upstream registry, warning if nothing will receive snapshots
///
/// # Errors
/// Returns error if an upstream cannot be built
pub fn build_upstreams(config: &Config) -> Result<Upstreams> {
    let upstreams =
        Upstreams::from_configs(&config.upstreams).context("Failed to build upstreams")?;
    if upstreams.is_empty() {
        warn!("No upstreams configured; snapshots will be computed and discarded");
    }
    Ok(upstreams)
}

/// Spawn the signal listener
///
/// Waits for a shutdown signal, then notifies the returned receiver once.
#[must_use]
pub fn spawn_shutdown_handler() -> mpsc::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(()).await;
    });

    shutdown_rx
}
