//! Publishers that print snapshots for humans or log collectors

use super::Publisher;
use crate::snapshot::Snapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use tracing::info;

/// Writes each snapshot as one JSON line to stdout
#[derive(Debug, Clone)]
pub struct StdoutPublisher {
    name: String,
}

impl StdoutPublisher {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Publisher for StdoutPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let line = snapshot.to_json_line()?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").context("Failed to write snapshot to stdout")?;
        stdout.flush().context("Failed to flush stdout")?;
        Ok(())
    }
}

/// Emits each snapshot as a structured `info` event
#[derive(Debug, Clone)]
pub struct LogPublisher {
    name: String,
}

impl LogPublisher {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let payload = snapshot.to_json_line()?;
        info!(
            publisher = %self.name,
            sequence = snapshot.sequence,
            users = snapshot.len(),
            samples = snapshot.sample_count,
            payload = %payload,
            "Snapshot {} covers {} user(s)",
            snapshot.sequence,
            snapshot.len()
        );
        Ok(())
    }
}
