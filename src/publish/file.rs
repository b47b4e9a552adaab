//! Append-only JSON-lines file publisher

use super::Publisher;
use crate::snapshot::Snapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Appends each snapshot as one JSON line to a file
///
/// The file is opened per snapshot so it can be rotated or removed between
/// ticks without restarting the relay.
#[derive(Debug, Clone)]
pub struct FilePublisher {
    name: String,
    path: PathBuf,
}

impl FilePublisher {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Publisher for FilePublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let mut line = snapshot.to_json_line()?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open '{}'", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to '{}'", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
