//! In-process fan-out over a tokio broadcast channel

use super::Publisher;
use crate::snapshot::Snapshot;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Delivers snapshots to every live subscriber
///
/// Subscribers that fall more than `capacity` snapshots behind see a
/// `Lagged` error and skip ahead; the scheduler is never slowed down by them.
/// Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    name: String,
    sender: broadcast::Sender<Arc<Snapshot>>,
}

impl BroadcastPublisher {
    /// Create a publisher with the given channel capacity
    ///
    /// # Errors
    /// Returns an error if `capacity` is zero.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            bail!("broadcast capacity must be greater than 0");
        }
        let (sender, _) = broadcast::channel(capacity);
        Ok(Self {
            name: name.into(),
            sender,
        })
    }

    /// Number of live subscribers
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl Publisher for BroadcastPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        match self.sender.send(Arc::new(snapshot.clone())) {
            Ok(receivers) => {
                debug!(
                    publisher = %self.name,
                    sequence = snapshot.sequence,
                    receivers,
                    "Broadcast snapshot"
                );
            }
            Err(_) => {
                debug!(
                    publisher = %self.name,
                    sequence = snapshot.sequence,
                    "No subscribers for snapshot"
                );
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<Arc<Snapshot>>> {
        Some(self.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(BroadcastPublisher::new("bus", 0).is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = BroadcastPublisher::new("bus", 4).unwrap();
        assert_eq!(publisher.receiver_count(), 0);
        publisher.publish(&Snapshot::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_snapshot() {
        let publisher = BroadcastPublisher::new("bus", 4).unwrap();
        let mut first = publisher.subscribe().unwrap();
        let mut second = publisher.subscribe().unwrap();
        assert_eq!(publisher.receiver_count(), 2);

        let snapshot = Snapshot {
            sequence: 9,
            ..Default::default()
        };
        publisher.publish(&snapshot).await.unwrap();

        assert_eq!(first.recv().await.unwrap().sequence, 9);
        assert_eq!(second.recv().await.unwrap().sequence, 9);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let publisher = BroadcastPublisher::new("bus", 2).unwrap();
        let mut slow = publisher.subscribe().unwrap();

        for sequence in 1..=4 {
            let snapshot = Snapshot {
                sequence,
                ..Default::default()
            };
            publisher.publish(&snapshot).await.unwrap();
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(slow.recv().await.unwrap().sequence, 3);
    }
}
