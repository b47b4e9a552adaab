//! UDP datagram front-end
//!
//! Producers send one JSON object per datagram:
//!
//! ```json
//! {"user": "alice", "count": 42}
//! ```
//!
//! Each valid datagram becomes one [`Aggregator::submit`] call. Malformed
//! datagrams and refused submissions are logged and dropped; the sender
//! never gets a reply.

use crate::aggregator::{Aggregator, SubmitError, SubmitOutcome};
use crate::constants::ingest::MAX_DATAGRAM;
use crate::types::{UserId, ValidationError};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Users permitted to submit through the ingest socket
///
/// An empty list allows every user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    users: HashSet<UserId>,
}

impl AllowList {
    /// Build from raw configuration entries
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyUserId`] for a blank entry.
    pub fn new<I, S>(users: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let users = users
            .into_iter()
            .map(|user| UserId::new(user.into()))
            .collect::<Result<_, _>>()?;
        Ok(Self { users })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn allows(&self, user: &UserId) -> bool {
        self.users.is_empty() || self.users.contains(user)
    }
}

/// Wire shape of one datagram
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CountDatagram {
    pub user: String,
    pub count: f64,
}

impl CountDatagram {
    /// Decode a datagram payload
    ///
    /// # Errors
    /// Returns [`IngestError::Malformed`] for anything that is not a JSON
    /// object with a string `user` and a numeric `count`.
    pub fn parse(payload: &[u8]) -> Result<Self, IngestError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Reasons a datagram did not produce a buffered sample
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    #[error("malformed datagram: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Refused(#[from] SubmitError),
}

/// Datagram counters, readable while the server runs
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    malformed: AtomicU64,
    refused: AtomicU64,
    recv_errors: AtomicU64,
}

impl IngestStats {
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn refused(&self) -> u64 {
        self.refused.load(Ordering::Relaxed)
    }

    /// Socket receive failures (the loop keeps running after each)
    #[must_use]
    pub fn recv_errors(&self) -> u64 {
        self.recv_errors.load(Ordering::Relaxed)
    }
}

/// UDP server feeding an [`Aggregator`]
#[derive(Debug)]
pub struct IngestServer {
    socket: UdpSocket,
    aggregator: Aggregator,
    stats: IngestStats,
}

impl IngestServer {
    /// Bind the ingest socket
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: &str, aggregator: Aggregator) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind ingest socket on {addr}"))?;
        info!("Receiving count datagrams on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            aggregator,
            stats: IngestStats::default(),
        })
    }

    /// Address actually bound (useful with port 0)
    ///
    /// # Errors
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    #[must_use]
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Decode one datagram and submit it
    ///
    /// # Errors
    /// Returns the reason the datagram was dropped.
    pub fn handle_datagram(&self, payload: &[u8]) -> Result<SubmitOutcome, IngestError> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let datagram = CountDatagram::parse(payload).inspect_err(|_| {
            self.stats.malformed.fetch_add(1, Ordering::Relaxed);
        })?;

        self.aggregator
            .submit(&datagram.user, datagram.count)
            .inspect_err(|_| {
                self.stats.refused.fetch_add(1, Ordering::Relaxed);
            })
            .map_err(IngestError::from)
    }

    /// Handle the outcome of one `recv_from`
    ///
    /// A failed receive (e.g. `ENOBUFS`, or `ECONNREFUSED` surfaced from an
    /// ICMP error) is logged and counted; it never ends the loop.
    fn handle_received(&self, received: io::Result<(usize, SocketAddr)>, buf: &[u8]) {
        match received {
            Ok((len, peer)) => match self.handle_datagram(&buf[..len]) {
                Ok(outcome) => debug!(%peer, ?outcome, "Datagram accepted"),
                Err(e) => warn!(%peer, "Bad datagram ignored: {}", e),
            },
            Err(e) => {
                self.stats.recv_errors.fetch_add(1, Ordering::Relaxed);
                error!("Failed to receive datagram: {}", e);
            }
        }
    }

    /// Receive datagrams until `shutdown` fires or its sender is dropped
    ///
    /// Socket errors are logged and the loop continues.
    ///
    /// # Errors
    /// Currently always returns `Ok`; the `Result` is kept for the binary's
    /// error path.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown initiated, stopping ingest loop");
                    break;
                }

                received = self.socket.recv_from(&mut buf) => {
                    self.handle_received(received, &buf);
                }
            }
        }

        info!(
            received = self.stats.received(),
            malformed = self.stats.malformed(),
            refused = self.stats.refused(),
            recv_errors = self.stats.recv_errors(),
            "Ingest stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_datagram() {
        let datagram = CountDatagram::parse(br#"{"user": "etoccalino", "count": 12}"#).unwrap();
        assert_eq!(datagram.user, "etoccalino");
        assert_eq!(datagram.count, 12.0);
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        for payload in [
            &b"12"[..],
            b"not json",
            br#"{"user": "alice"}"#,
            br#"{"count": 3}"#,
            br#"{"user": "alice", "count": "three"}"#,
        ] {
            assert!(
                matches!(CountDatagram::parse(payload), Err(IngestError::Malformed(_))),
                "payload {:?} should be malformed",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_allow_list_empty_allows_all() {
        let allow = AllowList::default();
        assert!(allow.allows(&UserId::try_from("anyone").unwrap()));
    }

    #[test]
    fn test_allow_list_restricts() {
        let allow = AllowList::new(["alice", "bob"]).unwrap();
        assert_eq!(allow.len(), 2);
        assert!(allow.allows(&UserId::try_from("alice").unwrap()));
        assert!(!allow.allows(&UserId::try_from("mallory").unwrap()));
    }

    #[test]
    fn test_allow_list_rejects_blank_entry() {
        assert_eq!(
            AllowList::new(["alice", ""]),
            Err(ValidationError::EmptyUserId)
        );
    }

    #[tokio::test]
    async fn test_handle_datagram_counts_outcomes() {
        let aggregator = Aggregator::default();
        let server = IngestServer::bind("127.0.0.1:0", aggregator.clone())
            .await
            .unwrap();

        assert!(server.handle_datagram(br#"{"user":"alice","count":3}"#).is_ok());
        assert!(server.handle_datagram(b"garbage").is_err());
        assert!(server.handle_datagram(br#"{"user":"","count":3}"#).is_err());

        assert_eq!(server.stats().received(), 3);
        assert_eq!(server.stats().malformed(), 1);
        assert_eq!(server.stats().refused(), 1);
        assert_eq!(aggregator.buffered_samples(), 1);
    }

    #[tokio::test]
    async fn test_receive_error_does_not_stop_ingest() {
        let aggregator = Aggregator::default();
        let server = IngestServer::bind("127.0.0.1:0", aggregator.clone())
            .await
            .unwrap();
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let payload = br#"{"user":"alice","count":4}"#;

        server.handle_received(Err(io::Error::from(io::ErrorKind::ConnectionRefused)), payload);
        server.handle_received(Ok((payload.len(), peer)), payload);

        assert_eq!(server.stats().recv_errors(), 1);
        assert_eq!(server.stats().received(), 1);
        assert_eq!(aggregator.buffered_samples(), 1);
    }
}
