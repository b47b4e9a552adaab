//! Snapshot type produced by one aggregation cycle
//!
//! An immutable view of every user's mean for one tick. Created by the
//! scheduler, handed to the publisher once, then dropped.

use crate::buffer::Extraction;
use crate::reducer::reduce;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;

/// Mean of one user's samples over one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub user: UserId,
    pub value: f64,
}

/// Complete set of aggregates for one tick
///
/// User order inside `aggregates` is unspecified. An empty snapshot is a
/// valid "no activity this interval" heartbeat.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick number, strictly increasing per scheduler (first tick is 1)
    pub sequence: u64,
    pub aggregates: Vec<Aggregate>,
    /// Raw samples folded into this snapshot
    #[serde(default)]
    pub sample_count: usize,
}

impl Snapshot {
    /// Reduce an extraction into a snapshot
    ///
    /// Users with an empty sequence cannot come out of the buffer; if one
    /// does, it is logged and left out rather than reported as 0 or NaN.
    #[must_use]
    pub fn from_extraction(sequence: u64, extraction: Extraction) -> Self {
        let mut sample_count = 0;
        let mut aggregates = Vec::with_capacity(extraction.len());

        for (user, samples) in extraction {
            match reduce(&samples) {
                Ok(value) => {
                    sample_count += samples.len();
                    aggregates.push(Aggregate { user, value });
                }
                Err(e) => {
                    debug_assert!(false, "buffer yielded no samples for '{user}'");
                    error!(user = %user, sequence, "Skipping user in snapshot: {}", e);
                }
            }
        }

        Self {
            sequence,
            aggregates,
            sample_count,
        }
    }

    /// Number of users in this snapshot
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    /// Check if no user submitted anything this interval
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    /// Look up one user's aggregate
    #[must_use]
    pub fn get(&self, user: &str) -> Option<f64> {
        self.aggregates
            .iter()
            .find(|aggregate| aggregate.user.as_str() == user)
            .map(|aggregate| aggregate.value)
    }

    /// Iterate over the users present in this snapshot
    pub fn users(&self) -> impl Iterator<Item = &UserId> + '_ {
        self.aggregates.iter().map(|aggregate| &aggregate.user)
    }

    /// Convert into a user -> aggregate map
    #[must_use]
    pub fn into_map(self) -> HashMap<UserId, f64> {
        self.aggregates
            .into_iter()
            .map(|aggregate| (aggregate.user, aggregate.value))
            .collect()
    }

    /// Encode as a single JSON line (no trailing newline)
    ///
    /// Aggregates are means of finite samples and therefore finite, so every
    /// value is written as a JSON number.
    ///
    /// # Errors
    /// Returns the serializer's error; with the field types used here this
    /// does not occur in practice.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction(entries: &[(&str, &[f64])]) -> Extraction {
        entries
            .iter()
            .map(|(user, samples)| (UserId::try_from(*user).unwrap(), samples.to_vec()))
            .collect()
    }

    #[test]
    fn test_from_extraction_averages_each_user() {
        let snapshot =
            Snapshot::from_extraction(1, extraction(&[("alice", &[10.0, 20.0]), ("bob", &[5.0])]));

        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.sample_count, 3);
        assert_eq!(snapshot.get("alice"), Some(15.0));
        assert_eq!(snapshot.get("bob"), Some(5.0));
    }

    #[test]
    fn test_from_empty_extraction() {
        let snapshot = Snapshot::from_extraction(7, Extraction::new());

        assert!(snapshot.is_empty());
        assert_eq!(snapshot.sequence, 7);
        assert_eq!(snapshot.sample_count, 0);
    }

    #[test]
    fn test_absent_user_not_in_snapshot() {
        let snapshot = Snapshot::from_extraction(1, extraction(&[("alice", &[1.0])]));

        assert_eq!(snapshot.get("bob"), None);
        assert!(snapshot.users().all(|user| user.as_str() != "bob"));
    }

    #[test]
    fn test_into_map() {
        let snapshot =
            Snapshot::from_extraction(1, extraction(&[("alice", &[2.0, 4.0]), ("bob", &[1.0])]));
        let map = snapshot.into_map();

        assert_eq!(map.len(), 2);
        assert_eq!(map["alice"], 3.0);
        assert_eq!(map["bob"], 1.0);
    }

    #[test]
    fn test_json_line_shape() {
        let snapshot = Snapshot::from_extraction(3, extraction(&[("alice", &[15.0])]));
        let line = snapshot.to_json_line().unwrap();

        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["sequence"], 3);
        assert_eq!(value["aggregates"][0]["user"], "alice");
        assert_eq!(value["aggregates"][0]["value"], 15.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let snapshot = Snapshot::from_extraction(2, extraction(&[("carol", &[1.5, 2.5])]));
        let back: Snapshot = serde_json::from_str(&snapshot.to_json_line().unwrap()).unwrap();
        assert_eq!(back, snapshot);
    }
}
