//! Concurrent per-user sample buffer
//!
//! Producers append samples from any number of tasks or threads while the
//! scheduler periodically takes the whole buffer in one step. Both paths go
//! through the same mutex, so an extraction sees every submission either
//! completely or not at all.

use crate::constants::aggregation::INITIAL_SAMPLES_PER_USER;
use crate::error::AggregateError;
use crate::types::UserId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Buffered samples keyed by user, in arrival order per user
pub type Extraction = HashMap<UserId, Vec<f64>>;

/// Thread-safe accumulation store: user -> ordered sequence of raw samples
///
/// A user key exists only while it has at least one un-flushed sample.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Mutex<Extraction>,
}

impl SampleBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the map, recovering from poisoning
    ///
    /// Every critical section is a single insert/push or a `mem::take`, so a
    /// panic elsewhere cannot leave the map half-updated.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Extraction> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `value` to `user`'s sequence, creating it if absent
    ///
    /// # Errors
    /// Returns [`AggregateError::InvalidSample`] for `NaN` or infinite values;
    /// the buffer is left untouched in that case.
    pub fn submit(&self, user: &UserId, value: f64) -> Result<(), AggregateError> {
        if !value.is_finite() {
            return Err(AggregateError::InvalidSample {
                user: user.to_string(),
                value,
            });
        }

        let mut samples = self.lock();
        // Only clone the key the first time a user shows up in a window
        if let Some(sequence) = samples.get_mut(user.as_str()) {
            sequence.push(value);
        } else {
            let mut sequence = Vec::with_capacity(INITIAL_SAMPLES_PER_USER);
            sequence.push(value);
            samples.insert(user.clone(), sequence);
        }
        Ok(())
    }

    /// Atomically take the full contents and leave the buffer empty
    ///
    /// The lock is held only for the swap; callers reduce and publish the
    /// returned map without blocking producers.
    #[must_use]
    pub fn extract_and_clear(&self) -> Extraction {
        std::mem::take(&mut *self.lock())
    }

    /// Number of users with buffered samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total number of buffered samples across users
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }
}
