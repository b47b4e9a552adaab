//! Per-user reduction of buffered samples

use crate::error::AggregateError;

/// Reduce one user's samples to their arithmetic mean
///
/// Plain IEEE-754 summation in insertion order; the last bits may depend on
/// arrival order, no compensated summation is attempted. When the running sum
/// overflows, each sample is scaled by `1/n` before summing, so the mean of
/// finite samples is always finite.
///
/// # Errors
/// Returns [`AggregateError::EmptyReduction`] for an empty slice. The buffer
/// never stores an empty sequence, so this indicates a bug in the caller.
///
/// # Examples
/// ```
/// use count_relay::reducer::reduce;
///
/// assert_eq!(reduce(&[10.0, 20.0]).unwrap(), 15.0);
/// assert!(reduce(&[]).is_err());
/// ```
pub fn reduce(samples: &[f64]) -> Result<f64, AggregateError> {
    if samples.is_empty() {
        return Err(AggregateError::EmptyReduction);
    }
    let n = samples.len() as f64;
    let sum: f64 = samples.iter().sum();
    if sum.is_finite() {
        return Ok(sum / n);
    }
    Ok(samples.iter().map(|v| v / n).sum())
}
