//! Error types for the aggregation core

use thiserror::Error;

/// Errors raised by the sample buffer and the reducer
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum AggregateError {
    /// A non-finite value was submitted; it never enters the buffer
    #[error("invalid sample {value} for user '{user}': value must be finite")]
    InvalidSample { user: String, value: f64 },

    /// The reducer was handed zero samples (internal invariant violation)
    #[error("cannot reduce an empty sample sequence")]
    EmptyReduction,
}

impl AggregateError {
    /// Check if this error is an internal invariant violation rather than bad input
    #[must_use]
    #[inline]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::EmptyReduction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sample_display() {
        let err = AggregateError::InvalidSample {
            user: "alice".to_string(),
            value: f64::INFINITY,
        };
        assert_eq!(
            err.to_string(),
            "invalid sample inf for user 'alice': value must be finite"
        );
        assert!(!err.is_invariant_violation());
    }

    #[test]
    fn test_empty_reduction_is_invariant_violation() {
        assert!(AggregateError::EmptyReduction.is_invariant_violation());
    }
}
