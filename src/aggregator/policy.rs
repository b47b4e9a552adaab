//! Handling of non-finite samples at the submit boundary

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What `submit` does with a `NaN` or infinite value
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InvalidSamplePolicy {
    /// Fail the submission with `InvalidSample` (default)
    #[default]
    Reject,
    /// Replace `±Inf` with `±f64::MAX`; `NaN` is still rejected
    Clamp,
    /// Drop the value silently
    Ignore,
}

/// Outcome of applying a policy to one value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyDecision {
    /// Value is finite, buffer it unchanged
    Accept(f64),
    /// Value was clamped to a finite bound
    Clamped(f64),
    /// Value is dropped without error
    Drop,
    /// Value is rejected with an error
    Reject,
}

impl InvalidSamplePolicy {
    /// Decide what to do with `value`
    ///
    /// Finite values are always accepted regardless of policy.
    #[must_use]
    pub fn apply(self, value: f64) -> PolicyDecision {
        if value.is_finite() {
            return PolicyDecision::Accept(value);
        }
        match self {
            Self::Reject => PolicyDecision::Reject,
            Self::Ignore => PolicyDecision::Drop,
            Self::Clamp if value.is_nan() => PolicyDecision::Reject,
            Self::Clamp if value.is_sign_positive() => PolicyDecision::Clamped(f64::MAX),
            Self::Clamp => PolicyDecision::Clamped(f64::MIN),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Clamp => "clamp",
            Self::Ignore => "ignore",
        }
    }
}

impl std::fmt::Display for InvalidSamplePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidSamplePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "clamp" => Ok(Self::Clamp),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown invalid-sample policy '{other}' (expected reject, clamp or ignore)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_reject() {
        assert_eq!(InvalidSamplePolicy::default(), InvalidSamplePolicy::Reject);
    }

    #[test]
    fn test_finite_always_accepted() {
        for policy in [
            InvalidSamplePolicy::Reject,
            InvalidSamplePolicy::Clamp,
            InvalidSamplePolicy::Ignore,
        ] {
            assert_eq!(policy.apply(1.5), PolicyDecision::Accept(1.5));
        }
    }

    #[test]
    fn test_reject_policy() {
        let policy = InvalidSamplePolicy::Reject;
        assert_eq!(policy.apply(f64::NAN), PolicyDecision::Reject);
        assert_eq!(policy.apply(f64::INFINITY), PolicyDecision::Reject);
    }

    #[test]
    fn test_clamp_policy() {
        let policy = InvalidSamplePolicy::Clamp;
        assert_eq!(policy.apply(f64::INFINITY), PolicyDecision::Clamped(f64::MAX));
        assert_eq!(
            policy.apply(f64::NEG_INFINITY),
            PolicyDecision::Clamped(f64::MIN)
        );
        assert_eq!(policy.apply(f64::NAN), PolicyDecision::Reject);
    }

    #[test]
    fn test_ignore_policy() {
        let policy = InvalidSamplePolicy::Ignore;
        assert_eq!(policy.apply(f64::NAN), PolicyDecision::Drop);
        assert_eq!(policy.apply(f64::NEG_INFINITY), PolicyDecision::Drop);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "Clamp".parse::<InvalidSamplePolicy>(),
            Ok(InvalidSamplePolicy::Clamp)
        );
        assert_eq!(
            " ignore ".parse::<InvalidSamplePolicy>(),
            Ok(InvalidSamplePolicy::Ignore)
        );
        assert!("drop".parse::<InvalidSamplePolicy>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&InvalidSamplePolicy::Ignore).unwrap();
        assert_eq!(json, "\"ignore\"");
        let back: InvalidSamplePolicy = serde_json::from_str("\"clamp\"").unwrap();
        assert_eq!(back, InvalidSamplePolicy::Clamp);
    }

    #[test]
    fn test_display() {
        assert_eq!(InvalidSamplePolicy::Reject.to_string(), "reject");
    }
}
