//! Validated string types that enforce invariants at construction time

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Validation errors for string types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("user id cannot be empty or whitespace")]
    EmptyUserId,

    #[error("upstream name cannot be empty or whitespace")]
    EmptyUpstreamName,
}

/// Macro to generate validated string newtypes.
///
/// Each generated type gets:
/// - A `new()` constructor that validates
/// - `as_str()` getter
/// - `AsRef<str>`, `Borrow<str>`, `Deref`, `Display`, `TryFrom<String>`, `TryFrom<&str>` impls
/// - Serde `Serialize` and `Deserialize` with validation
///
/// `Borrow<str>` is sound here because the derived `Hash`/`Eq` delegate to the
/// inner `String`, which hashes identically to `str`.
macro_rules! validated_string {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident(String) {
            validation: |$s_param:ident| $validation:expr,
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        $vis struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", stringify!($name), " after validation")]
            pub fn new($s_param: String) -> Result<Self, ValidationError> {
                let validate = || $validation;
                validate()?;
                Ok(Self($s_param))
            }

            #[doc = concat!("Get the ", stringify!($name), " as a string slice")]
            #[must_use]
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[doc = concat!("Consume the ", stringify!($name), " and return the inner string")]
            #[must_use]
            #[inline]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from($s_param: String) -> Result<Self, Self::Error> {
                Self::new($s_param)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::new(s.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_string! {
    /// Identifier of the user a sample belongs to
    ///
    /// Never empty or whitespace-only, so a buffered key always names a user.
    ///
    /// # Examples
    /// ```
    /// use count_relay::types::UserId;
    ///
    /// let user = UserId::new("alice".to_string()).unwrap();
    /// assert_eq!(user.as_str(), "alice");
    ///
    /// assert!(UserId::new("".to_string()).is_err());
    /// assert!(UserId::new("  ".to_string()).is_err());
    /// ```
    #[doc(alias = "username")]
    pub struct UserId(String) {
        validation: |s| {
            if s.trim().is_empty() {
                Err(ValidationError::EmptyUserId)
            } else {
                Ok(())
            }
        },
    }
}

validated_string! {
    /// Name of a configured snapshot upstream
    pub struct UpstreamName(String) {
        validation: |s| {
            if s.trim().is_empty() {
                Err(ValidationError::EmptyUpstreamName)
            } else {
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_user_id_valid() {
        let user = UserId::new("etoccalino".to_string()).unwrap();
        assert_eq!(user.as_str(), "etoccalino");
        assert_eq!(user.to_string(), "etoccalino");
    }

    #[test]
    fn test_user_id_keeps_surrounding_whitespace() {
        // Only all-whitespace ids are rejected; others are stored verbatim
        let user = UserId::new(" bob ".to_string()).unwrap();
        assert_eq!(user.as_str(), " bob ");
    }

    #[test]
    fn test_user_id_empty_rejected() {
        assert_eq!(
            UserId::new(String::new()).unwrap_err(),
            ValidationError::EmptyUserId
        );
    }

    #[test]
    fn test_user_id_whitespace_rejected() {
        assert!(UserId::new("\t \n".to_string()).is_err());
    }

    #[test]
    fn test_user_id_try_from_str() {
        let user = UserId::try_from("carol").unwrap();
        assert_eq!(&*user, "carol");
        assert!(UserId::try_from("").is_err());
    }

    #[test]
    fn test_user_id_hashmap_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(UserId::try_from("alice").unwrap(), 1);
        assert_eq!(map.get("alice"), Some(&1));
        assert_eq!(map.get("bob"), None);
    }

    #[test]
    fn test_user_id_serde_roundtrip() {
        let user = UserId::try_from("dave").unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, "\"dave\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_user_id_deserialize_empty_rejected() {
        let result: Result<UserId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_upstream_name_validation() {
        assert!(UpstreamName::try_from("archive").is_ok());
        assert_eq!(
            UpstreamName::try_from("   ").unwrap_err(),
            ValidationError::EmptyUpstreamName
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::EmptyUserId.to_string(),
            "user id cannot be empty or whitespace"
        );
        assert_eq!(
            ValidationError::EmptyUpstreamName.to_string(),
            "upstream name cannot be empty or whitespace"
        );
    }
}
