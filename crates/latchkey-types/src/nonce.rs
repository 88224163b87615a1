//! validated activation nonce type.
//!
//! nonces are caller-chosen, once-only tokens. the only structural rule is
//! a minimum length; uniqueness is enforced by the replay guard, not here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// minimum accepted nonce length in bytes.
pub const MIN_NONCE_LEN: usize = 8;

/// a validated activation nonce.
///
/// guaranteed non-empty and at least [`MIN_NONCE_LEN`] bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// create a new nonce, validating the minimum length.
    pub fn new(s: impl Into<String>) -> Result<Self, NonceError> {
        let s = s.into();
        if s.len() < MIN_NONCE_LEN {
            return Err(NonceError::TooShort {
                min: MIN_NONCE_LEN,
                got: s.len(),
            });
        }
        Ok(Self(s))
    }

    /// the nonce string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the nonce and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nonce {
    type Err = NonceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// error type for invalid nonces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NonceError {
    /// the nonce was shorter than the minimum length.
    #[error("nonce must be at least {min} characters, got {got}")]
    TooShort {
        /// required minimum length.
        min: usize,
        /// actual length.
        got: usize,
    },
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Nonce {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn long_enough_strings_accepted(s in ".{8,64}") {
            // regex length counts chars; only byte length >= 8 is guaranteed
            prop_assume!(s.len() >= MIN_NONCE_LEN);
            let nonce = Nonce::new(&s).unwrap();
            prop_assert_eq!(nonce.as_str(), &s);
        }

        #[test]
        fn short_strings_rejected(s in ".{0,7}") {
            prop_assume!(s.len() < MIN_NONCE_LEN);
            let is_too_short = matches!(
                Nonce::new(&s),
                Err(NonceError::TooShort { min: 8, .. })
            );
            prop_assert!(is_too_short);
        }

        #[test]
        fn arbitrary_string_never_panics(s in ".*") {
            let _ = Nonce::new(&s);
            let _ = s.parse::<Nonce>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_length_boundary() {
        assert!(Nonce::new("1234567").is_err());
        assert!(Nonce::new("12345678").is_ok());
    }

    #[test]
    fn test_serde_rejects_short() {
        let result: Result<Nonce, _> = serde_json::from_str(r#""short""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let nonce = Nonce::new("nonce-abc-123").unwrap();
        let json = serde_json::to_string(&nonce).unwrap();
        let parsed: Nonce = serde_json::from_str(&json).unwrap();
        assert_eq!(nonce, parsed);
    }
}
