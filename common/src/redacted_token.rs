//! Bearer token wrapper with redacted Debug output.

use crate::{ErrorLocation, RedactError};

use std::fmt;

use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use zeroize::Zeroize;

/// A bearer token (access or refresh) that never exposes its value in logs.
///
/// Equality compares the underlying value, which is what credential
/// de-duplication needs. The value is zeroized on drop.
#[derive(Clone)]
pub struct RedactedToken {
    inner: String,
}

impl RedactedToken {
    /// Wrap a token value. Empty values are rejected.
    #[track_caller]
    pub fn new(token: impl Into<String>) -> Result<Self, RedactError> {
        let inner = token.into();
        if inner.is_empty() {
            return Err(RedactError::EmptyToken {
                message: String::from("token value must not be empty"),
                location: ErrorLocation::caller(),
            });
        }
        Ok(Self { inner })
    }

    /// Get the actual token value for transmission.
    ///
    /// # Security Note
    /// Only call this when putting the token on the wire.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Token length (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Last few characters, for log lines that need to tell tokens apart.
    pub fn fingerprint(&self) -> String {
        let tail: String = self
            .inner
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{tail}")
    }
}

impl PartialEq for RedactedToken {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for RedactedToken {}

impl fmt::Debug for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedToken([REDACTED])")
    }
}

impl fmt::Display for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED TOKEN]")
    }
}

impl Drop for RedactedToken {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Tokens only leave the process through `expose()`.
impl serde::Serialize for RedactedToken {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::Serialization {
            message: String::from("RedactedToken cannot be serialized - use expose() explicitly"),
            location: ErrorLocation::caller(),
        }))
    }
}

impl<'de> serde::Deserialize<'de> for RedactedToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        RedactedToken::new(value).map_err(D::Error::custom)
    }
}
