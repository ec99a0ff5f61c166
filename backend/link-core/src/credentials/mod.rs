//! Credential pair value type and the store it lives in.
//!
//! A [`CredentialPair`] is issued by the exchange endpoint, kept in a
//! [`CredentialStore`], and superseded (never mutated) when a newer pair arrives.

pub mod store;

pub use store::{CredentialStore, MemoryCredentialStore};

use common::{RedactError, RedactedToken};

use std::fmt;

use serde::Deserialize;

/// JSON field carrying the short-lived access token.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";
/// JSON field carrying the refresh token.
pub const REFRESH_TOKEN_FIELD: &str = "refresh_token";

/// An access/refresh token pair.
///
/// Two pairs are identical iff both tokens match exactly. Neither token is
/// ever empty.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialPair {
    access_token: RedactedToken,
    refresh_token: RedactedToken,
}

impl CredentialPair {
    #[track_caller]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, RedactError> {
        Ok(Self {
            access_token: RedactedToken::new(access_token)?,
            refresh_token: RedactedToken::new(refresh_token)?,
        })
    }

    pub fn access_token(&self) -> &RedactedToken {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &RedactedToken {
        &self.refresh_token
    }

    /// Structurally verify a response body.
    ///
    /// Returns `Some` only when the body is a JSON object whose `access_token`
    /// and `refresh_token` fields are both present, string-typed and non-empty.
    /// Extra fields are ignored.
    pub fn from_json_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<CredentialPair>(body).ok()
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &self.access_token.fingerprint())
            .field("refresh_token", &self.refresh_token.fingerprint())
            .finish()
    }
}
