//! Credential store contract and an in-memory implementation.
//!
//! The store is shared between the request authenticator (which reads and
//! writes it) and the connection manager (which follows its changes). Writes
//! replace the whole pair; last write wins.

use crate::credentials::CredentialPair;

use log::debug;
use tokio::sync::watch;

/// Holder of the current credential pair.
///
/// Implementations must be cheap to call from async code: `get` and `set`
/// never block on I/O.
pub trait CredentialStore: Send + Sync + 'static {
    /// Current pair, if any.
    fn get(&self) -> Option<CredentialPair>;

    /// Replace the current pair (or clear it with `None`).
    fn set(&self, credentials: Option<CredentialPair>);

    /// Change notifications. The receiver starts marked as seen, so only
    /// writes made after subscribing are reported.
    fn subscribe(&self) -> watch::Receiver<Option<CredentialPair>>;
}

/// Process-local store backed by a watch channel.
pub struct MemoryCredentialStore {
    sender: watch::Sender<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    pub fn new(initial: Option<CredentialPair>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<CredentialPair> {
        self.sender.borrow().clone()
    }

    fn set(&self, credentials: Option<CredentialPair>) {
        debug!(
            "Credential store updated: {}",
            if credentials.is_some() { "pair set" } else { "cleared" }
        );
        // Notifies even when the value is unchanged; consumers de-duplicate.
        self.sender.send_replace(credentials);
    }

    fn subscribe(&self) -> watch::Receiver<Option<CredentialPair>> {
        self.sender.subscribe()
    }
}
