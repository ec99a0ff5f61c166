//! Lifecycle event bus.
//!
//! Multicasts connection lifecycle transitions and stream payloads to any
//! number of subscribers. Built on `tokio::sync::broadcast`:
//!
//! - Publishing never blocks and never fails the producer
//! - A subscriber that falls behind lags and loses its oldest events, others are unaffected
//! - No replay: subscribers only see events published after they subscribed
//!
//! Current connection state is read from the connection manager's status watch,
//! not from this bus.

use crate::connection::state::ConnectionState;

use std::time::Duration;

use log::trace;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A payload received over the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPayload {
    Text(String),
    Binary(Vec<u8>),
}

/// Notifications published by the connection manager and the request authenticator.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The connection manager moved to a new state.
    StateChanged(ConnectionState),

    /// A new transport handle became the active one.
    TransportAttached { generation: u64 },

    /// The active transport handle was torn down; no transport is current.
    TransportDetached { generation: u64 },

    /// The active transport finished opening.
    Connected { generation: u64 },

    /// The active transport failed or was closed by the remote end.
    Disconnected { generation: u64, reason: String },

    /// A reconnect attempt has been scheduled.
    ReconnectScheduled { attempt: u32, delay: Duration },

    /// The token factory failed while preparing a reconnect.
    CredentialRefreshFailed { message: String },

    /// A message arrived on the active transport.
    Message(StreamPayload),

    /// Authentication could not be recovered; the user has to log in again.
    SessionInvalid,
}

/// Cloneable publishing side of the bus.
#[derive(Clone)]
pub struct LifecycleBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New receiver; sees only events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Publish to every current subscriber.
    pub fn publish(&self, event: LifecycleEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            trace!("No lifecycle subscribers for {event:?}");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
