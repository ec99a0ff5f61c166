//! Connection state machine vocabulary.

use std::fmt;
use std::time::Duration;

/// Where the connection manager is in its lifecycle.
///
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Failed,
    ReconnectPending,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
            ConnectionState::ReconnectPending => "reconnect_pending",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot published on the manager's status watch.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Delay the next failure will be scheduled with.
    pub backoff_delay: Duration,
    /// Consecutive failures since the last successful connection.
    pub attempt: u32,
    /// Generation of the active transport handle, if there is one.
    pub transport_generation: Option<u64>,
}

impl ConnectionStatus {
    pub fn idle(backoff_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Idle,
            backoff_delay,
            attempt: 0,
            transport_generation: None,
        }
    }
}
