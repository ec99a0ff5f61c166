//! Stream transport seam.
//!
//! The connection manager does not know how a stream is opened. It asks a
//! [`StreamConnector`] for a new [`TransportHandle`] and hands it a
//! [`TransportEventSink`] tagged with the handle's generation. Every event the
//! transport reports goes back through the manager's command queue, where
//! events from superseded generations are dropped.

use crate::connection::actor::Command;
use crate::events::StreamPayload;

use common::RedactedToken;

use log::trace;
use tokio::sync::mpsc;

/// What a transport can report about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Message(StreamPayload),
    Disconnected { reason: String },
    Error { reason: String },
}

/// Live transport owned by the connection manager.
pub trait TransportHandle: Send {
    /// Tear the transport down. Must be idempotent.
    fn close(&mut self);
}

/// Opens stream transports.
pub trait StreamConnector: Send + Sync + 'static {
    /// Start opening a stream authenticated with `access_token`.
    ///
    /// Must not block: the open completes asynchronously and is reported
    /// through `events` (`connected`, then `message`s, then `disconnected` or `error`).
    fn connect(&self, access_token: &RedactedToken, events: TransportEventSink)
        -> Box<dyn TransportHandle>;
}

/// Generation-tagged channel from one transport handle back to its manager.
#[derive(Clone)]
pub struct TransportEventSink {
    generation: u64,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl TransportEventSink {
    pub(crate) fn new(generation: u64, commands: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self {
            generation,
            commands,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connected(&self) -> bool {
        self.emit(TransportEvent::Connected)
    }

    pub fn message(&self, payload: StreamPayload) -> bool {
        self.emit(TransportEvent::Message(payload))
    }

    pub fn disconnected(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Disconnected {
            reason: reason.into(),
        })
    }

    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error {
            reason: reason.into(),
        })
    }

    /// Returns false once the manager is gone; transports should stop then.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let Some(commands) = self.commands.upgrade() else {
            trace!(
                "Transport generation {} reported {event:?} after manager shut down",
                self.generation
            );
            return false;
        };

        commands
            .send(Command::Transport {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}
