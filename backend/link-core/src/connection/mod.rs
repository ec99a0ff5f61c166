//! Resilient stream connection.
//!
//! [`ConnectionManager`] keeps at most one live stream transport open and
//! reconnects it with exponential backoff when it fails, asking a
//! [`TokenFactory`] for fresh credentials before every attempt.
//!
//! # Architecture
//!
//! All state lives in a single actor task:
//! - `ConnectionManager` is a cheap `Clone` handle that only sends commands
//! - Status reads go through a `watch` channel and never wait on the actor
//! - Lifecycle notifications are published on the shared [`LifecycleBus`]

mod actor;
pub mod backoff;
pub mod state;
pub mod token_factory;
pub mod transport;
pub mod websocket;

pub use backoff::{ReconnectBackoff, ReconnectPolicy};
pub use state::{ConnectionState, ConnectionStatus};
pub use token_factory::TokenFactory;
pub use transport::{StreamConnector, TransportEvent, TransportEventSink, TransportHandle};
pub use websocket::WebSocketConnector;

use crate::connection::actor::{Command, ConnectionActor};
use crate::credentials::{CredentialPair, CredentialStore};
use crate::error::connection::ConnectionError;
use crate::events::{LifecycleBus, LifecycleEvent};

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Handle to a connection manager actor.
///
/// Clones share the same connection. The actor stops once `close` has been
/// called or every handle has been dropped.
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    bus: LifecycleBus,
}

impl ConnectionManager {
    /// Spawn a new manager in the `Idle` state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        policy: ReconnectPolicy,
        bus: LifecycleBus,
    ) -> Self {
        let backoff = ReconnectBackoff::new(policy);
        let (status, _) = watch::channel(ConnectionStatus::idle(backoff.current_delay()));
        let status = Arc::new(status);
        let (commands, receiver) = mpsc::unbounded_channel();

        let actor = ConnectionActor::new(
            connector,
            bus.clone(),
            Arc::clone(&status),
            commands.downgrade(),
            backoff,
        );
        tokio::spawn(actor.run(receiver));

        Self {
            commands,
            status,
            bus,
        }
    }

    /// Initial connect: obtain credentials from `factory`, then open the stream.
    pub fn start(&self, factory: Arc<dyn TokenFactory>) -> Result<(), ConnectionError> {
        self.create_or_replace(factory, None)
    }

    /// Open the stream, or move it onto a new credential pair.
    ///
    /// - `credentials: None` asks `factory` for a pair first
    /// - A pair identical to the one the active transport uses is a no-op
    /// - Any other pair replaces the active transport immediately, cancelling
    ///   a pending reconnect and resetting the backoff
    ///
    /// `factory` is retained and used for every later reconnect attempt.
    /// After `close` this is silently ignored.
    pub fn create_or_replace(
        &self,
        factory: Arc<dyn TokenFactory>,
        credentials: Option<CredentialPair>,
    ) -> Result<(), ConnectionError> {
        if self.is_closed() {
            debug!("create_or_replace after close ignored");
            return Ok(());
        }

        self.commands
            .send(Command::CreateOrReplace {
                factory,
                credentials,
            })
            .map_err(|_| ConnectionError::actor_stopped("Connection actor is not running"))
    }

    /// Tear down the transport and any pending retry, then stop.
    ///
    /// Once this returns the manager publishes no further events and opens no
    /// further transports. Calling it again is a no-op.
    pub async fn close(&self) {
        let newly_closed = self.status.send_if_modified(|status| {
            if status.state.is_terminal() {
                return false;
            }
            status.state = ConnectionState::Closed;
            true
        });
        if !newly_closed {
            debug!("Connection manager already closed");
            return;
        }

        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Close { ack }).is_err() {
            warn!("Connection actor already stopped");
            return;
        }
        if done.await.is_err() {
            warn!("Connection actor stopped before acknowledging close");
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Follow status changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Lifecycle events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &LifecycleBus {
        &self.bus
    }

    pub fn is_closed(&self) -> bool {
        self.status.borrow().state.is_terminal()
    }

    /// Feed every credential pair written to `store` into `create_or_replace`.
    ///
    /// Clearing the store does not tear the connection down. The task ends
    /// when the manager is closed or the store goes away.
    pub fn follow_store(
        &self,
        store: Arc<dyn CredentialStore>,
        factory: Arc<dyn TokenFactory>,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        let mut updates = store.subscribe();
        let mut status = self.watch_status();

        tokio::spawn(async move {
            info!("Following credential store updates");

            loop {
                if manager.is_closed() {
                    break;
                }

                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            debug!("Credential store dropped");
                            break;
                        }
                        let credentials = updates.borrow_and_update().clone();
                        match credentials {
                            Some(pair) => {
                                if let Err(e) = manager.create_or_replace(Arc::clone(&factory), Some(pair)) {
                                    warn!("Failed to forward credential update: {e}");
                                    break;
                                }
                            }
                            None => debug!("Credential store cleared, keeping current transport"),
                        }
                    }
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Stopped following credential store");
        })
    }
}
