//! Connection manager actor.
//!
//! Owns all mutable connection state and processes [`Command`]s one at a time,
//! which gives the manager a single logical execution context:
//!
//! - Public calls (`create_or_replace`, `close`) arrive as commands
//! - Transport callbacks arrive as commands tagged with the transport's generation
//! - Timer expiry and token-factory completion arrive as commands tagged with the
//!   generation of the pending operation that produced them
//!
//! A command whose generation is no longer current is dropped. That is the
//! only cancellation mechanism correctness relies on; aborting the underlying
//! task is best effort.

use crate::connection::backoff::ReconnectBackoff;
use crate::connection::state::{ConnectionState, ConnectionStatus};
use crate::connection::token_factory::TokenFactory;
use crate::connection::transport::{
    StreamConnector, TransportEvent, TransportEventSink, TransportHandle,
};
use crate::credentials::CredentialPair;
use crate::error::AuthError;
use crate::events::{LifecycleBus, LifecycleEvent};

use std::sync::Arc;

use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Everything the actor reacts to.
pub(crate) enum Command {
    /// Initial connect (`credentials: None`) or a possibly-new credential pair.
    CreateOrReplace {
        factory: Arc<dyn TokenFactory>,
        credentials: Option<CredentialPair>,
    },

    /// Event reported by the transport handle of `generation`.
    Transport {
        generation: u64,
        event: TransportEvent,
    },

    /// Backoff timer of `generation` expired.
    TimerFired { generation: u64 },

    /// Token factory call of `generation` completed.
    CredentialsResolved {
        generation: u64,
        result: Result<CredentialPair, AuthError>,
    },

    /// Tear everything down; acknowledge once done.
    Close { ack: oneshot::Sender<()> },
}

struct ActiveTransport {
    generation: u64,
    handle: Box<dyn TransportHandle>,
}

/// The single outstanding timer or token-factory call.
enum PendingRetry {
    Timer { generation: u64, task: JoinHandle<()> },
    Fetch { generation: u64, task: JoinHandle<()> },
}

impl PendingRetry {
    fn generation(&self) -> u64 {
        match self {
            PendingRetry::Timer { generation, .. } | PendingRetry::Fetch { generation, .. } => {
                *generation
            }
        }
    }

    fn cancel(self) {
        match self {
            PendingRetry::Timer { task, .. } | PendingRetry::Fetch { task, .. } => task.abort(),
        }
    }
}

pub(crate) struct ConnectionActor {
    connector: Arc<dyn StreamConnector>,
    bus: LifecycleBus,
    status: Arc<watch::Sender<ConnectionStatus>>,
    commands: mpsc::WeakUnboundedSender<Command>,
    factory: Option<Arc<dyn TokenFactory>>,
    transport: Option<ActiveTransport>,
    /// Pair the most recent transport was opened with; outlives the transport.
    last_credentials: Option<CredentialPair>,
    pending: Option<PendingRetry>,
    backoff: ReconnectBackoff,
    state: ConnectionState,
    last_generation: u64,
}

impl ConnectionActor {
    pub(crate) fn new(
        connector: Arc<dyn StreamConnector>,
        bus: LifecycleBus,
        status: Arc<watch::Sender<ConnectionStatus>>,
        commands: mpsc::WeakUnboundedSender<Command>,
        backoff: ReconnectBackoff,
    ) -> Self {
        Self {
            connector,
            bus,
            status,
            commands,
            factory: None,
            transport: None,
            last_credentials: None,
            pending: None,
            backoff,
            state: ConnectionState::Idle,
            last_generation: 0,
        }
    }

    /// Process commands until every manager handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("Connection actor started");

        while let Some(command) = commands.recv().await {
            if self.is_closed() && !matches!(command, Command::Close { .. }) {
                trace!("Connection closed, ignoring command");
                continue;
            }

            self.handle(command);
            self.publish_status();
        }

        self.shutdown();
        info!("Connection actor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::CreateOrReplace {
                factory,
                credentials,
            } => {
                self.factory = Some(factory);
                match credentials {
                    None => {
                        debug!("Initial connect requested");
                        self.begin_fetch();
                    }
                    Some(credentials) => self.replace_credentials(credentials),
                }
            }
            Command::Transport { generation, event } => self.on_transport_event(generation, event),
            Command::TimerFired { generation } => {
                if !self.take_pending(generation) {
                    trace!("Ignoring stale reconnect timer {generation}");
                    return;
                }
                debug!("Reconnect timer {generation} fired");
                self.begin_fetch();
            }
            Command::CredentialsResolved { generation, result } => {
                if !self.take_pending(generation) {
                    trace!("Ignoring stale credential fetch {generation}");
                    return;
                }
                match result {
                    Ok(credentials) if self.transport.is_some() => {
                        self.replace_credentials(credentials)
                    }
                    Ok(credentials) => self.open_transport(credentials),
                    Err(e) => {
                        warn!("Token factory failed ({}): {e}", e.error_category());
                        self.emit(LifecycleEvent::CredentialRefreshFailed {
                            message: e.to_string(),
                        });
                        if self.transport.is_none() {
                            self.set_state(ConnectionState::Failed);
                            self.schedule_reconnect();
                        }
                    }
                }
            }
            Command::Close { ack } => {
                self.shutdown();
                let _ = ack.send(());
            }
        }
    }

    /// Switch to `credentials` unless they are the pair last connected with.
    ///
    /// The comparison survives a failed transport, so re-announcing the pair
    /// during backoff leaves the pending retry alone.
    fn replace_credentials(&mut self, credentials: CredentialPair) {
        if self.last_credentials.as_ref() == Some(&credentials) {
            debug!("Credential pair unchanged, keeping current connection");
            return;
        }

        self.cancel_pending();
        self.backoff.reset();
        self.open_transport(credentials);
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        let current = self.transport.as_ref().map(|active| active.generation);
        if current != Some(generation) {
            trace!("Ignoring {event:?} from superseded transport {generation}");
            return;
        }

        match event {
            TransportEvent::Connected => {
                info!("Stream connected (transport {generation})");
                self.cancel_pending();
                self.backoff.reset();
                self.set_state(ConnectionState::Connected);
                self.emit(LifecycleEvent::Connected { generation });
            }
            TransportEvent::Message(payload) => {
                self.emit(LifecycleEvent::Message(payload));
            }
            TransportEvent::Disconnected { reason } | TransportEvent::Error { reason } => {
                warn!("Stream transport {generation} failed: {reason}");
                self.detach_transport();
                self.emit(LifecycleEvent::Disconnected { generation, reason });
                self.set_state(ConnectionState::Failed);
                self.schedule_reconnect();
            }
        }
    }

    /// Ask the token factory for a pair; the result comes back as a command.
    fn begin_fetch(&mut self) {
        let Some(factory) = self.factory.clone() else {
            warn!("No token factory registered, cannot connect");
            return;
        };

        let generation = self.next_generation();
        let commands = self.commands.clone();
        let fetch = factory.fetch();

        let task = tokio::spawn(async move {
            let result = fetch.await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::CredentialsResolved { generation, result });
            }
        });

        self.replace_pending(PendingRetry::Fetch { generation, task });
        if self.transport.is_none() {
            self.set_state(ConnectionState::Connecting);
        }
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempt();
        let generation = self.next_generation();
        let commands = self.commands.clone();

        info!("Reconnect attempt {attempt} scheduled in {delay:?}");

        let task = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::TimerFired { generation });
            }
        });

        self.replace_pending(PendingRetry::Timer { generation, task });
        self.set_state(ConnectionState::ReconnectPending);
        self.emit(LifecycleEvent::ReconnectScheduled { attempt, delay });
    }

    fn open_transport(&mut self, credentials: CredentialPair) {
        // Detach first so nothing from the old handle can be attributed to the new one.
        self.detach_transport();

        let generation = self.next_generation();
        let sink = TransportEventSink::new(generation, self.commands.clone());

        info!(
            "Opening stream transport {generation} with access token {}",
            credentials.access_token().fingerprint()
        );

        let handle = self.connector.connect(credentials.access_token(), sink);
        self.transport = Some(ActiveTransport { generation, handle });
        self.last_credentials = Some(credentials);

        self.set_state(ConnectionState::Connecting);
        self.emit(LifecycleEvent::TransportAttached { generation });
    }

    fn detach_transport(&mut self) {
        if let Some(mut active) = self.transport.take() {
            debug!("Closing stream transport {}", active.generation);
            active.handle.close();
            self.emit(LifecycleEvent::TransportDetached {
                generation: active.generation,
            });
        }
    }

    fn replace_pending(&mut self, pending: PendingRetry) {
        self.cancel_pending();
        self.pending = Some(pending);
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            trace!("Cancelling pending operation {}", pending.generation());
            pending.cancel();
        }
    }

    /// Clears the pending slot if it belongs to `generation`.
    fn take_pending(&mut self, generation: u64) -> bool {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.generation() == generation)
        {
            self.pending = None;
            true
        } else {
            false
        }
    }

    fn shutdown(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        self.cancel_pending();
        if let Some(mut active) = self.transport.take() {
            active.handle.close();
        }
        self.state = ConnectionState::Closed;
        self.status.send_modify(|status| {
            status.state = ConnectionState::Closed;
            status.transport_generation = None;
        });

        info!("Connection manager closed");
    }

    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!("Connection state {} -> {}", self.state, state);
        self.state = state;
        self.emit(LifecycleEvent::StateChanged(state));
        self.publish_status();
    }

    fn publish_status(&self) {
        let snapshot = ConnectionStatus {
            state: self.state,
            backoff_delay: self.backoff.current_delay(),
            attempt: self.backoff.attempt(),
            transport_generation: self.transport.as_ref().map(|active| active.generation),
        };

        self.status.send_if_modified(|status| {
            if status.state.is_terminal() || *status == snapshot {
                return false;
            }
            *status = snapshot;
            true
        });
    }

    /// `close()` marks the status closed before the actor sees the command.
    fn is_closed(&self) -> bool {
        self.status.borrow().state.is_terminal()
    }

    fn emit(&self, event: LifecycleEvent) {
        if self.is_closed() {
            trace!("Suppressing {event:?} after close");
            return;
        }
        self.bus.publish(event);
    }
}
