//! Wires the link-core components together and follows the stream until
//! Ctrl-C or until the session ends.

use crate::error::MonitorError;

use common::ErrorLocation;

use link_core::authenticator::RequestAuthenticator;
use link_core::config::ClientConfig;
use link_core::connection::{ConnectionManager, TokenFactory, WebSocketConnector};
use link_core::credentials::{CredentialPair, CredentialStore, MemoryCredentialStore};
use link_core::events::{LifecycleBus, LifecycleEvent, StreamPayload};

use std::env;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub const APP_DIR_NAME: &str = "link-monitor";
pub const ENV_ACCESS_TOKEN: &str = "LINK_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "LINK_REFRESH_TOKEN";

/// Where the monitor keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPaths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl MonitorPaths {
    /// `{config_dir}/link-monitor` and `{data_local_dir}/link-monitor/logs`.
    pub fn resolve() -> Result<Self, MonitorError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MonitorError::monitor("Could not determine config directory"))?
            .join(APP_DIR_NAME);
        let log_dir = dirs::data_local_dir()
            .ok_or_else(|| MonitorError::monitor("Could not determine data directory"))?
            .join(APP_DIR_NAME)
            .join("logs");

        Ok(Self {
            config_dir,
            log_dir,
        })
    }
}

/// Initial credential pair from `LINK_ACCESS_TOKEN` / `LINK_REFRESH_TOKEN`.
///
/// Both unset is `Ok(None)`; only one set, or an empty value, is an error.
pub fn seed_credentials() -> Result<Option<CredentialPair>, MonitorError> {
    let access = env::var(ENV_ACCESS_TOKEN).ok();
    let refresh = env::var(ENV_REFRESH_TOKEN).ok();

    match (access, refresh) {
        (None, None) => Ok(None),
        (Some(access), Some(refresh)) => CredentialPair::new(access, refresh)
            .map(Some)
            .map_err(|e| MonitorError::NoCredentials {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        _ => Err(MonitorError::NoCredentials {
            message: format!("{ENV_ACCESS_TOKEN} and {ENV_REFRESH_TOKEN} must be set together"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

/// One log line per lifecycle event. Payloads are summarized, not dumped.
pub fn describe_event(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::StateChanged(state) => format!("state -> {state}"),
        LifecycleEvent::TransportAttached { generation } => {
            format!("transport {generation} attached")
        }
        LifecycleEvent::TransportDetached { generation } => {
            format!("transport {generation} detached")
        }
        LifecycleEvent::Connected { generation } => format!("transport {generation} connected"),
        LifecycleEvent::Disconnected { generation, reason } => {
            format!("transport {generation} disconnected: {reason}")
        }
        LifecycleEvent::ReconnectScheduled { attempt, delay } => {
            format!("reconnect attempt {attempt} in {}ms", delay.as_millis())
        }
        LifecycleEvent::CredentialRefreshFailed { message } => {
            format!("credential refresh failed: {message}")
        }
        LifecycleEvent::Message(StreamPayload::Text(text)) => {
            format!("message ({} chars): {text}", text.chars().count())
        }
        LifecycleEvent::Message(StreamPayload::Binary(bytes)) => {
            format!("binary message ({} bytes)", bytes.len())
        }
        LifecycleEvent::SessionInvalid => "session invalid, log in again".to_string(),
    }
}

/// Why the event logger stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoggerExit {
    SessionInvalid,
    BusClosed,
}

/// Log every lifecycle event until the session is invalidated or the bus closes.
pub(crate) fn spawn_event_logger(bus: &LifecycleBus) -> JoinHandle<LoggerExit> {
    let mut events = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LifecycleEvent::SessionInvalid) => {
                    warn!("{}", describe_event(&LifecycleEvent::SessionInvalid));
                    return LoggerExit::SessionInvalid;
                }
                Ok(event @ LifecycleEvent::Message(_)) => debug!("{}", describe_event(&event)),
                Ok(event) => info!("{}", describe_event(&event)),
                Err(RecvError::Lagged(skipped)) => warn!("Event logger lagged, {skipped} events skipped"),
                Err(RecvError::Closed) => return LoggerExit::BusClosed,
            }
        }
    })
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
    }
}

/// Run until Ctrl-C (Ok) or until the session ends (Err).
pub async fn run(config: ClientConfig) -> Result<(), MonitorError> {
    let bus = LifecycleBus::new(config.events.capacity);

    let initial = seed_credentials()?.ok_or_else(|| MonitorError::NoCredentials {
        message: format!("set {ENV_ACCESS_TOKEN} and {ENV_REFRESH_TOKEN}"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new(Some(initial.clone())));

    let authenticator = RequestAuthenticator::new(&config.server, Arc::clone(&store), bus.clone())
        .map_err(MonitorError::core)?;
    let connector =
        WebSocketConnector::new(&config.server.stream_url).map_err(MonitorError::core)?;

    info!(
        "Monitoring {} (requests via {})",
        connector.stream_url(),
        authenticator.base_url()
    );

    let mut session = spawn_event_logger(&bus);
    let manager = ConnectionManager::new(Arc::new(connector), config.reconnect.policy(), bus);
    let factory: Arc<dyn TokenFactory> = Arc::new(authenticator);
    let follower = manager.follow_store(Arc::clone(&store), Arc::clone(&factory));

    manager
        .create_or_replace(factory, Some(initial))
        .map_err(MonitorError::core)?;

    let outcome = tokio::select! {
        () = wait_for_ctrl_c() => Ok(()),
        exit = &mut session => match exit {
            Ok(LoggerExit::SessionInvalid) => Err(MonitorError::SessionEnded {
                message: "refresh token rejected".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            Ok(LoggerExit::BusClosed) | Err(_) => {
                warn!("Lifecycle event logger stopped, waiting for Ctrl-C");
                wait_for_ctrl_c().await;
                Ok(())
            }
        },
    };

    manager.close().await;
    follower.abort();
    session.abort();

    info!("Monitor stopped ({})", manager.status().state);
    outcome
}
