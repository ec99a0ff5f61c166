//! Token-refresh-coordinated client link.
//!
//! - [`authenticator`]: bearer-authenticated request/response calls with a single exchange-and-retry
//! - [`connection`]: one long-lived stream connection with backoff reconnects
//! - [`credentials`]: the access/refresh pair and the store both of the above share
//! - [`events`]: lifecycle notifications for external consumers

pub mod authenticator;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod events;

#[cfg(test)]
mod tests;

pub use authenticator::{ApiRequest, ApiResponse, RequestAuthenticator};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus, TokenFactory};
pub use credentials::{CredentialPair, CredentialStore, MemoryCredentialStore};
pub use events::{LifecycleBus, LifecycleEvent, StreamPayload};

pub const DEFAULT_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: &str = "3000";
pub const DEFAULT_SERVER_BASE_URL: &str =
    const_format::concatcp!("http://", DEFAULT_SERVER_HOSTNAME, ":", DEFAULT_SERVER_PORT, "/");
pub const DEFAULT_STREAM_URL: &str =
    const_format::concatcp!("ws://", DEFAULT_SERVER_HOSTNAME, ":", DEFAULT_SERVER_PORT, "/");
pub const DEFAULT_EXCHANGE_PATH: &str = "api/exchangeToken";

/// Query parameter carrying the access token on the stream endpoint.
pub const STREAM_TOKEN_PARAM: &str = "token";
