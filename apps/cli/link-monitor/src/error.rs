use common::ErrorLocation;

use link_core::error::CoreError;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors that end the monitor.
///
/// Serializable so a failed run can be reported as a single JSON line.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum MonitorError {
    /// Error from this binary (paths, logging)
    #[error("Monitor Error: {message} {location}")]
    Monitor {
        message: String,
        location: ErrorLocation,
    },

    /// Error from link-core (config, authenticator, connection)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// No credential pair to start from
    #[error("No Credentials Error: {message} {location}")]
    NoCredentials {
        message: String,
        location: ErrorLocation,
    },

    /// The backend rejected the refresh token; a new login is required
    #[error("Session Ended Error: {message} {location}")]
    SessionEnded {
        message: String,
        location: ErrorLocation,
    },
}

impl MonitorError {
    #[track_caller]
    pub fn monitor(message: impl Into<String>) -> Self {
        MonitorError::Monitor {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn core(error: impl Into<CoreError>) -> Self {
        MonitorError::Core {
            message: error.into().to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Single-line JSON rendering for machine consumers.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"type\":\"Unknown\",\"data\":\"{self}\"}}"))
    }
}
