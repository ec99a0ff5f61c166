use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Errors raised while opening or reading a stream transport.
///
/// The connection manager never propagates these to callers; they are turned
/// into `error`/`disconnected` transport events and end up as lifecycle events.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Invalid Stream URL Error: {message} {location}")]
    InvalidUrl {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },
}

impl From<url::ParseError> for TransportError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        TransportError::InvalidUrl {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
