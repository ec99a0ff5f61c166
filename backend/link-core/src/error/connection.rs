use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConnectionError {
    #[error("Connection Actor Stopped Error: {message} {location}")]
    ActorStopped {
        message: String,
        location: ErrorLocation,
    },
}

impl ConnectionError {
    #[track_caller]
    pub fn actor_stopped(message: impl Into<String>) -> Self {
        ConnectionError::ActorStopped {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
