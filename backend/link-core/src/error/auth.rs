//! Error types for the request/response channel and credential exchange.
//!
//! Key design decisions:
//! - HTTP status codes stored directly (not parsed from strings)
//! - reqwest errors are categorized before they are stringified
//! - All errors include ErrorLocation for debugging
//! - `#[track_caller]` for automatic location capture

use common::{ErrorLocation, HttpStatusCode};
use std::panic::Location;
use thiserror::Error as ThisError;

/// Errors surfaced by the request authenticator and token factories.
#[derive(Debug, ThisError)]
pub enum AuthError {
    #[error("Unauthorized Error: {message} {location}")]
    Unauthorized {
        message: String,
        location: ErrorLocation,
    },

    #[error("Exchange Failed Error: {message} {location}")]
    ExchangeFailed {
        message: String,
        status_code: Option<HttpStatusCode>,
        location: ErrorLocation,
    },

    #[error("Malformed Exchange Error: {message} {location}")]
    MalformedExchange {
        message: String,
        location: ErrorLocation,
    },

    #[error("No Credentials Error {location}")]
    NoCredentials { location: ErrorLocation },

    #[error("HTTP Error: HTTP {status_code} - {message} {location}")]
    Http {
        message: String,
        status_code: HttpStatusCode,
        location: ErrorLocation,
    },

    #[error("Network Error: {message} {location}")]
    Network {
        message: String,
        is_timeout: bool,
        is_connection: bool,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },

    #[error("JSON Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },
}

impl AuthError {
    #[track_caller]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AuthError::Unauthorized {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn exchange_failed(message: impl Into<String>, status_code: Option<HttpStatusCode>) -> Self {
        AuthError::ExchangeFailed {
            message: message.into(),
            status_code,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn malformed_exchange(message: impl Into<String>) -> Self {
        AuthError::MalformedExchange {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn no_credentials() -> Self {
        AuthError::NoCredentials {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create from an HTTP response with an explicit status code.
    #[track_caller]
    pub fn from_http_response(status_code: HttpStatusCode, body: impl Into<String>) -> Self {
        AuthError::Http {
            message: body.into(),
            status_code,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create from reqwest error with proper categorization.
    #[track_caller]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        // Check for specific error types BEFORE converting to string
        let is_timeout = error.is_timeout();
        let is_connect = error.is_connect();

        if let Some(status) = error.status() {
            return AuthError::Http {
                message: error.to_string(),
                status_code: HttpStatusCode(status.as_u16()),
                location: ErrorLocation::from(Location::caller()),
            };
        }

        AuthError::Network {
            message: error.to_string(),
            is_timeout,
            is_connection: is_connect,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether this failure means the session is over and the user has to log in again.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            AuthError::Unauthorized { .. }
                | AuthError::ExchangeFailed { .. }
                | AuthError::MalformedExchange { .. }
                | AuthError::NoCredentials { .. }
        )
    }

    /// Get error category for logs.
    pub fn error_category(&self) -> &'static str {
        match self {
            AuthError::Unauthorized { .. } => "unauthorized",
            AuthError::ExchangeFailed { .. } => "exchange_failed",
            AuthError::MalformedExchange { .. } => "malformed_exchange",
            AuthError::NoCredentials { .. } => "no_credentials",
            AuthError::Http { status_code, .. } if status_code.is_client_error() => "client_error",
            AuthError::Http { status_code, .. } if status_code.is_server_error() => "server_error",
            AuthError::Http { .. } => "http",
            AuthError::Network { is_timeout: true, .. } => "timeout",
            AuthError::Network { is_connection: true, .. } => "connection",
            AuthError::Network { .. } => "network",
            AuthError::UrlParse { .. } => "url_parse",
            AuthError::Json { .. } => "json",
        }
    }

    /// Get HTTP status code if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AuthError::Http { status_code, .. } => Some(status_code.0),
            AuthError::ExchangeFailed { status_code, .. } => status_code.map(|s| s.0),
            _ => None,
        }
    }
}

impl From<url::ParseError> for AuthError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        AuthError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        AuthError::from_reqwest(&error)
    }
}

impl From<serde_json::Error> for AuthError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        AuthError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
