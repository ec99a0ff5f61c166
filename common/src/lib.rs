//! Shared leaf types for the link workspace.
//!
//! This crate holds the small value types every other crate leans on.
//! They carry no behaviour beyond formatting and classification.
//!
//! ## Architecture
//!
//! - **common** (this crate): error locations, HTTP status classification, redacted tokens
//! - **link-core**: credentials, request authenticator, connection manager, event bus
//! - **link-monitor**: binary wiring everything together

pub mod error;
pub mod http_status;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
