use link_core::config::ClientConfig;
use link_core::error::{AuthError, ConfigError, ConnectionError, CoreError};

use common::HttpStatusCode;

use std::error::Error;

/// **VALUE**: Verifies auth errors carry the location they were raised at.
///
/// **WHY THIS MATTERS**: The same Unauthorized variant is raised from several
/// branches of the retry protocol. The location tells them apart in logs.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being removed from the
/// constructors or the location being dropped from the Display format.
#[test]
fn given_unauthorized_error_when_formatted_then_includes_message_and_location() {
    // GIVEN: An error built through the constructor
    let err = AuthError::unauthorized("GET api/items rejected");

    // WHEN: Formatting it
    let rendered = err.to_string();

    // THEN: Type, message and this file's location are present
    assert!(rendered.contains("Unauthorized Error"));
    assert!(rendered.contains("GET api/items rejected"));
    assert!(rendered.contains("error.rs"));
}

/// **VALUE**: Verifies which failures end the session.
///
/// **BUG THIS CATCHES**: Would catch a transient server error logging the user out.
#[test]
fn given_auth_errors_when_classified_then_only_auth_failures_invalidate_session() {
    assert!(AuthError::unauthorized("x").invalidates_session());
    assert!(AuthError::exchange_failed("x", Some(HttpStatusCode::UNAUTHORIZED)).invalidates_session());
    assert!(AuthError::malformed_exchange("x").invalidates_session());
    assert!(AuthError::no_credentials().invalidates_session());

    let server_error = AuthError::from_http_response(HttpStatusCode(503), "unavailable");
    assert!(!server_error.invalidates_session());
    assert_eq!(server_error.error_category(), "server_error");
    assert_eq!(server_error.status_code(), Some(503));

    let not_found = AuthError::from_http_response(HttpStatusCode(404), "missing");
    assert_eq!(not_found.error_category(), "client_error");
}

#[test]
fn given_exchange_failure_with_status_when_inspected_then_status_is_exposed() {
    let err = AuthError::exchange_failed("rejected", Some(HttpStatusCode::UNAUTHORIZED));

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(err.error_category(), "exchange_failed");
    assert!(err.to_string().contains("Exchange Failed Error: rejected"));
}

#[test]
fn given_invalid_config_when_validated_then_error_names_the_field() {
    let mut config = ClientConfig::default();
    config.server.stream_url = "http://127.0.0.1:3000/".to_string();

    let err = config.validate().unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError { .. }));
    assert!(err.to_string().contains("server.stream_url"));
}

#[test]
fn given_module_errors_when_wrapped_in_core_error_then_display_is_transparent() {
    let auth = AuthError::no_credentials();
    let auth_rendered = auth.to_string();
    let core: CoreError = auth.into();
    assert_eq!(core.to_string(), auth_rendered);

    let stopped: CoreError = ConnectionError::actor_stopped("gone").into();
    assert!(stopped.to_string().contains("Connection Actor Stopped Error: gone"));
    assert!(stopped.source().is_none());
}
