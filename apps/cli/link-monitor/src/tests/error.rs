// Unit tests for error module

use crate::error::MonitorError;

use link_core::error::AuthError;

/// **VALUE**: Tests that errors serialize to a tagged JSON line.
///
/// **WHY THIS MATTERS**: A failed run prints the error as JSON on stderr for
/// supervisors to pick up. A non-serializable field would break that silently.
///
/// **BUG THIS CATCHES**: Would catch removing `#[derive(Serialize)]` or the
/// `type`/`data` tagging.
#[test]
fn given_monitor_error_when_serialized_then_tagged_json() {
    // GIVEN: A monitor error
    let err = MonitorError::monitor("Test");

    // WHEN: Rendering as JSON
    let json = err.to_json();

    // THEN: Tagged with the variant and carrying the message
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["type"], "Monitor");
    assert_eq!(value["data"]["message"], "Test");
}

#[test]
fn given_core_error_when_wrapped_then_message_is_preserved() {
    let auth = AuthError::unauthorized("GET api/me rejected");
    let rendered = auth.to_string();

    let err = MonitorError::core(auth);

    assert!(matches!(err, MonitorError::Core { .. }));
    assert!(err.to_string().contains(&rendered));
}
