use crate::RedactedToken;

/// **VALUE**: Verifies that tokens never show up in Debug or Display output.
///
/// **WHY THIS MATTERS**: Credential pairs travel through log statements in the
/// connection manager and authenticator. A leaked access token is a live credential.
///
/// **BUG THIS CATCHES**: Would catch a derived `Debug` replacing the manual impl.
#[test]
fn given_token_when_formatted_then_value_is_hidden() {
    // GIVEN: A token with a recognizable value
    let token = RedactedToken::new("super-secret-access").unwrap();

    // WHEN: Formatting it both ways
    let debug = format!("{token:?}");
    let display = format!("{token}");

    // THEN: Neither contains the value
    assert!(!debug.contains("super-secret"));
    assert!(!display.contains("super-secret"));
    assert_eq!(token.expose(), "super-secret-access");
}

/// **VALUE**: Verifies value equality and empty-token rejection.
///
/// **WHY THIS MATTERS**: Credential de-duplication compares tokens by value, and a
/// valid pair never contains empty strings.
///
/// **BUG THIS CATCHES**: Would catch pointer/identity comparison or acceptance of "".
#[test]
fn given_token_values_when_compared_then_equality_is_by_value() {
    // GIVEN: Two tokens with the same value and one with another
    let a = RedactedToken::new("abc").unwrap();
    let b = RedactedToken::new(String::from("abc")).unwrap();
    let c = RedactedToken::new("abd").unwrap();

    // THEN: Same value is equal, different value is not, empty is rejected
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(RedactedToken::new("").is_err());
}

/// **VALUE**: Verifies that serde refuses to serialize tokens but can deserialize them.
///
/// **WHY THIS MATTERS**: Exchange responses are parsed into tokens, but nothing should
/// ever write one back out through serde by accident (config dumps, debug JSON).
///
/// **BUG THIS CATCHES**: Would catch a derived `Serialize`.
#[test]
fn given_token_when_serialized_then_fails_and_deserialize_validates() {
    // GIVEN: A token
    let token = RedactedToken::new("xyz").unwrap();

    // WHEN / THEN: Serialization fails
    assert!(serde_json::to_string(&token).is_err());

    // WHEN / THEN: Deserialization accepts strings and rejects empty ones
    let parsed: RedactedToken = serde_json::from_str("\"xyz\"").unwrap();
    assert_eq!(parsed, token);
    assert!(serde_json::from_str::<RedactedToken>("\"\"").is_err());
    assert!(serde_json::from_str::<RedactedToken>("42").is_err());
}

/// **VALUE**: Verifies the log fingerprint shows only the tail.
///
/// **WHY THIS MATTERS**: Reconnect logs need to tell tokens apart without leaking them.
///
/// **BUG THIS CATCHES**: Would catch a fingerprint that exposes the whole value.
#[test]
fn given_long_token_when_fingerprinted_then_only_tail_is_shown() {
    let token = RedactedToken::new("abcdefgh1234").unwrap();
    assert_eq!(token.fingerprint(), "…1234");
}
