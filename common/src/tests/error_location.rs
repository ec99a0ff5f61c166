use crate::{ErrorLocation, RedactError, RedactedToken};
use std::panic::Location;

/// **VALUE**: Verifies that locations render as `[file:line:column]`.
///
/// **WHY THIS MATTERS**: Every error in the workspace appends its location to the
/// message. Reconnect and exchange failures are only debuggable from logs if that
/// suffix stays readable.
///
/// **BUG THIS CATCHES**: Would catch a Display change that drops the brackets or
/// one of the three components.
#[test]
#[track_caller]
fn given_captured_location_when_formatted_then_renders_bracketed_triplet() {
    // GIVEN: A location captured at this call site
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting it
    let formatted = location.to_string();

    // THEN: It is "[file:line:column]"
    assert_eq!(
        formatted,
        format!("[{}:{}:{}]", location.file, location.line, location.column)
    );
    assert!(formatted.contains("error_location.rs"));
}

/// **VALUE**: Verifies that `#[track_caller]` helpers report their caller's line.
///
/// **WHY THIS MATTERS**: Error constructors such as `AuthError::unauthorized()` rely on
/// caller tracking; without it every error would point at the constructor.
///
/// **BUG THIS CATCHES**: Would catch the removal of `#[track_caller]` from a helper
/// chain, which collapses all call sites to one line.
#[test]
fn given_tracked_helper_when_called_twice_then_lines_differ() {
    // GIVEN: A tracked helper
    #[track_caller]
    fn here() -> ErrorLocation {
        ErrorLocation::from(Location::caller())
    }

    // WHEN: Called from two consecutive lines
    let first = here();
    let second = here();

    // THEN: Same file, consecutive lines
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line);
}

/// **VALUE**: Verifies the tracked constructor reports the outer call site.
///
/// **BUG THIS CATCHES**: Would catch `RedactedToken::new` errors pointing into
/// `common` instead of at the code that passed the empty token.
#[test]
fn given_empty_token_when_rejected_then_location_is_the_callers() {
    // GIVEN: The line the token is built on
    let expected_line = line!() + 3;

    // WHEN: Building a token from an empty value
    let err = RedactedToken::new("").unwrap_err();

    // THEN: The error points here, not into the constructor
    match err {
        RedactError::EmptyToken { location, .. } => {
            assert_eq!(location.line, expected_line);
            assert!(location.file.ends_with("error_location.rs"));
        }
        other => panic!("expected EmptyToken, got {other:?}"),
    }
}
