use crate::HttpStatusCode;

/// **VALUE**: Verifies that only 401 counts as an authentication failure.
///
/// **WHY THIS MATTERS**: The authenticator performs its single exchange-and-retry
/// exclusively for 401. Treating 403 or 5xx as auth failures would burn refresh
/// tokens on unrelated errors.
///
/// **BUG THIS CATCHES**: Would catch a range check (`is_client_error`) being used
/// where an exact 401 comparison is required.
#[test]
fn given_status_codes_when_checking_unauthorized_then_only_401_matches() {
    // GIVEN: A spread of statuses
    let cases = [(200, false), (400, false), (401, true), (403, false), (500, false)];

    // WHEN / THEN: Only 401 is unauthorized
    for (code, expected) in cases {
        assert_eq!(
            HttpStatusCode(code).is_unauthorized(),
            expected,
            "status {code}"
        );
    }
}

/// **VALUE**: Verifies the success/client/server ranges.
///
/// **WHY THIS MATTERS**: Success decides whether a response body is inspected for a
/// fresh credential pair; the error ranges drive error categories.
///
/// **BUG THIS CATCHES**: Would catch off-by-one range bounds (e.g. 300 treated as success).
#[test]
fn given_boundary_codes_when_classified_then_ranges_are_half_open() {
    // GIVEN / WHEN / THEN
    assert!(HttpStatusCode(200).is_success());
    assert!(HttpStatusCode(299).is_success());
    assert!(!HttpStatusCode(300).is_success());
    assert!(HttpStatusCode(499).is_client_error());
    assert!(!HttpStatusCode(500).is_client_error());
    assert!(HttpStatusCode(503).is_server_error());
    assert_eq!(HttpStatusCode::from(404).to_string(), "404");
}
