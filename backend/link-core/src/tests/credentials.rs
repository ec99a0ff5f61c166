use crate::credentials::{CredentialPair, CredentialStore, MemoryCredentialStore};
use crate::tests::support::pair;

/// **VALUE**: Verifies structural verification of exchange response bodies.
///
/// **WHY THIS MATTERS**: Every successful response body is checked for a credential
/// pair. A false positive would overwrite the store with garbage; a false negative
/// would drop a refreshed pair.
///
/// **BUG THIS CATCHES**: Would catch accepting missing fields, numbers, nulls or
/// empty strings as tokens.
#[test]
fn given_response_bodies_when_parsed_then_only_complete_pairs_are_accepted() {
    // GIVEN / WHEN / THEN: A complete pair with an extra field is accepted
    let parsed = CredentialPair::from_json_slice(
        br#"{"access_token":"a2","refresh_token":"r2","expires_in":3600}"#,
    );
    assert_eq!(parsed, Some(pair("a2", "r2")));

    // THEN: Anything else is rejected
    for body in [
        &br#"{"access_token":"a2"}"#[..],
        br#"{"access_token":"a2","refresh_token":42}"#,
        br#"{"access_token":null,"refresh_token":"r2"}"#,
        br#"{"access_token":"","refresh_token":"r2"}"#,
        br#"["a2","r2"]"#,
        b"not json",
        b"",
    ] {
        assert!(
            CredentialPair::from_json_slice(body).is_none(),
            "should reject {}",
            String::from_utf8_lossy(body)
        );
    }
}

#[test]
fn given_pairs_when_compared_then_both_tokens_must_match() {
    assert_eq!(pair("a1", "r1"), pair("a1", "r1"));
    assert_ne!(pair("a1", "r1"), pair("a1", "r2"));
    assert_ne!(pair("a1", "r1"), pair("a2", "r1"));
    assert!(CredentialPair::new("", "r1").is_err());
}

#[test]
fn given_pair_when_debug_formatted_then_tokens_are_fingerprinted() {
    let debug = format!("{:?}", pair("access-secret-1234", "refresh-secret-5678"));

    assert!(!debug.contains("access-secret"));
    assert!(!debug.contains("refresh-secret"));
    assert!(debug.contains("1234"));
}

/// **VALUE**: Verifies the in-memory store notifies subscribers of every write.
///
/// **BUG THIS CATCHES**: Would catch `set` skipping notification for a value-equal
/// pair; de-duplication belongs to the connection manager, not the store.
#[tokio::test]
async fn given_subscribed_store_when_set_then_change_is_observed() {
    // GIVEN: A store with a pair and a subscriber
    let store = MemoryCredentialStore::new(Some(pair("a1", "r1")));
    let mut updates = store.subscribe();
    assert!(!updates.has_changed().unwrap());

    // WHEN: The same pair is written again
    store.set(Some(pair("a1", "r1")));

    // THEN: The subscriber is still notified
    updates.changed().await.unwrap();
    assert_eq!(*updates.borrow_and_update(), Some(pair("a1", "r1")));

    // WHEN: The store is cleared
    store.set(None);

    // THEN: get() and the subscriber agree
    updates.changed().await.unwrap();
    assert!(updates.borrow_and_update().is_none());
    assert!(store.get().is_none());
}
