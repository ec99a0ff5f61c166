use crate::error::MonitorError;
use crate::monitor::{
    ENV_ACCESS_TOKEN, ENV_REFRESH_TOKEN, LoggerExit, describe_event, seed_credentials,
    spawn_event_logger,
};

use link_core::connection::ConnectionState;
use link_core::credentials::CredentialPair;
use link_core::events::{LifecycleBus, LifecycleEvent, StreamPayload};

use std::time::Duration;

use serial_test::serial;

fn set_tokens(access: Option<&str>, refresh: Option<&str>) {
    // SAFETY: env-touching tests are serialized with #[serial].
    unsafe {
        match access {
            Some(value) => std::env::set_var(ENV_ACCESS_TOKEN, value),
            None => std::env::remove_var(ENV_ACCESS_TOKEN),
        }
        match refresh {
            Some(value) => std::env::set_var(ENV_REFRESH_TOKEN, value),
            None => std::env::remove_var(ENV_REFRESH_TOKEN),
        }
    }
}

/// **VALUE**: Verifies the monitor seeds the store from the environment.
#[test]
#[serial]
fn given_both_tokens_in_env_when_seeding_then_pair_is_returned() {
    // GIVEN: Both variables set
    set_tokens(Some("a1"), Some("r1"));

    // WHEN: Seeding
    let seeded = seed_credentials();
    set_tokens(None, None);

    // THEN: The pair matches
    assert_eq!(
        seeded.unwrap(),
        Some(CredentialPair::new("a1", "r1").unwrap())
    );
}

/// **VALUE**: Verifies half-configured credentials are rejected, not ignored.
///
/// **BUG THIS CATCHES**: Would catch a missing refresh token producing a monitor
/// that connects once and can never recover.
#[test]
#[serial]
fn given_partial_or_empty_tokens_when_seeding_then_no_credentials_error() {
    for (access, refresh) in [(Some("a1"), None), (None, Some("r1")), (Some(""), Some("r1"))] {
        set_tokens(access, refresh);
        let seeded = seed_credentials();
        set_tokens(None, None);

        assert!(
            matches!(seeded, Err(MonitorError::NoCredentials { .. })),
            "{access:?}/{refresh:?} should be rejected"
        );
    }

    assert!(seed_credentials().unwrap().is_none());
}

#[test]
fn given_lifecycle_events_when_described_then_lines_are_readable() {
    assert_eq!(
        describe_event(&LifecycleEvent::StateChanged(ConnectionState::ReconnectPending)),
        "state -> reconnect_pending"
    );
    assert_eq!(
        describe_event(&LifecycleEvent::ReconnectScheduled {
            attempt: 2,
            delay: Duration::from_millis(1000),
        }),
        "reconnect attempt 2 in 1000ms"
    );
    assert_eq!(
        describe_event(&LifecycleEvent::Message(StreamPayload::Binary(vec![1, 2, 3]))),
        "binary message (3 bytes)"
    );
}

/// **VALUE**: Verifies only an invalidated session ends the run as a failure.
///
/// **BUG THIS CATCHES**: Would catch a closed event bus being reported as a
/// rejected refresh token.
#[tokio::test]
async fn given_session_invalid_published_when_logging_then_logger_reports_it() {
    // GIVEN: A logger following a bus
    let bus = LifecycleBus::new(8);
    let logger = spawn_event_logger(&bus);

    // WHEN: Ordinary events, then SessionInvalid, are published
    bus.publish(LifecycleEvent::StateChanged(ConnectionState::Connecting));
    bus.publish(LifecycleEvent::SessionInvalid);

    // THEN: The logger stops because of the invalid session
    assert_eq!(logger.await.unwrap(), LoggerExit::SessionInvalid);
}

#[tokio::test]
async fn given_bus_dropped_when_logging_then_logger_reports_closed_bus() {
    let bus = LifecycleBus::new(8);
    let logger = spawn_event_logger(&bus);

    drop(bus);

    assert_eq!(logger.await.unwrap(), LoggerExit::BusClosed);
}
