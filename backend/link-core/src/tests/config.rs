use crate::config::{ClientConfig, ENV_BASE_URL, ENV_EXCHANGE_PATH, ENV_STREAM_URL};
use crate::error::ConfigError;

use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

fn clear_env() {
    // SAFETY: env-touching tests are serialized with #[serial].
    unsafe {
        std::env::remove_var(ENV_BASE_URL);
        std::env::remove_var(ENV_STREAM_URL);
        std::env::remove_var(ENV_EXCHANGE_PATH);
    }
}

/// **VALUE**: Verifies a missing config file yields the documented defaults.
///
/// **BUG THIS CATCHES**: Would catch the reconnect defaults drifting from
/// 500ms / 60s / x2, or a missing file being treated as an error.
#[test]
fn given_missing_file_when_loading_then_defaults_are_used() {
    // GIVEN: An empty config directory
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = ClientConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config, ClientConfig::default());
    let policy = config.reconnect.policy();
    assert_eq!(policy.initial_delay, Duration::from_millis(500));
    assert_eq!(policy.max_delay, Duration::from_secs(60));
    assert_eq!(policy.multiplier, 2.0);
    assert_eq!(config.server.exchange_path, "api/exchangeToken");
}

#[test]
fn given_saved_config_when_loaded_then_values_survive() {
    let dir = TempDir::new().unwrap();
    let mut config = ClientConfig::default();
    config.server.base_url = "https://api.example.test/".to_string();
    config.reconnect.max_delay_ms = 10_000;

    config.save(dir.path()).unwrap();
    let loaded = ClientConfig::load(dir.path()).unwrap();

    assert_eq!(loaded, config);
    assert!(!dir.path().join("config.json.tmp").exists());
}

/// **VALUE**: Verifies a partial file only overrides the fields it names.
#[test]
fn given_partial_file_when_loading_then_missing_fields_default() {
    // GIVEN: A config file that only sets the stream URL
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{ "server": { "stream_url": "wss://stream.example.test/live" } }"#,
    )
    .unwrap();

    // WHEN: Loading
    let config = ClientConfig::load(dir.path()).unwrap();

    // THEN: The stream URL is taken, everything else defaults
    assert_eq!(config.server.stream_url, "wss://stream.example.test/live");
    assert_eq!(config.server.base_url, "http://127.0.0.1:3000/");
    assert_eq!(config.reconnect.initial_delay_ms, 500);
}

#[test]
fn given_corrupted_file_when_loading_then_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    let result = ClientConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies validation rejects values the connection layer cannot use.
///
/// **BUG THIS CATCHES**: Would catch an http:// stream URL, a zero initial delay or
/// a shrinking multiplier slipping through and failing much later at runtime.
#[test]
fn given_invalid_values_when_validating_then_validation_error() {
    let cases: Vec<Box<dyn Fn(&mut ClientConfig)>> = vec![
        Box::new(|c| c.server.stream_url = "http://127.0.0.1:3000/".to_string()),
        Box::new(|c| c.server.base_url = "ws://127.0.0.1:3000/".to_string()),
        Box::new(|c| c.server.exchange_path = "/".to_string()),
        Box::new(|c| c.reconnect.initial_delay_ms = 0),
        Box::new(|c| c.reconnect.initial_delay_ms = 120_000),
        Box::new(|c| c.reconnect.multiplier = 0.5),
        Box::new(|c| c.events.capacity = 0),
        Box::new(|c| c.version = 99),
    ];

    for (index, mutate) in cases.iter().enumerate() {
        let mut config = ClientConfig::default();
        mutate(&mut config);
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "case {index} should fail validation"
        );
    }
}

/// **VALUE**: Verifies `LINK_*` environment variables override the server endpoints.
#[test]
#[serial]
fn given_env_overrides_when_applied_then_server_endpoints_change() {
    // GIVEN: Override variables set
    clear_env();
    // SAFETY: serialized with #[serial].
    unsafe {
        std::env::set_var(ENV_BASE_URL, "https://api.example.test/");
        std::env::set_var(ENV_STREAM_URL, "wss://api.example.test/stream");
    }

    // WHEN: Applying them to defaults
    let mut config = ClientConfig::default();
    let result = config.apply_env_overrides();
    clear_env();

    // THEN: Endpoints are replaced, the exchange path keeps its default
    result.unwrap();
    assert_eq!(config.server.base_url, "https://api.example.test/");
    assert_eq!(config.server.stream_url, "wss://api.example.test/stream");
    assert_eq!(config.server.exchange_path, "api/exchangeToken");
}

#[test]
#[serial]
fn given_invalid_env_override_when_applied_then_validation_error() {
    clear_env();
    // SAFETY: serialized with #[serial].
    unsafe {
        std::env::set_var(ENV_STREAM_URL, "not-a-url");
    }

    let mut config = ClientConfig::default();
    let result = config.apply_env_overrides();
    clear_env();

    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
}
