//! Client configuration.
//!
//! Loaded from `{config_dir}/config.json`, every field has a default so a
//! missing file or a partial file is valid. Environment variables (optionally
//! from a `.env` file) override the server endpoints.

use crate::connection::backoff::ReconnectPolicy;
use crate::error::config::ConfigError;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::{DEFAULT_EXCHANGE_PATH, DEFAULT_SERVER_BASE_URL, DEFAULT_STREAM_URL};

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

pub const ENV_BASE_URL: &str = "LINK_BASE_URL";
pub const ENV_STREAM_URL: &str = "LINK_STREAM_URL";
pub const ENV_EXCHANGE_PATH: &str = "LINK_EXCHANGE_PATH";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_exchange_path")]
    pub exchange_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_url: default_stream_url(),
            exchange_path: default_exchange_path(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            reconnect: ReconnectConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_base_url() -> String {
    DEFAULT_SERVER_BASE_URL.to_string()
}
fn default_stream_url() -> String {
    DEFAULT_STREAM_URL.to_string()
}
fn default_exchange_path() -> String {
    DEFAULT_EXCHANGE_PATH.to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ClientConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(ClientConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: ClientConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using atomic write.
    ///
    /// Uses temp file + rename so a crash never leaves a half-written file.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(validation_error(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        check_scheme("server.base_url", &self.server.base_url, &["http://", "https://"])?;
        check_scheme("server.stream_url", &self.server.stream_url, &["ws://", "wss://"])?;

        if self.server.exchange_path.trim_matches('/').is_empty() {
            return Err(validation_error("server.exchange_path cannot be empty"));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(validation_error("server.request_timeout_secs must be positive"));
        }

        let reconnect = &self.reconnect;
        if reconnect.initial_delay_ms == 0 {
            return Err(validation_error("reconnect.initial_delay_ms must be positive"));
        }
        if reconnect.initial_delay_ms > reconnect.max_delay_ms {
            return Err(validation_error(format!(
                "reconnect.initial_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                reconnect.initial_delay_ms, reconnect.max_delay_ms
            )));
        }
        if !reconnect.multiplier.is_finite() || reconnect.multiplier < 1.0 {
            return Err(validation_error(format!(
                "Invalid reconnect.multiplier: {} (must be >= 1.0)",
                reconnect.multiplier
            )));
        }

        if self.events.capacity == 0 {
            return Err(validation_error("events.capacity must be positive"));
        }

        Ok(())
    }

    /// Override server endpoints from `LINK_*` environment variables.
    ///
    /// Re-validates afterwards so a bad override is reported, not used.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let overrides: [(&str, &mut String); 3] = [
            (ENV_BASE_URL, &mut self.server.base_url),
            (ENV_STREAM_URL, &mut self.server.stream_url),
            (ENV_EXCHANGE_PATH, &mut self.server.exchange_path),
        ];

        for (variable, target) in overrides {
            match env::var(variable) {
                Ok(value) => {
                    debug!("Overriding config from {variable}");
                    *target = value;
                }
                Err(env::VarError::NotPresent) => {}
                Err(env::VarError::NotUnicode(_)) => {
                    return Err(ConfigError::EnvError {
                        location: ErrorLocation::from(Location::caller()),
                        variable: variable.to_string(),
                        reason: "contains invalid unicode".to_string(),
                    });
                }
            }
        }

        self.validate()
    }
}

/// Attempts to load .env from known locations.
///
/// Tries the current directory first, then the executable's directory.
/// Returns the path that was loaded, if any; a missing file is not an error.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return Some(path);
    }

    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))?;
    let env_path = exe_dir.join(".env");
    if !env_path.exists() {
        debug!("No .env file found");
        return None;
    }

    match dotenvy::from_path(&env_path) {
        Ok(_) => {
            info!("Loaded .env from: {:?}", env_path);
            Some(env_path)
        }
        Err(e) => {
            warn!("Failed to parse .env at {:?}: {}", env_path, e);
            None
        }
    }
}

#[track_caller]
fn validation_error(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}

#[track_caller]
fn check_scheme(field: &str, url: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(validation_error(format!("{field} cannot be empty string")));
    }
    if !schemes.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(validation_error(format!("Invalid URL format for {field}: {url}")));
    }
    Ok(())
}
