//! # Sync Configuration
//!
//! Configuration management for the completion sync engines.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     THREADFLOW_API_URL=http://10.0.0.5:8081                            │
//! │     THREADFLOW_TRANSPORT=push                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/threadflow/sync.toml (Linux)                             │
//! │     ~/Library/Application Support/com.threadflow.threadflow/sync.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost endpoints, polling every 3s                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [server]
//! api_url = "http://localhost:8081"
//! ws_url = "ws://localhost:8082"
//! request_timeout_secs = 10
//! connect_timeout_secs = 10
//!
//! [sync]
//! transport = "poll"  # poll | push
//! poll_interval_ms = 3000
//! max_poll_failures = 5
//!
//! [backoff]
//! base_delay_ms = 5000
//! growth_factor = 1.5
//! max_delay_ms = 30000
//! attempt_cap = 10
//!
//! [push]
//! keepalive_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use threadflow_core::backoff::{
    DEFAULT_ATTEMPT_CAP, DEFAULT_BASE_DELAY, DEFAULT_GROWTH_FACTOR, DEFAULT_MAX_DELAY,
};
use threadflow_core::BackoffPolicy;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::poll::PollConfig;
use crate::push::PushConfig;

// =============================================================================
// Transport Kind
// =============================================================================

/// Which engine the facade drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Periodic HTTP fetch with a cursor.
    #[default]
    Poll,

    /// Long-lived WebSocket connection.
    Push,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Poll => write!(f, "poll"),
            TransportKind::Push => write!(f, "push"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poll" | "polling" | "http" => Ok(TransportKind::Poll),
            "push" | "websocket" | "ws" => Ok(TransportKind::Push),
            other => Err(SyncError::ConfigurationInvalid(format!(
                "Unknown transport: '{}'. Valid options: poll, push",
                other
            ))),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Where the task server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL for `/health`, `/completed_tasks` and `/submit`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// WebSocket endpoint for pushed completions.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Upper bound for a single HTTP request (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound for opening the WebSocket (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8082".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Engine selection and poll cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Engine the facade drives.
    #[serde(default)]
    pub transport: TransportKind,

    /// Delay between successful poll cycles (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Consecutive failed cycles tolerated before the poll engine gives up.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
}

fn default_poll_interval() -> u64 {
    3_000
}

fn default_max_poll_failures() -> u32 {
    5
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            transport: TransportKind::default(),
            poll_interval_ms: default_poll_interval(),
            max_poll_failures: default_max_poll_failures(),
        }
    }
}

// =============================================================================
// Backoff Settings
// =============================================================================

/// Retry schedule shared by both engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_attempt_cap")]
    pub attempt_cap: u32,
}

fn default_base_delay() -> u64 {
    DEFAULT_BASE_DELAY.as_millis() as u64
}

fn default_growth_factor() -> f64 {
    DEFAULT_GROWTH_FACTOR
}

fn default_max_delay() -> u64 {
    DEFAULT_MAX_DELAY.as_millis() as u64
}

fn default_attempt_cap() -> u32 {
    DEFAULT_ATTEMPT_CAP
}

impl Default for BackoffSettings {
    fn default() -> Self {
        BackoffSettings {
            base_delay_ms: default_base_delay(),
            growth_factor: default_growth_factor(),
            max_delay_ms: default_max_delay(),
            attempt_cap: default_attempt_cap(),
        }
    }
}

// =============================================================================
// Push Settings
// =============================================================================

/// WebSocket-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettings {
    /// Interval between keepalive pings (seconds).
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

fn default_keepalive() -> u64 {
    30
}

impl Default for PushSettings {
    fn default() -> Self {
        PushSettings {
            keepalive_secs: default_keepalive(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub backoff: BackoffSettings,

    #[serde(default)]
    pub push: PushSettings,
}

impl SyncConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        check_url(&self.server.api_url, &["http", "https"], "API URL")?;
        check_url(&self.server.ws_url, &["ws", "wss"], "WebSocket URL")?;

        if self.sync.poll_interval_ms == 0 {
            return Err(SyncError::ConfigurationInvalid(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }

        let growth = self.backoff.growth_factor;
        if growth.is_nan() || growth < 1.0 {
            return Err(SyncError::ConfigurationInvalid(format!(
                "growth_factor must be at least 1.0, got {}",
                self.backoff.growth_factor
            )));
        }

        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            return Err(SyncError::ConfigurationInvalid(format!(
                "base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.backoff.base_delay_ms, self.backoff.max_delay_ms
            )));
        }

        if self.push.keepalive_secs == 0 {
            return Err(SyncError::ConfigurationInvalid(
                "keepalive_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary lookup (the process environment
    /// in production).
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("THREADFLOW_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.server.api_url = url;
        }

        if let Some(url) = lookup("THREADFLOW_WS_URL") {
            debug!(url = %url, "Overriding WebSocket URL from environment");
            self.server.ws_url = url;
        }

        if let Some(transport) = lookup("THREADFLOW_TRANSPORT") {
            match transport.parse() {
                Ok(parsed) => self.sync.transport = parsed,
                Err(_) => warn!(transport = %transport, "Unknown transport in environment"),
            }
        }

        if let Some(interval) = lookup("THREADFLOW_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse::<u64>() {
                debug!(interval_ms = ms, "Overriding poll interval from environment");
                self.sync.poll_interval_ms = ms;
            }
        }

        if let Some(max) = lookup("THREADFLOW_MAX_POLL_FAILURES") {
            if let Ok(n) = max.parse::<u32>() {
                self.sync.max_poll_failures = n;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "threadflow", "threadflow")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Runtime Conversions
    // =========================================================================

    /// Returns the configured engine.
    pub fn transport(&self) -> TransportKind {
        self.sync.transport
    }

    /// Builds the retry schedule.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff.base_delay_ms),
            self.backoff.growth_factor,
            Duration::from_millis(self.backoff.max_delay_ms),
            self.backoff.attempt_cap,
        )
    }

    /// Builds the poll engine configuration.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.sync.poll_interval_ms),
            max_failures: self.sync.max_poll_failures,
            backoff: self.backoff_policy(),
        }
    }

    /// Builds the push engine configuration.
    pub fn push_config(&self) -> PushConfig {
        PushConfig {
            url: self.server.ws_url.clone(),
            connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
            keepalive_interval: Duration::from_secs(self.push.keepalive_secs),
            backoff: self.backoff_policy(),
        }
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

fn check_url(raw: &str, schemes: &[&str], what: &str) -> SyncResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| SyncError::ConfigurationInvalid(format!("{} '{}': {}", what, raw, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(SyncError::ConfigurationInvalid(format!(
            "{} must use {}, got: {}",
            what,
            schemes.join(" or "),
            raw
        )));
    }
    Ok(url)
}
