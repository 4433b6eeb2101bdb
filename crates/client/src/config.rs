//! Configuration management for the SPTF client.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/sptf/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protocol::Locale;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Configuration loading and validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("invalid TOML configuration: {0}")]
    Parse(String),

    #[error("failed to write config file {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("server url must be an absolute http:// or https:// url, got {0}")]
    InvalidServerUrl(String),

    #[error("connect_attempts must be between 1 and 100, got {0}")]
    InvalidConnectAttempts(u32),

    #[error("connect_poll_interval_ms must be between 10 and 10000, got {0}")]
    InvalidPollInterval(u64),

    #[error("request_timeout_secs must be between 1 and 3600, got {0}")]
    InvalidRequestTimeout(u64),

    #[error("max_upload_size must be greater than 0, got {0}")]
    InvalidMaxUploadSize(u64),

    #[error("start_path must be absolute, got {0}")]
    InvalidStartPath(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Server used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "https://localhost:8766";

/// Main configuration structure for the SPTF client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Which server to talk to.
    pub server: ServerConfig,

    /// Persistent channel settings.
    pub connection: ConnectionConfig,

    /// Upload and download settings.
    pub transfer: TransferConfig,

    /// Presentation settings.
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the SPTF server (scheme, host, port).
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How many times readiness is polled before the open is abandoned.
    pub connect_attempts: u32,

    /// Delay between readiness polls, in milliseconds.
    pub connect_poll_interval_ms: u64,

    /// How long a directory request may stay unanswered, in seconds.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Largest upload accepted before any I/O, in bytes (default: 64MB).
    pub max_upload_size: u64,

    /// Where downloads are written.
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    /// Language of user-facing error messages.
    pub locale: Locale,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// First directory shown after the channel opens.
    pub start_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 10,
            connect_poll_interval_ms: 200,
            request_timeout_secs: 30,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_upload_size: protocol::http::MAX_UPLOAD_SIZE,
            download_dir: default_download_dir(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            locale: Locale::En,
            log_level: "info".to_string(),
            start_path: "/".to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.connect_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sptf")
        .join("config.toml")
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl ClientConfig {
    /// Config pointing at `url`, everything else default.
    pub fn with_server_url(url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.server.url = url.into();
        config
    }

    /// The server URL, parsed.
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.server.url)
            .map_err(|_| ConfigError::InvalidServerUrl(self.server.url.clone()))?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(ConfigError::InvalidServerUrl(self.server.url.clone())),
        }
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - SPTF_SERVER_URL: Override the server URL
    /// - SPTF_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SPTF_SERVER_URL") {
            if !url.is_empty() {
                tracing::info!("Overriding server url from environment: {}", url);
                self.server.url = url;
            }
        }

        if let Ok(level) = std::env::var("SPTF_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.ui.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_url()?;

        let connection = &self.connection;
        if !(1..=100).contains(&connection.connect_attempts) {
            return Err(ConfigError::InvalidConnectAttempts(
                connection.connect_attempts,
            ));
        }
        if !(10..=10_000).contains(&connection.connect_poll_interval_ms) {
            return Err(ConfigError::InvalidPollInterval(
                connection.connect_poll_interval_ms,
            ));
        }
        if !(1..=3600).contains(&connection.request_timeout_secs) {
            return Err(ConfigError::InvalidRequestTimeout(
                connection.request_timeout_secs,
            ));
        }

        if self.transfer.max_upload_size == 0 {
            return Err(ConfigError::InvalidMaxUploadSize(
                self.transfer.max_upload_size,
            ));
        }

        if !self.ui.start_path.starts_with('/') {
            return Err(ConfigError::InvalidStartPath(self.ui.start_path.clone()));
        }

        let level = self.ui.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.ui.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_toml(&contents)
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_err = |e: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents).map_err(write_err)?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
