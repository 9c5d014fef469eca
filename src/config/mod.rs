//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Smallest accepted frame capacity (16 KiB)
pub const MIN_FRAME_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    pub log: LogConfig,

    /// Session-specific configuration
    pub session: SessionConfig,

    /// Console-specific configuration
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Optional log file; empty means stderr only
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest frame sent or received, in bytes
    pub max_frame_bytes: usize,

    /// Close the session when console input ends
    pub close_on_eof: bool,

    /// How long a shutdown waits for the close handshake, in milliseconds
    pub close_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Colour the `>>` / `<<` prefixes on a terminal
    pub enable_colors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log: LogConfig::default(),
            session: SessionConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 16 * 1024 * 1024,
            close_on_eof: false,
            close_timeout_ms: 1000,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enable_colors: true,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, using defaults when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load_from_file(path);
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        // WSRELAY_LOG_LEVEL - logging level
        if let Ok(log_level) = env::var("WSRELAY_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // WSRELAY_LOG_FILE_PATH - logging destination file
        if let Ok(file_path) = env::var("WSRELAY_LOG_FILE_PATH") {
            self.log.file_path = file_path;
        }

        // WSRELAY_MAX_FRAME_BYTES - frame capacity
        if let Ok(max_frame) = env::var("WSRELAY_MAX_FRAME_BYTES") {
            if let Ok(value) = max_frame.parse::<usize>() {
                self.session.max_frame_bytes = value;
            }
        }

        // WSRELAY_CLOSE_TIMEOUT_MS - shutdown close grace period
        if let Ok(close_timeout) = env::var("WSRELAY_CLOSE_TIMEOUT_MS") {
            if let Ok(value) = close_timeout.parse::<u64>() {
                self.session.close_timeout_ms = value;
            }
        }

        // WSRELAY_CLOSE_ON_EOF - close the session at end of input
        if let Ok(close_on_eof) = env::var("WSRELAY_CLOSE_ON_EOF") {
            self.session.close_on_eof = close_on_eof.parse().unwrap_or(self.session.close_on_eof);
        }

        // WSRELAY_ENABLE_COLORS - coloured prefixes
        if let Ok(enable_colors) = env::var("WSRELAY_ENABLE_COLORS") {
            self.console.enable_colors =
                enable_colors.parse().unwrap_or(self.console.enable_colors);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            anyhow::bail!("Log level must not be empty");
        }

        if self.session.max_frame_bytes < MIN_FRAME_BYTES {
            anyhow::bail!(
                "session.max_frame_bytes must be at least {} bytes, got {}",
                MIN_FRAME_BYTES,
                self.session.max_frame_bytes
            );
        }

        if self.session.close_timeout_ms == 0 {
            anyhow::bail!("session.close_timeout_ms must be greater than zero");
        }

        Ok(())
    }

    /// Shutdown close grace period
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.session.close_timeout_ms)
    }

    /// Log file path, if file logging is enabled
    pub fn log_file(&self) -> Option<&Path> {
        let path = self.log.file_path.trim();
        (!path.is_empty()).then(|| Path::new(path))
    }
}
