//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! channel-matchmaker service, including environment variable loading,
//! TOML file loading and validation.

use crate::config::queue::QueueConfig;
use crate::config::session::SessionLifecycleConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub queue: QueueSettings,
    pub session: SessionSettings,
    pub storage: StorageSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Queue settings shared by every channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Participants needed to form a match
    pub capacity: usize,
    /// Cooldown between successful enrollments of one participant
    pub enroll_cooldown_seconds: f64,
    /// Cooldown between successful withdrawals of one participant
    pub withdraw_cooldown_seconds: f64,
}

/// Match session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Seconds after formation at which the match session is deleted
    pub delete_after_seconds: u64,
    /// Seconds before deletion at which participants are warned (0 disables)
    pub warn_before_seconds: u64,
}

/// Persistence settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory for the JSON snapshot store; in-memory storage when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "channel-matchmaker".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            enroll_cooldown_seconds: 5.0,
            withdraw_cooldown_seconds: 5.0,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            delete_after_seconds: 600, // 10 minutes
            warn_before_seconds: 300,  // 5 minutes
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Environment variables still override
    /// values present in the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Queue settings
        if let Ok(size) = env::var("QUEUE_SIZE") {
            self.queue.capacity = size
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_SIZE value: {}", size))?;
        }
        if let Ok(cooldown) = env::var("COOLDOWN_JOIN_SEC") {
            self.queue.enroll_cooldown_seconds = cooldown
                .parse()
                .map_err(|_| anyhow!("Invalid COOLDOWN_JOIN_SEC value: {}", cooldown))?;
        }
        if let Ok(cooldown) = env::var("COOLDOWN_LEAVE_SEC") {
            self.queue.withdraw_cooldown_seconds = cooldown
                .parse()
                .map_err(|_| anyhow!("Invalid COOLDOWN_LEAVE_SEC value: {}", cooldown))?;
        }

        // Session settings
        if let Ok(delete_after) = env::var("MATCH_DELETE_AFTER_SEC") {
            self.session.delete_after_seconds = delete_after
                .parse()
                .map_err(|_| anyhow!("Invalid MATCH_DELETE_AFTER_SEC value: {}", delete_after))?;
        }
        if let Ok(warn_before) = env::var("MATCH_WARN_BEFORE_SEC") {
            self.session.warn_before_seconds = warn_before
                .parse()
                .map_err(|_| anyhow!("Invalid MATCH_WARN_BEFORE_SEC value: {}", warn_before))?;
        }

        // Storage settings
        if let Ok(dir) = env::var("DATA_DIR") {
            if !dir.is_empty() {
                self.storage.data_dir = Some(PathBuf::from(dir));
            }
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Queue capacity and cooldown windows
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue.capacity,
            enroll_cooldown: cooldown_duration(self.queue.enroll_cooldown_seconds),
            withdraw_cooldown: cooldown_duration(self.queue.withdraw_cooldown_seconds),
        }
    }

    /// Match session lifecycle durations
    pub fn session_config(&self) -> SessionLifecycleConfig {
        SessionLifecycleConfig {
            delete_after: Duration::from_secs(self.session.delete_after_seconds),
            warn_before: Duration::from_secs(self.session.warn_before_seconds),
        }
    }
}

/// Seconds to a cooldown window. Negative and NaN values disable the
/// cooldown; values too large for a `Duration` saturate.
fn cooldown_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX)
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate queue settings
    if config.queue.capacity == 0 {
        return Err(anyhow!("Queue capacity must be at least 1"));
    }
    for (name, value) in [
        ("enroll", config.queue.enroll_cooldown_seconds),
        ("withdraw", config.queue.withdraw_cooldown_seconds),
    ] {
        if !value.is_finite() || value < 0.0 || Duration::try_from_secs_f64(value).is_err() {
            return Err(anyhow!("Invalid {} cooldown: {}", name, value));
        }
    }

    Ok(())
}
