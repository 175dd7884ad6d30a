//! Configuration parsing and validation.
//!
//! Configuration is loaded from TOML. Every section is optional; missing
//! values fall back to the defaults below.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Purgatory registration limits.
    #[serde(default)]
    pub purgatory: PurgatoryConfig,

    /// Background expiration driver.
    #[serde(default)]
    pub driver: DriverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Limits applied when registering deferred results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgatoryConfig {
    /// Largest accepted timeout in milliseconds. Longer timeouts are clamped.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

impl Default for PurgatoryConfig {
    fn default() -> Self {
        Self {
            max_timeout_ms: default_max_timeout_ms(),
        }
    }
}

/// Background expiration driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// How long the driver sleeps when nothing is pending, in milliseconds.
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            idle_wait_ms: default_idle_wait_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_max_timeout_ms() -> u64 {
    // One day; Raft request timeouts are seconds at most.
    86_400_000
}

fn default_idle_wait_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_purgatory()?;
        self.validate_driver()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_purgatory(&self) -> Result<()> {
        if self.purgatory.max_timeout_ms == 0 {
            anyhow::bail!("purgatory.max_timeout_ms must be > 0");
        }
        Ok(())
    }

    fn validate_driver(&self) -> Result<()> {
        if self.driver.idle_wait_ms == 0 {
            anyhow::bail!("driver.idle_wait_ms must be > 0");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}
