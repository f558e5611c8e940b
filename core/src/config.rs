//! Settings persistence for discovery defaults.
//!
//! Stores settings in JSON format at `~/.portfinder/config.json`.

use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::concurrency::DEFAULT_QUEUE_CAPACITY;
use crate::error::{Error, Result};

/// Discovery settings stored in JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Host the probes connect to.
    #[serde(default = "default_host")]
    pub host: String,

    /// First port of the searched range.
    #[serde(default = "default_port_start")]
    pub port_start: u16,

    /// End of the searched range (exclusive).
    #[serde(default = "default_port_end")]
    pub port_end: u16,

    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Outcomes buffered per run before dispatch waits.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Cap on concurrently running probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,

    /// Status endpoint to request; plain TCP connect when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,

    /// JSON field of the status response holding the secondary port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_field: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port_start() -> u16 {
    8900
}

fn default_port_end() -> u16 {
    18900
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port_start: default_port_start(),
            port_end: default_port_end(),
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            max_in_flight: None,
            http_path: None,
            secondary_field: None,
        }
    }
}

impl Settings {
    /// The searched range, validated.
    pub fn port_range(&self) -> Result<Range<u16>> {
        if self.port_start >= self.port_end {
            return Err(Error::Config(format!(
                "Port start {} must be below port end {}",
                self.port_start, self.port_end
            )));
        }
        Ok(self.port_start..self.port_end)
    }

    /// Reject settings every discovery run would refuse.
    pub fn validate(&self) -> Result<()> {
        self.port_range()?;
        if self.queue_capacity == 0 {
            return Err(Error::Config("Queue capacity must be at least 1".to_string()));
        }
        if self.max_in_flight == Some(0) {
            return Err(Error::Config("Max in-flight probes must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Per-probe timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Settings store for reading and writing discovery defaults.
#[derive(Debug)]
pub struct SettingsStore {
    /// Path to the settings file.
    config_path: PathBuf,
}

impl SettingsStore {
    /// Create a new settings store with the default path.
    ///
    /// Default path: `~/.portfinder/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_path = home.join(".portfinder").join("config.json");
        Ok(Self { config_path })
    }

    /// Create a settings store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Path of the settings file.
    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load settings from disk.
    ///
    /// Returns default settings if the file doesn't exist.
    pub async fn load(&self) -> Result<Settings> {
        if !self.config_path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save settings to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir).await.map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(settings)?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.config_path).await?;

        Ok(())
    }
}
