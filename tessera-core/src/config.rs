//! Configuration for a tessera zone.
//!
//! Maps directly to `zone.toml`. Every field has a default, so an empty file
//! is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level zone configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Zone loop and command handling.
    #[serde(default)]
    pub zone: ZoneSettings,
    /// Snapshot storage.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl ZoneConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `TesseraError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::TesseraError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Zone loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSettings {
    /// Zone name; also the snapshot key.
    #[serde(default = "default_zone_name")]
    pub name: String,
    /// Milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Milliseconds between inbound queue polls inside a tick interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Commands drained per step.
    #[serde(default = "default_max_commands_per_step")]
    pub max_commands_per_step: usize,
    /// Inbound queue capacity; pushes beyond it are refused.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    /// Seed for the zone RNG. Unset means seeded from entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Replies for commands no action matches, chosen at random.
    #[serde(default = "default_unknown_command_replies")]
    pub unknown_command_replies: Vec<String>,
}

impl ZoneSettings {
    /// Tick interval as a [`Duration`].
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Poll interval as a [`Duration`], never longer than the tick interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.min(self.tick_interval_ms).max(1))
    }
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            name: default_zone_name(),
            tick_interval_ms: default_tick_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_commands_per_step: default_max_commands_per_step(),
            inbound_capacity: default_inbound_capacity(),
            rng_seed: None,
            unknown_command_replies: default_unknown_command_replies(),
        }
    }
}

/// Which snapshot store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One SQLite database holding every zone.
    Sqlite,
    /// One JSON file per zone.
    Json,
    /// No persistence.
    None,
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: "sqlite", "json" or "none".
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Database file (sqlite) or directory (json).
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect snapshot corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Number of database backups to keep.
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,
    /// Save every N ticks; 0 saves only on shutdown.
    #[serde(default)]
    pub auto_save_interval_ticks: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_path(),
            wal_mode: true,
            checksum_enabled: true,
            backup_count: default_backup_count(),
            auto_save_interval_ticks: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_zone_name() -> String {
    "default".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    20
}

fn default_max_commands_per_step() -> usize {
    256
}

fn default_inbound_capacity() -> usize {
    4096
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_path() -> PathBuf {
    PathBuf::from("tessera.db")
}

fn default_backup_count() -> u32 {
    3
}

fn default_unknown_command_replies() -> Vec<String> {
    ["What?", "Eh?", "Come again?", "Unknown command."]
        .into_iter()
        .map(String::from)
        .collect()
}
