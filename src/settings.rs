//! Runtime configuration for the recorder.
//!
//! Settings come from the environment (`POLYBOOK_*`) or from a JSON file with
//! the same shape; unset values keep their defaults.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Columnar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Checkpoint every Nth ingested event; 0 disables snapshotting.
    pub snapshot_interval: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            snapshot_interval: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub data_directory: PathBuf,
    /// Buffered events (across all four buffers) that force a flush.
    pub write_buffer_size: usize,
    pub flush_interval_secs: u64,
}

impl StorageSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: StorageBackend::Memory,
            data_directory: PathBuf::from("data"),
            write_buffer_size: 1024,
            flush_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Defaults overridden by any `POLYBOOK_*` variables present.
    pub fn from_environment() -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(value) = env_var("POLYBOOK_SNAPSHOT_INTERVAL") {
            settings.service.snapshot_interval = parse(&value, "POLYBOOK_SNAPSHOT_INTERVAL")?;
        }
        if let Some(value) = env_var("POLYBOOK_STORAGE_BACKEND") {
            settings.storage.backend = match value.as_str() {
                "memory" => StorageBackend::Memory,
                "columnar" => StorageBackend::Columnar,
                other => {
                    return Err(Error::Parse {
                        what: "POLYBOOK_STORAGE_BACKEND",
                        value: other.to_string(),
                    })
                }
            };
        }
        if let Some(value) = env_var("POLYBOOK_DATA_DIRECTORY") {
            settings.storage.data_directory = PathBuf::from(value);
        }
        if let Some(value) = env_var("POLYBOOK_WRITE_BUFFER_SIZE") {
            settings.storage.write_buffer_size = parse(&value, "POLYBOOK_WRITE_BUFFER_SIZE")?;
        }
        if let Some(value) = env_var("POLYBOOK_FLUSH_INTERVAL_SECS") {
            settings.storage.flush_interval_secs = parse(&value, "POLYBOOK_FLUSH_INTERVAL_SECS")?;
        }

        Ok(settings)
    }

    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&data).map_err(|err| Error::Parse {
            what: "settings file",
            value: err.to_string(),
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse<T: std::str::FromStr>(value: &str, what: &'static str) -> Result<T> {
    value.parse().map_err(|_| Error::Parse {
        what,
        value: value.to_string(),
    })
}
