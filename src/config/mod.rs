// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for pipestore

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::Io;
use crate::PipestoreError;

/// Top-level configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// How long writers wait for a settings file lock, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Log file settings
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
    /// Name written in the banner (defaults to the file name)
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default = "default_log_filename")]
    pub filename: String,
    /// Log directory (defaults to the home directory)
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub date: bool,
    #[serde(default = "default_true")]
    pub time: bool,
    /// Files larger than this many bytes are cleared on open
    #[serde(default = "default_size_cap")]
    pub size_cap: u64,
}

// Default value functions
fn default_lock_timeout_ms() -> u64 { 5000 }
fn default_log_filename() -> String { "pipestore".to_string() }
fn default_true() -> bool { true }
fn default_size_cap() -> u64 { 500_000 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_name: None,
            filename: default_log_filename(),
            dir: None,
            date: true,
            time: true,
            size_cap: default_size_cap(),
        }
    }
}

impl StoreConfig {
    /// Default location: `<config dir>/pipestore/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pipestore")
            .join("config.json")
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if Io::file_exists(path) {
            let value = Io::new().read(Some(path))?;
            let config: Self = serde_json::from_value(value)
                .map_err(|e| PipestoreError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        Io::new().with_lock_timeout(self.lock_timeout()).write(self, Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::load(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.log, LogConfig::default());
        assert_eq!(config.log.size_cap, 500_000);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"log": {"filename": "studio", "time": false}}"#).unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.lock_timeout_ms, 5000);
        assert_eq!(config.log.filename, "studio");
        assert!(config.log.date);
        assert!(!config.log.time);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = StoreConfig::default();
        config.lock_timeout_ms = 250;
        config.log.dir = Some(dir.path().join("logs"));
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded.lock_timeout_ms, 250);
        assert_eq!(loaded.log, config.log);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lock_timeout_ms": "soon"}"#).unwrap();

        assert!(matches!(StoreConfig::load(&path), Err(PipestoreError::Config(_))));
    }
}
