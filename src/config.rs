// src/config.rs
//! Configuration management with file storage under the user's config dir

use crate::{
    error::{Result, TrackerError},
    geo::{
        filter::{DEFAULT_MAX_ACCURACY_M, DEFAULT_MAX_JUMP_KM},
        GeoFilter,
    },
    store::DEFAULT_QUOTA_BYTES,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One day; longer intervals make the backup pointless.
pub const MAX_BACKUP_INTERVAL_SECS: u64 = 86_400;

/// Settings the tracking core needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingConfig {
    pub filter: GeoFilter,
    pub backup_interval_ms: i64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            filter: GeoFilter::default(),
            backup_interval_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub source_type: String, // "serial", "gpsd", "replay"
    pub serial_port: Option<String>,
    pub serial_baudrate: Option<u32>,
    pub gpsd_host: Option<String>,
    pub gpsd_port: Option<u16>,
    pub replay_file: Option<PathBuf>,
    pub replay_interval_ms: Option<u64>,
    pub data_dir: Option<PathBuf>,
    pub max_accuracy_m: f64,
    pub max_jump_km: f64,
    pub backup_interval_secs: u64,
    pub storage_quota_bytes: Option<u64>,
    pub share_base_url: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            source_type: "gpsd".to_string(),
            serial_port: None,
            serial_baudrate: Some(9600),
            gpsd_host: Some("localhost".to_string()),
            gpsd_port: Some(2947),
            replay_file: None,
            replay_interval_ms: Some(1000),
            data_dir: None,
            max_accuracy_m: DEFAULT_MAX_ACCURACY_M,
            max_jump_km: DEFAULT_MAX_JUMP_KM,
            backup_interval_secs: 20,
            storage_quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            share_base_url: "https://nature-tracker.local/".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Load from the default config file, or defaults when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| TrackerError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TrackerError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(config_path, contents)
            .map_err(|e| TrackerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn home_dir() -> Result<PathBuf> {
        std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| TrackerError::Config("HOME environment variable not set".to_string()))
    }

    /// Get config file path
    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?
            .join(".config")
            .join("nature-tracker")
            .join("config.json"))
    }

    /// Directory holding saved sessions, the backup and the archive.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::home_dir()?
                .join(".local")
                .join("share")
                .join("nature-tracker")),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_accuracy_m.is_nan() || self.max_accuracy_m <= 0.0 {
            return Err(TrackerError::Config(format!(
                "max_accuracy_m must be positive, got {}",
                self.max_accuracy_m
            )));
        }
        if self.max_jump_km.is_nan() || self.max_jump_km <= 0.0 {
            return Err(TrackerError::Config(format!(
                "max_jump_km must be positive, got {}",
                self.max_jump_km
            )));
        }
        if self.backup_interval_secs == 0 || self.backup_interval_secs > MAX_BACKUP_INTERVAL_SECS {
            return Err(TrackerError::Config(format!(
                "backup_interval_secs must be between 1 and {}, got {}",
                MAX_BACKUP_INTERVAL_SECS, self.backup_interval_secs
            )));
        }
        match self.source_type.as_str() {
            "serial" | "gpsd" | "replay" => Ok(()),
            other => Err(TrackerError::Config(format!("unknown source_type '{}'", other))),
        }
    }

    pub fn tracking(&self) -> TrackingConfig {
        TrackingConfig {
            filter: GeoFilter::new(self.max_accuracy_m, self.max_jump_km),
            backup_interval_ms: i64::try_from(self.backup_interval_secs.max(1).saturating_mul(1000))
                .unwrap_or(i64::MAX),
        }
    }

    /// Update configuration with new source settings
    pub fn update_source(&mut self, source_type: &str) {
        self.source_type = source_type.to_string();
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = "serial".to_string();
        self.serial_port = Some(port);
        self.serial_baudrate = Some(baudrate);
    }

    /// Update gpsd settings
    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.source_type = "gpsd".to_string();
        self.gpsd_host = Some(host);
        self.gpsd_port = Some(port);
    }

    /// Update replay settings
    pub fn update_replay(&mut self, file: PathBuf, interval_ms: u64) {
        self.source_type = "replay".to_string();
        self.replay_file = Some(file);
        self.replay_interval_ms = Some(interval_ms);
    }
}
