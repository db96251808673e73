//! Configuration module for molcomm-rs
//!
//! This module handles the testbed configuration:
//! - Decoder attachment (strategy, receivers, landmark metadata)
//! - Pump transmitter link and default pulse
//! - Runner cadence and logging
//!
//! # File Formats
//!
//! Config files are TOML (`.toml`) or JSON (`.json`), chosen by extension.
//!
//! # Default Location
//!
//! The runner looks for `molcomm.toml` in the platform data directory:
//! - **Linux**: `~/.local/share/dev.molcomm.molcomm-rs/`
//! - **macOS**: `~/Library/Application Support/dev.molcomm.molcomm-rs/`
//! - **Windows**: `%APPDATA%\dev.molcomm.molcomm-rs\`
//!
//! # Example
//!
//! ```ignore
//! use molcomm_rs::config::AppConfig;
//!
//! let config = AppConfig::load("testbed.toml")?;
//! config.save("testbed.json")?;
//! ```

pub mod settings;

pub use settings::*;

use crate::actuation::PulseSpec;
use crate::decoder::strategies::OnOffKeyingConfig;
use crate::error::{MolcommError, Result};
use crate::receiver::simulated::SignalPattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.molcomm.molcomm-rs";

/// Default config filename inside the app data directory
pub const CONFIG_FILE: &str = "molcomm.toml";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        MolcommError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            MolcommError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== File Format ====================

/// On-disk format of a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            _ => Err(MolcommError::Config(format!(
                "Unsupported config file extension: {:?}",
                path
            ))),
        }
    }
}

// ==================== App Config ====================

/// Complete testbed configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Decoder to attach at startup
    #[serde(default)]
    pub decoder: Option<DecoderConfig>,

    /// Pump transmitter to attach at startup
    #[serde(default)]
    pub transmitter: Option<TransmitterConfig>,

    /// Runner settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file, TOML or JSON by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MolcommError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| {
                MolcommError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            }),
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| {
                MolcommError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            }),
        }
    }

    /// Load a config file, returning the sample config on any error
    pub fn load_or_sample(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using sample config: {}", e);
            Self::sample()
        })
    }

    /// Save the config, TOML or JSON by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MolcommError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| MolcommError::Serialization(e.to_string()))?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| MolcommError::Serialization(e.to_string()))?,
        };

        std::fs::write(path, content).map_err(|e| {
            MolcommError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// A self-contained demo: one simulated receiver sending an on-off keyed
    /// message, decoded by the on-off keying strategy, plus a dry-run pump.
    pub fn sample() -> Self {
        let receiver = ReceiverConfig::Simulated(SimulatedReceiverConfig {
            channels: vec![SignalPattern::Symbols {
                symbols: vec![1, 0, 1, 1, 0, 0, 1, 0],
                amplitude_per_level: 1.0,
                baseline: 0.0,
                symbol_duration_s: 0.5,
                lead_in_s: 0.25,
                repeat: false,
            }],
            channel_names: vec!["concentration".to_string()],
            sample_rate_hz: 50.0,
            noise_amplitude: 0.05,
            ..SimulatedReceiverConfig::default()
        });

        let decoder = DecoderConfig::new(
            DecoderKind::OnOffKeying(OnOffKeyingConfig {
                channel: 0,
                threshold: 0.5,
                symbol_duration_s: 0.5,
            }),
            vec![receiver],
        );

        let transmitter = TransmitterConfig {
            link: TransmitterLink::DryRun,
            pulse: Some(PulseSpec {
                on_voltages: [100, 100, 100, 100],
                off_voltages: [0, 0, 0, 0],
                delays_ms: [0, 10, 0, 20],
                duration_ms: 50,
            }),
            pulse_after_s: 1.0,
        };

        Self {
            decoder: Some(decoder),
            transmitter: Some(transmitter),
            runtime: RuntimeConfig {
                run_seconds: Some(6.0),
                ..RuntimeConfig::default()
            },
        }
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/b.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("b.JSON")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("b.yaml")).is_err());
        assert!(ConfigFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_sample_config() {
        let config = AppConfig::sample();
        let decoder = config.decoder.as_ref().unwrap();
        assert_eq!(decoder.receivers.len(), 1);
        assert_eq!(decoder.kind.name(), "on_off_keying");
        assert!(config.transmitter.unwrap().pulse.is_some());
    }

    #[test]
    fn test_toml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("testbed.toml");

        let config = AppConfig::sample();
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testbed.json");

        let config = AppConfig::sample();
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_minimal_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.toml");
        std::fs::write(
            &path,
            r#"
[runtime]
frames_per_second = 10

[decoder]
kind = { kind = "passthrough" }

[[decoder.receivers]]
type = "Simulated"
channels = [{ pattern = "Sine", frequency = 1.0, amplitude = 2.0, offset = 0.0 }]
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.runtime.frames_per_second, 10);
        let decoder = config.decoder.unwrap();
        assert_eq!(decoder.kind, DecoderKind::Passthrough);
        assert_eq!(decoder.receivers[0].type_name(), "Simulated");
        assert!(config.transmitter.is_none());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = AppConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, MolcommError::Config(_)));
    }

    #[test]
    fn test_load_or_sample_falls_back() {
        let config = AppConfig::load_or_sample("/definitely/not/here.toml");
        assert!(config.decoder.is_some());
    }
}
