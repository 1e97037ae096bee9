//! Configuration file support for Stride.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/stride/config.toml`.

use crate::{
    DeviceCapabilities, Error, Result, RoundingStrategy, SpeedMode, SpeedPolicy, SpeedUnit,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Treadmill speed envelope
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub unit: SpeedUnit,

    #[serde(default)]
    pub mode: SpeedMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<f64>>,

    #[serde(default = "default_min_speed")]
    pub min: Option<f64>,

    #[serde(default = "default_max_speed")]
    pub max: Option<f64>,

    #[serde(default = "default_increment")]
    pub increment: Option<f64>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            unit: SpeedUnit::default(),
            mode: SpeedMode::default(),
            allowed: None,
            min: default_min_speed(),
            max: default_max_speed(),
            increment: default_increment(),
        }
    }
}

/// Speed rounding configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub strategy: RoundingStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("stride")
}

fn default_min_speed() -> Option<f64> {
    Some(0.5)
}

fn default_max_speed() -> Option<f64> {
    Some(4.0)
}

fn default_increment() -> Option<f64> {
    Some(0.1)
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("stride").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Device envelope described by the `[device]` section
    pub fn capabilities(&self) -> DeviceCapabilities {
        let device = &self.device;
        DeviceCapabilities {
            unit: device.unit,
            mode: device.mode,
            allowed: device.allowed.clone(),
            min: device.min,
            max: device.max,
            increment: device.increment,
        }
    }

    pub fn policy(&self) -> SpeedPolicy {
        SpeedPolicy {
            strategy: self.policy.strategy,
            tolerance: self.policy.tolerance,
        }
    }
}
