//! Configuration file support for reefdose.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/reefdose/config.toml`.

use crate::status::Ranges;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub tank: TankConfig,

    #[serde(default)]
    pub dosing: DosingConfig,

    #[serde(default)]
    pub ranges: Ranges,
}

/// Where measurements are read from and written to
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Remote spreadsheet endpoint. Takes precedence over `local_path`.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            local_path: default_local_path(),
        }
    }
}

/// Physical system parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TankConfig {
    #[serde(default = "default_volume_gallons")]
    pub volume_gallons: f64,

    /// ppm calcium raised by 1 mL of Part 1 in 100 liters
    #[serde(default = "default_ca_impact_per_100l")]
    pub ca_impact_per_100l: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            volume_gallons: default_volume_gallons(),
            ca_impact_per_100l: default_ca_impact_per_100l(),
        }
    }
}

/// Reagent ratios and correction thresholds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DosingConfig {
    #[serde(default = "default_part2_ratio")]
    pub part2_ratio: f64,

    #[serde(default = "default_minor_ratio")]
    pub part3_ratio: f64,

    #[serde(default = "default_minor_ratio")]
    pub part4_ratio: f64,

    #[serde(default = "default_correction_threshold")]
    pub correction_threshold: f64,

    #[serde(default = "default_split_threshold")]
    pub split_threshold: f64,

    #[serde(default = "default_split_days")]
    pub split_days: u32,
}

impl Default for DosingConfig {
    fn default() -> Self {
        Self {
            part2_ratio: default_part2_ratio(),
            part3_ratio: default_minor_ratio(),
            part4_ratio: default_minor_ratio(),
            correction_threshold: default_correction_threshold(),
            split_threshold: default_split_threshold(),
            split_days: default_split_days(),
        }
    }
}

// Default value functions
fn default_local_path() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("reefdose").join("measurements.jsonl")
}

fn default_volume_gallons() -> f64 {
    35.0
}

fn default_ca_impact_per_100l() -> f64 {
    1.4
}

fn default_part2_ratio() -> f64 {
    2.0
}

fn default_minor_ratio() -> f64 {
    0.5
}

fn default_correction_threshold() -> f64 {
    5.0
}

fn default_split_threshold() -> f64 {
    20.0
}

fn default_split_days() -> u32 {
    3
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
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
        config.validate()?;
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
        base.join("reefdose").join("config.toml")
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

    /// Reject values that would make the dosing math meaningless
    pub fn validate(&self) -> Result<()> {
        if !is_positive(self.tank.volume_gallons) {
            return Err(Error::Config("tank.volume_gallons must be positive".into()));
        }
        if !is_positive(self.tank.ca_impact_per_100l) {
            return Err(Error::Config(
                "tank.ca_impact_per_100l must be positive".into(),
            ));
        }
        if !(self.dosing.correction_threshold.is_finite()
            && self.dosing.correction_threshold >= 0.0)
        {
            return Err(Error::Config(
                "dosing.correction_threshold must not be negative".into(),
            ));
        }
        if self.dosing.split_days == 0 {
            return Err(Error::Config("dosing.split_days must be at least 1".into()));
        }
        if self.dosing.split_threshold < self.dosing.correction_threshold {
            return Err(Error::Config(
                "dosing.split_threshold must not be below correction_threshold".into(),
            ));
        }
        for parameter in crate::Parameter::ALL {
            let range = self.ranges.get(parameter);
            if range.min >= range.max {
                return Err(Error::Config(format!(
                    "ranges.{}: min must be below max",
                    parameter.key()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.source.endpoint.is_none());
        assert_eq!(config.tank.volume_gallons, 35.0);
        assert_eq!(config.dosing.correction_threshold, 5.0);
        assert_eq!(config.dosing.split_threshold, 20.0);
        assert_eq!(config.dosing.split_days, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.source.endpoint = Some("https://example.com/exec".into());
        config.tank.volume_gallons = 75.0;
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed.source.endpoint, config.source.endpoint);
        assert_eq!(parsed.tank.volume_gallons, 75.0);
        assert_eq!(parsed.ranges, config.ranges);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[tank]
volume_gallons = 50.0

[dosing]
split_days = 2
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tank.volume_gallons, 50.0);
        assert_eq!(config.tank.ca_impact_per_100l, 1.4); // default
        assert_eq!(config.dosing.split_days, 2);
        assert_eq!(config.dosing.part2_ratio, 2.0); // default
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.tank.volume_gallons = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.dosing.split_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dosing.correction_threshold = -1.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.dosing.correction_threshold = 0.0;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.ranges.ph.min = 9.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[tank]\nvolume_gallons = -3.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
