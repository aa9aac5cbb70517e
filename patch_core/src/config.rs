//! Configuration file support for patchctl.
//!
//! Device-profile constants are loaded from
//! `$XDG_CONFIG_HOME/patchctl/config.toml`. Everything has a default that
//! matches the shipped patch hardware, so a missing file is not an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub wear: WearConfig,

    #[serde(default)]
    pub battery: BatteryCurve,

    #[serde(default)]
    pub dosing: DosingConfig,
}

/// Patch wear-time configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WearConfig {
    /// Rated wear duration in hours before the patch expires
    #[serde(default = "default_patch_wear_hours")]
    pub patch_wear_hours: u32,
}

impl Default for WearConfig {
    fn default() -> Self {
        Self {
            patch_wear_hours: default_patch_wear_hours(),
        }
    }
}

impl WearConfig {
    /// Rated wear time as a duration.
    pub fn wear_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.patch_wear_hours as i64)
    }
}

/// Battery estimate curve, sampled at its two endpoints.
///
/// The firmware reports battery as a raw byte. Percent is linear between
/// the empty and full raw readings and clamped outside them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatteryCurve {
    /// Raw reading that maps to 0%
    #[serde(default = "default_battery_raw_at_empty")]
    pub raw_at_empty: u8,

    /// Raw reading that maps to 100%
    #[serde(default = "default_battery_raw_at_full")]
    pub raw_at_full: u8,
}

impl Default for BatteryCurve {
    fn default() -> Self {
        Self {
            raw_at_empty: default_battery_raw_at_empty(),
            raw_at_full: default_battery_raw_at_full(),
        }
    }
}

impl BatteryCurve {
    /// Map a raw battery byte to a 0-100 percent estimate.
    pub fn percent(&self, raw: u8) -> u8 {
        if self.raw_at_full <= self.raw_at_empty {
            // Degenerate curve; all we can say is full or not.
            return if raw >= self.raw_at_full { 100 } else { 0 };
        }
        let span = f64::from(self.raw_at_full) - f64::from(self.raw_at_empty);
        let pct = (f64::from(raw) - f64::from(self.raw_at_empty)) * 100.0 / span;
        pct.clamp(0.0, 100.0).round() as u8
    }
}

/// Dose granularity configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DosingConfig {
    /// Smallest dose increment shown to the user, in insulin units
    #[serde(default = "default_dose_step_units")]
    pub dose_step_units: f64,

    /// Rate of the placeholder full-day segment in a fresh schedule
    #[serde(default = "default_min_basal_rate")]
    pub min_basal_rate: f64,
}

impl Default for DosingConfig {
    fn default() -> Self {
        Self {
            dose_step_units: default_dose_step_units(),
            min_basal_rate: default_min_basal_rate(),
        }
    }
}

// Default value functions
fn default_patch_wear_hours() -> u32 {
    84
}

fn default_battery_raw_at_empty() -> u8 {
    100
}

fn default_battery_raw_at_full() -> u8 {
    150
}

fn default_dose_step_units() -> f64 {
    0.05
}

fn default_min_basal_rate() -> f64 {
    0.05
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
            let home = std::env::var("HOME")
                .expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("patchctl").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
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

    /// Round a dose to the configured display granularity.
    ///
    /// A zero or negative step disables rounding.
    pub fn round_dose(&self, units: f64) -> f64 {
        let step = self.dosing.dose_step_units;
        if step <= 0.0 {
            return units;
        }
        (units / step).round() * step
    }
}
