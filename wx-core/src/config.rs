use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    coordinator::{CoordinatorConfig, ReentrancyPolicy},
    location::FixFilter,
    model::{Coordinate, Units},
};

/// Weather service endpoint and request shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub units: Units,
    /// Number of hourly entries requested.
    pub hourly_count: u8,
    /// Number of days requested.
    pub daily_count: u8,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            units: Units::default(),
            hourly_count: 12,
            daily_count: 7,
            timeout_secs: 10,
        }
    }
}

/// Fixed location used when no positioning hardware is available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_m: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            accuracy_m: 10.0,
        }
    }
}

/// How position fixes are requested and which ones are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub desired_accuracy_m: f64,
    pub max_fix_accuracy_m: f64,
    pub max_fix_age_secs: u64,
    pub location_timeout_secs: u64,
    pub reentrancy: ReentrancyPolicy,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        let filter = FixFilter::default();
        Self {
            desired_accuracy_m: 100.0,
            max_fix_accuracy_m: filter.max_accuracy_m,
            max_fix_age_secs: filter.max_age.as_secs(),
            location_timeout_secs: 15,
            reentrancy: ReentrancyPolicy::default(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
///
/// [service]
/// units = "metric"
///
/// [location]
/// latitude = 37.77
/// longitude = -122.41
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub service: ServiceConfig,
    pub location: LocationConfig,
    pub acquisition: AcquisitionConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make every refresh fail.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("service.hourly_count", self.service.hourly_count == 0),
            ("service.daily_count", self.service.daily_count == 0),
            ("service.timeout_secs", self.service.timeout_secs == 0),
            (
                "acquisition.location_timeout_secs",
                self.acquisition.location_timeout_secs == 0,
            ),
        ];

        match checks.iter().find(|(_, is_zero)| *is_zero) {
            Some((key, _)) => Err(anyhow!(
                "Invalid configuration: `{key}` must be greater than zero.\n\
                 Hint: fix or remove it from the config file."
            )),
            None => Ok(()),
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        self.validate()?;
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wx", "wx")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// The configured fixed location, if both halves are present.
    pub fn fixed_coordinate(&self) -> Option<Coordinate> {
        match (self.location.latitude, self.location.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn set_fixed_location(&mut self, coordinate: Coordinate) {
        self.location.latitude = Some(coordinate.latitude);
        self.location.longitude = Some(coordinate.longitude);
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let acq = &self.acquisition;
        CoordinatorConfig {
            fix_filter: FixFilter {
                max_accuracy_m: acq.max_fix_accuracy_m,
                max_age: Duration::from_secs(acq.max_fix_age_secs),
            },
            desired_accuracy_m: acq.desired_accuracy_m,
            location_timeout: Duration::from_secs(acq.location_timeout_secs),
            fetch_timeout: Duration::from_secs(self.service.timeout_secs),
            reentrancy: acq.reentrancy,
        }
    }
}
