use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::icon::ConditionCode;

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// One reported position fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub coordinate: Coordinate,
    /// Radius of uncertainty in metres. Negative means the provider could not
    /// estimate it.
    pub horizontal_accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
}

/// Which of the three service requests a record (or a failure) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Current,
    Hourly,
    Daily,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Current => "current conditions",
            RequestKind::Hourly => "hourly forecast",
            RequestKind::Daily => "daily forecast",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit system requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Standard,
    Metric,
    #[default]
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Standard => "standard",
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Standard => "K",
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_suffix(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Standard | Units::Metric => "m/s",
        }
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "standard" => Ok(Units::Standard),
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: standard, metric, imperial."
            )),
        }
    }
}

/// Temperatures carried by a record.
///
/// Current conditions and hourly entries report a point temperature together
/// with the expected range; daily entries only report the range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Temperatures {
    Observed { current: f64, high: f64, low: f64 },
    Range { high: f64, low: f64 },
}

impl Temperatures {
    pub fn temperature(&self) -> Option<f64> {
        match self {
            Temperatures::Observed { current, .. } => Some(*current),
            Temperatures::Range { .. } => None,
        }
    }

    pub fn high(&self) -> f64 {
        match self {
            Temperatures::Observed { high, .. } | Temperatures::Range { high, .. } => *high,
        }
    }

    pub fn low(&self) -> f64 {
        match self {
            Temperatures::Observed { low, .. } | Temperatures::Range { low, .. } => *low,
        }
    }
}

/// One observation or forecast point, as decoded from the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub timestamp: DateTime<Utc>,
    pub humidity_pct: u8,
    pub temperatures: Temperatures,
    pub location_name: Option<String>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    /// Short summary such as "Clouds".
    pub condition: String,
    /// Longer text such as "broken clouds".
    pub condition_description: String,
    pub condition_code: ConditionCode,
    pub wind_bearing_deg: Option<f64>,
    pub wind_speed: f64,
}

impl WeatherRecord {
    pub fn temperature(&self) -> Option<f64> {
        self.temperatures.temperature()
    }

    pub fn high(&self) -> f64 {
        self.temperatures.high()
    }

    pub fn low(&self) -> f64 {
        self.temperatures.low()
    }

    pub fn icon(&self) -> &'static str {
        self.condition_code.icon_name()
    }
}

/// The committed result of one successful refresh cycle.
///
/// Every field was produced by the same cycle; snapshots are only ever
/// replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub cycle: u64,
    pub location: Position,
    pub current: WeatherRecord,
    pub hourly: Vec<WeatherRecord>,
    pub daily: Vec<WeatherRecord>,
    pub committed_at: DateTime<Utc>,
}
