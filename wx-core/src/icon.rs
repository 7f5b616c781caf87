//! Service condition codes and their display icons.
//!
//! OpenWeatherMap tags every observation with an icon code such as `"01d"`
//! (clear sky, day) or `"10n"` (rain, night). The vocabulary is fixed, so it
//! is modelled as a closed enum and any other code is rejected at decode time.

use serde::Serialize;
use std::{convert::TryFrom, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConditionCode {
    #[serde(rename = "01d")]
    ClearDay,
    #[serde(rename = "01n")]
    ClearNight,
    #[serde(rename = "02d")]
    FewCloudsDay,
    #[serde(rename = "02n")]
    FewCloudsNight,
    #[serde(rename = "03d")]
    ScatteredCloudsDay,
    #[serde(rename = "03n")]
    ScatteredCloudsNight,
    #[serde(rename = "04d")]
    BrokenCloudsDay,
    #[serde(rename = "04n")]
    BrokenCloudsNight,
    #[serde(rename = "09d")]
    ShowerRainDay,
    #[serde(rename = "09n")]
    ShowerRainNight,
    #[serde(rename = "10d")]
    RainDay,
    #[serde(rename = "10n")]
    RainNight,
    #[serde(rename = "11d")]
    ThunderstormDay,
    #[serde(rename = "11n")]
    ThunderstormNight,
    #[serde(rename = "13d")]
    SnowDay,
    #[serde(rename = "13n")]
    SnowNight,
    #[serde(rename = "50d")]
    MistDay,
    #[serde(rename = "50n")]
    MistNight,
}

impl ConditionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionCode::ClearDay => "01d",
            ConditionCode::ClearNight => "01n",
            ConditionCode::FewCloudsDay => "02d",
            ConditionCode::FewCloudsNight => "02n",
            ConditionCode::ScatteredCloudsDay => "03d",
            ConditionCode::ScatteredCloudsNight => "03n",
            ConditionCode::BrokenCloudsDay => "04d",
            ConditionCode::BrokenCloudsNight => "04n",
            ConditionCode::ShowerRainDay => "09d",
            ConditionCode::ShowerRainNight => "09n",
            ConditionCode::RainDay => "10d",
            ConditionCode::RainNight => "10n",
            ConditionCode::ThunderstormDay => "11d",
            ConditionCode::ThunderstormNight => "11n",
            ConditionCode::SnowDay => "13d",
            ConditionCode::SnowNight => "13n",
            ConditionCode::MistDay => "50d",
            ConditionCode::MistNight => "50n",
        }
    }

    /// Name of the image asset used to render this condition.
    ///
    /// Pure lookup: the same code always yields the same name.
    pub fn icon_name(&self) -> &'static str {
        match self {
            ConditionCode::ClearDay => "weather-clear",
            ConditionCode::ClearNight => "weather-moon",
            ConditionCode::FewCloudsDay | ConditionCode::ScatteredCloudsDay => "weather-few",
            ConditionCode::FewCloudsNight | ConditionCode::ScatteredCloudsNight => {
                "weather-few-night"
            }
            ConditionCode::BrokenCloudsDay | ConditionCode::BrokenCloudsNight => "weather-broken",
            ConditionCode::ShowerRainDay | ConditionCode::ShowerRainNight => "weather-shower",
            ConditionCode::RainDay => "weather-rain",
            ConditionCode::RainNight => "weather-rain-night",
            ConditionCode::ThunderstormDay | ConditionCode::ThunderstormNight => "weather-tstorm",
            ConditionCode::SnowDay | ConditionCode::SnowNight => "weather-snow",
            ConditionCode::MistDay | ConditionCode::MistNight => "weather-mist",
        }
    }

    pub fn is_night(&self) -> bool {
        self.as_str().ends_with('n')
    }

    pub const fn all() -> &'static [ConditionCode] {
        &[
            ConditionCode::ClearDay,
            ConditionCode::ClearNight,
            ConditionCode::FewCloudsDay,
            ConditionCode::FewCloudsNight,
            ConditionCode::ScatteredCloudsDay,
            ConditionCode::ScatteredCloudsNight,
            ConditionCode::BrokenCloudsDay,
            ConditionCode::BrokenCloudsNight,
            ConditionCode::ShowerRainDay,
            ConditionCode::ShowerRainNight,
            ConditionCode::RainDay,
            ConditionCode::RainNight,
            ConditionCode::ThunderstormDay,
            ConditionCode::ThunderstormNight,
            ConditionCode::SnowDay,
            ConditionCode::SnowNight,
            ConditionCode::MistDay,
            ConditionCode::MistNight,
        ]
    }
}

impl fmt::Display for ConditionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a service reports a code outside the known vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition code '{0}'")]
pub struct UnknownConditionCode(pub String);

impl TryFrom<&str> for ConditionCode {
    type Error = UnknownConditionCode;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ConditionCode::all()
            .iter()
            .copied()
            .find(|code| code.as_str() == value)
            .ok_or_else(|| UnknownConditionCode(value.to_string()))
    }
}
