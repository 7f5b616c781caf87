use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    config::ServiceConfig,
    error::{FetchError, TransportError},
    icon::ConditionCode,
    model::{Coordinate, RequestKind, Temperatures, Units, WeatherRecord},
};

use super::FetchClient;

/// OpenWeatherMap 2.5 API client.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    units: Units,
    hourly_count: usize,
    daily_count: usize,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String, service: &ServiceConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(service.timeout_secs))
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key,
            base_url: service.base_url.trim_end_matches('/').to_string(),
            units: service.units,
            hourly_count: usize::from(service.hourly_count),
            daily_count: usize::from(service.daily_count),
            http,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        kind: RequestKind,
        path: &str,
        at: Coordinate,
        count: Option<usize>,
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, path);

        let mut query = vec![
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("units", self.units.as_str().to_string()),
        ];
        if let Some(cnt) = count {
            query.push(("cnt", cnt.to_string()));
        }
        query.push(("appid", self.api_key.clone()));

        debug!(%kind, %url, %at, "requesting OpenWeather");

        let res = self.http.get(&url).query(&query).send().await.map_err(|err| {
            warn!(%kind, error = %err, "OpenWeather request failed");
            TransportError::from(err)
        })?;

        let status = res.status();
        let body = res.text().await.map_err(TransportError::from)?;

        if !status.is_success() {
            warn!(%kind, %status, "OpenWeather returned an error status");
            return Err(FetchError::Service {
                status: status.as_u16(),
                message: service_message(&body),
            });
        }

        serde_json::from_str(&body)
            .map_err(|err| FetchError::decode(format!("{kind} payload: {err}")))
    }
}

#[async_trait]
impl FetchClient for OpenWeatherClient {
    async fn fetch_current_conditions(&self, at: Coordinate) -> Result<WeatherRecord, FetchError> {
        let parsed: OwCurrentResponse = self.get(RequestKind::Current, "weather", at, None).await?;
        decode_current(parsed)
    }

    async fn fetch_hourly_forecast(&self, at: Coordinate) -> Result<Vec<WeatherRecord>, FetchError> {
        let parsed: OwHourlyResponse = self
            .get(RequestKind::Hourly, "forecast", at, Some(self.hourly_count))
            .await?;
        decode_hourly(parsed, self.hourly_count)
    }

    async fn fetch_daily_forecast(&self, at: Coordinate) -> Result<Vec<WeatherRecord>, FetchError> {
        let parsed: OwDailyResponse = self
            .get(RequestKind::Daily, "forecast/daily", at, Some(self.daily_count))
            .await?;
        decode_daily(parsed, self.daily_count)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: Option<String>,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: Option<OwSys>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwHourlyEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwHourlyResponse {
    city: Option<OwCity>,
    list: Vec<OwHourlyEntry>,
}

#[derive(Debug, Deserialize)]
struct OwDailyTemp {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OwDailyEntry {
    dt: i64,
    temp: OwDailyTemp,
    humidity: u8,
    weather: Vec<OwWeather>,
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwDailyResponse {
    city: Option<OwCity>,
    list: Vec<OwDailyEntry>,
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: String,
}

struct Condition {
    summary: String,
    description: String,
    code: ConditionCode,
}

fn first_condition(weather: &[OwWeather]) -> Result<Condition, FetchError> {
    let first = weather
        .first()
        .ok_or_else(|| FetchError::decode("entry has no weather conditions"))?;

    let code = ConditionCode::try_from(first.icon.as_str())
        .map_err(|err| FetchError::decode(err.to_string()))?;

    Ok(Condition {
        summary: first.main.clone(),
        description: first.description.clone(),
        code,
    })
}

fn decode_current(parsed: OwCurrentResponse) -> Result<WeatherRecord, FetchError> {
    let condition = first_condition(&parsed.weather)?;
    let sys = parsed.sys.unwrap_or(OwSys { sunrise: None, sunset: None });

    Ok(WeatherRecord {
        timestamp: unix_to_utc(parsed.dt)?,
        humidity_pct: parsed.main.humidity,
        temperatures: Temperatures::Observed {
            current: parsed.main.temp,
            high: parsed.main.temp_max,
            low: parsed.main.temp_min,
        },
        location_name: non_empty(parsed.name),
        sunrise: sys.sunrise.map(unix_to_utc).transpose()?,
        sunset: sys.sunset.map(unix_to_utc).transpose()?,
        condition: condition.summary,
        condition_description: condition.description,
        condition_code: condition.code,
        wind_bearing_deg: parsed.wind.deg,
        wind_speed: parsed.wind.speed,
    })
}

fn decode_hourly(parsed: OwHourlyResponse, limit: usize) -> Result<Vec<WeatherRecord>, FetchError> {
    let location_name = non_empty(parsed.city.and_then(|c| c.name));

    let mut records = parsed
        .list
        .into_iter()
        .map(|entry| -> Result<WeatherRecord, FetchError> {
            let condition = first_condition(&entry.weather)?;
            Ok(WeatherRecord {
                timestamp: unix_to_utc(entry.dt)?,
                humidity_pct: entry.main.humidity,
                temperatures: Temperatures::Observed {
                    current: entry.main.temp,
                    high: entry.main.temp_max,
                    low: entry.main.temp_min,
                },
                location_name: location_name.clone(),
                sunrise: None,
                sunset: None,
                condition: condition.summary,
                condition_description: condition.description,
                condition_code: condition.code,
                wind_bearing_deg: entry.wind.deg,
                wind_speed: entry.wind.speed,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    records.sort_by_key(|r| r.timestamp);
    records.truncate(limit);

    if records.is_empty() {
        return Err(FetchError::decode("hourly forecast contained no entries"));
    }
    Ok(records)
}

fn decode_daily(parsed: OwDailyResponse, limit: usize) -> Result<Vec<WeatherRecord>, FetchError> {
    let location_name = non_empty(parsed.city.and_then(|c| c.name));

    let mut records = parsed
        .list
        .into_iter()
        .map(|entry| -> Result<WeatherRecord, FetchError> {
            let condition = first_condition(&entry.weather)?;
            Ok(WeatherRecord {
                timestamp: unix_to_utc(entry.dt)?,
                humidity_pct: entry.humidity,
                temperatures: Temperatures::Range { high: entry.temp.max, low: entry.temp.min },
                location_name: location_name.clone(),
                sunrise: None,
                sunset: None,
                condition: condition.summary,
                condition_description: condition.description,
                condition_code: condition.code,
                wind_bearing_deg: entry.deg,
                wind_speed: entry.speed,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    records.sort_by_key(|r| r.timestamp);
    records.dedup_by_key(|r| r.timestamp.date_naive());
    records.truncate(limit);

    if records.is_empty() {
        return Err(FetchError::decode("daily forecast contained no entries"));
    }
    Ok(records)
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>, FetchError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .ok_or_else(|| FetchError::decode(format!("timestamp {ts} is out of range")))
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.trim().is_empty())
}

/// Prefer the service's own error message, fall back to the raw body.
fn service_message(body: &str) -> String {
    serde_json::from_str::<OwErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| truncate_body(body))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
