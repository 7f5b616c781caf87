use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config,
    client::openweather::OpenWeatherClient,
    error::FetchError,
    model::{Coordinate, WeatherRecord},
};

pub mod openweather;

/// Stateless access to a remote weather service.
///
/// Each call issues exactly one request and either decodes the response or
/// fails with a [`FetchError`] whose variant tells transport, service and
/// decoding problems apart.
#[async_trait]
pub trait FetchClient: Send + Sync + Debug {
    async fn fetch_current_conditions(&self, at: Coordinate) -> Result<WeatherRecord, FetchError>;

    /// Chronologically ordered, never empty.
    async fn fetch_hourly_forecast(&self, at: Coordinate) -> Result<Vec<WeatherRecord>, FetchError>;

    /// Chronologically ordered, one entry per day, never empty.
    async fn fetch_daily_forecast(&self, at: Coordinate) -> Result<Vec<WeatherRecord>, FetchError>;
}

/// Construct the configured fetch client.
///
/// `api_key` overrides the key stored in `config` when given.
pub fn client_from_config(
    config: &Config,
    api_key: Option<&str>,
) -> anyhow::Result<Arc<dyn FetchClient>> {
    let api_key = api_key.or(config.api_key()).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
                 Hint: run `wx configure` or set WX_API_KEY."
        )
    })?;

    let client = OpenWeatherClient::new(api_key.to_owned(), &config.service)?;
    Ok(Arc::new(client))
}
