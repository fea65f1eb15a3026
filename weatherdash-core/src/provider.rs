use crate::{
    Config,
    model::{Coordinates, CurrentReading, DailySummary, PlaceMatch},
    provider::{
        air_quality::AirQualityClient, openmeteo::OpenMeteoProvider,
        openweather::OpenWeatherProvider,
    },
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod air_quality;
pub mod openmeteo;
pub mod openweather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    OpenMeteo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::OpenMeteo => "open-meteo",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::OpenMeteo]
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::OpenWeather)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "open-meteo" | "openmeteo" => Ok(ProviderId::OpenMeteo),
            _ => Err(anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, open-meteo."
            )),
        }
    }
}

/// A weather backend that normalizes its own payloads into the canonical
/// model. Parsing of upstream shapes never leaks past an implementation.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Geocode free text. An empty vector means "no matches", not a failure.
    async fn search_places(&self, query: &str, limit: usize) -> Result<Vec<PlaceMatch>>;

    /// Current conditions with a best-effort air-quality index.
    async fn current(&self, coords: Coordinates) -> Result<CurrentReading>;

    /// One summary per upcoming day.
    async fn daily_forecast(&self, coords: Coordinates) -> Result<Vec<DailySummary>>;
}

/// Observed daily summaries for a closed date range.
#[async_trait]
pub trait HistoryProvider: Send + Sync + Debug {
    async fn daily_history(
        &self,
        coords: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>>;
}

/// HTTP client shared by every provider built from one config.
pub fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("weatherdash/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    http: &Client,
) -> Result<Arc<dyn WeatherProvider>> {
    let air_quality = AirQualityClient::new(http.clone(), &config.endpoints.open_meteo_air_quality);

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => {
            let api_key = config.provider_api_key(id).ok_or_else(|| {
                anyhow!(
                    "No API key configured for provider '{id}'.\n\
                     Hint: run `weatherdash configure {id}` and enter your API key."
                )
            })?;
            Arc::new(OpenWeatherProvider::new(
                api_key.to_owned(),
                http.clone(),
                &config.endpoints.openweather,
                air_quality,
            ))
        }
        ProviderId::OpenMeteo => {
            Arc::new(OpenMeteoProvider::new(http.clone(), &config.endpoints, air_quality))
        }
    };

    Ok(provider)
}

/// GET `url` and decode a JSON body, turning non-2xx statuses into errors.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
    label: &str,
) -> Result<T> {
    tracing::debug!(url, label, "upstream request");

    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to send request to {label}"))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to read {label} response body"))?;

    if !status.is_success() {
        return Err(anyhow!(
            "{label} request failed with status {}: {}",
            status,
            truncate_body(&body),
        ));
    }

    serde_json::from_str(&body).with_context(|| format!("Failed to parse {label} JSON"))
}

pub(crate) fn coord_params(
    lat_key: &'static str,
    lon_key: &'static str,
    coords: Coordinates,
) -> Vec<(&'static str, String)> {
    vec![
        (lat_key, coords.latitude.to_string()),
        (lon_key, coords.longitude.to_string()),
    ]
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
