use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::{
    config::Endpoints,
    fallback::best_effort,
    model::{Coordinates, CurrentReading, DailySummary, PlaceMatch},
    wmo,
};

use super::{
    HistoryProvider, ProviderId, WeatherProvider, air_quality::AirQualityClient, coord_params,
    fetch_json,
};

const GEOCODING_PATH: &str = "/v1/search";
const FORECAST_PATH: &str = "/v1/forecast";
const ARCHIVE_PATH: &str = "/v1/archive";

pub const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,is_day,weather_code,surface_pressure,wind_speed_10m";
pub const FORECAST_DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,wind_speed_10m_max,precipitation_sum,precipitation_probability_max";
pub const HISTORY_DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,wind_speed_10m_max,precipitation_sum";

/// Open-Meteo: the free, keyless secondary provider and the only history source.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    http: Client,
    geocoding_url: String,
    forecast_url: String,
    archive_url: String,
    air_quality: AirQualityClient,
}

impl OpenMeteoProvider {
    pub fn new(http: Client, endpoints: &Endpoints, air_quality: AirQualityClient) -> Self {
        let join = |base: &str, path: &str| format!("{}{path}", base.trim_end_matches('/'));
        Self {
            http,
            geocoding_url: join(&endpoints.open_meteo_geocoding, GEOCODING_PATH),
            forecast_url: join(&endpoints.open_meteo_forecast, FORECAST_PATH),
            archive_url: join(&endpoints.open_meteo_archive, ARCHIVE_PATH),
            air_quality,
        }
    }

    async fn fetch_current_weather(&self, coords: Coordinates) -> Result<CurrentReading> {
        let mut query = coord_params("latitude", "longitude", coords);
        query.extend([
            ("current", CURRENT_FIELDS.to_string()),
            ("timeformat", "unixtime".to_string()),
            ("timezone", "auto".to_string()),
        ]);

        let parsed: OmCurrentResponse =
            fetch_json(&self.http, &self.forecast_url, &query, "Open-Meteo current weather").await?;
        let current = parsed.current;

        Ok(CurrentReading {
            reported_name: None,
            reported_country: None,
            observed_at_epoch_seconds: current.time,
            temperature_c: current.temperature_2m,
            feels_like_c: current.apparent_temperature,
            humidity_pct: current.relative_humidity_2m,
            pressure_hpa: current.surface_pressure,
            wind_speed_ms: kmh_to_ms(current.wind_speed_10m),
            air_quality_index: None,
            condition: wmo::map_code(current.weather_code, current.is_day != 0),
        })
    }

    async fn fetch_daily(
        &self,
        url: &str,
        mut query: Vec<(&'static str, String)>,
        label: &str,
    ) -> Result<OmDailyResponse> {
        query.extend([
            ("timeformat", "unixtime".to_string()),
            ("timezone", "auto".to_string()),
        ]);
        fetch_json(&self.http, url, &query, label).await
    }
}

fn kmh_to_ms(kmh: f64) -> f64 {
    kmh / 3.6
}

#[derive(Debug, Deserialize)]
struct OmPlace {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    country_code: Option<String>,
    admin1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResponse {
    results: Option<Vec<OmPlace>>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: i64,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    is_day: u8,
    weather_code: i32,
    surface_pressure: f64,
    wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct OmCurrentResponse {
    current: OmCurrent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OmDaily {
    time: Vec<i64>,
    weather_code: Vec<Option<i32>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    wind_speed_10m_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmDailyResponse {
    #[serde(default)]
    utc_offset_seconds: i64,
    daily: Option<OmDaily>,
}

fn at<T: Copy>(column: &[Option<T>], i: usize) -> Option<T> {
    column.get(i).copied().flatten()
}

/// One summary per reported day. Days without both temperatures are skipped.
fn daily_rows(response: &OmDailyResponse, aqi_by_day: &HashMap<i64, u32>) -> Vec<DailySummary> {
    let Some(daily) = &response.daily else {
        return Vec::new();
    };

    daily
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let (Some(temp_max_c), Some(temp_min_c)) =
                (at(&daily.temperature_2m_max, i), at(&daily.temperature_2m_min, i))
            else {
                tracing::debug!(ts, "skipping Open-Meteo day without temperatures");
                return None;
            };

            let date = DateTime::from_timestamp(ts + response.utc_offset_seconds, 0)?.date_naive();
            let condition = at(&daily.weather_code, i)
                .map(|code| wmo::map_code(code, true))
                .unwrap_or_else(wmo::unknown);

            Some(DailySummary {
                date,
                date_epoch_seconds: ts,
                temp_max_c,
                temp_min_c,
                wind_speed_max_ms: at(&daily.wind_speed_10m_max, i).map(kmh_to_ms).unwrap_or(0.0),
                precipitation_mm: at(&daily.precipitation_sum, i).unwrap_or(0.0),
                precipitation_probability_pct: at(&daily.precipitation_probability_max, i)
                    .filter(|p| p.is_finite())
                    .map(|p| p.round().clamp(0.0, 100.0) as u8),
                air_quality_index: aqi_by_day.get(&ts).copied(),
                condition,
            })
        })
        .collect()
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn search_places(&self, query: &str, limit: usize) -> Result<Vec<PlaceMatch>> {
        let params = [
            ("name", query.to_string()),
            ("count", limit.to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];

        let parsed: OmGeocodingResponse =
            fetch_json(&self.http, &self.geocoding_url, &params, "Open-Meteo geocoding").await?;

        parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|p| -> Result<PlaceMatch> {
                Ok(PlaceMatch {
                    coordinates: Coordinates::new(p.latitude, p.longitude)?,
                    display_name: p.name,
                    country: p.country.unwrap_or_default(),
                    admin_region: p.admin1,
                    country_code: p.country_code,
                })
            })
            .collect()
    }

    async fn current(&self, coords: Coordinates) -> Result<CurrentReading> {
        let (weather, aqi) = tokio::join!(
            self.fetch_current_weather(coords),
            best_effort("current air quality", self.air_quality.current_us_aqi(coords)),
        );

        let mut reading = weather?;
        reading.air_quality_index = aqi.flatten();
        Ok(reading)
    }

    async fn daily_forecast(&self, coords: Coordinates) -> Result<Vec<DailySummary>> {
        let mut query = coord_params("latitude", "longitude", coords);
        query.push(("daily", FORECAST_DAILY_FIELDS.to_string()));

        let (weather, aqi) = tokio::join!(
            self.fetch_daily(&self.forecast_url, query, "Open-Meteo daily forecast"),
            best_effort("daily air quality", self.air_quality.daily_us_aqi(coords)),
        );

        let weather = weather?;
        if weather.daily.is_none() {
            return Err(anyhow!("Open-Meteo forecast response contained no daily data"));
        }

        Ok(daily_rows(&weather, &aqi.unwrap_or_default()))
    }
}

#[async_trait]
impl HistoryProvider for OpenMeteoProvider {
    async fn daily_history(
        &self,
        coords: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        let mut query = coord_params("latitude", "longitude", coords);
        query.extend([
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
            ("daily", HISTORY_DAILY_FIELDS.to_string()),
        ]);

        let parsed = self.fetch_daily(&self.archive_url, query, "Open-Meteo archive").await?;
        if parsed.daily.is_none() {
            return Err(anyhow!("Open-Meteo archive response contained no daily data"));
        }

        Ok(daily_rows(&parsed, &HashMap::new()))
    }
}
