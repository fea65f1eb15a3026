use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::{
    fallback::best_effort,
    model::{
        ConditionDescriptor, Coordinates, CurrentReading, DailySummary, MainCategory, PlaceMatch,
        SeriesResult,
    },
    wmo,
};

use super::{ProviderId, WeatherProvider, air_quality::AirQualityClient, coord_params, fetch_json};

const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const GEOCODING_PATH: &str = "/geo/1.0/direct";

/// Days kept from the 5-day/3-hour forecast.
pub const FORECAST_DAYS: usize = 5;

/// `dt_txt` fragment marking the sample whose condition represents its day.
const NOON_MARKER: &str = "12:00:00";

/// OpenWeatherMap: the key-gated primary provider.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
    air_quality: AirQualityClient,
}

impl OpenWeatherProvider {
    pub fn new(
        api_key: String,
        http: Client,
        base_url: &str,
        air_quality: AirQualityClient,
    ) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            air_quality,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn weather_params(&self, coords: Coordinates) -> Vec<(&'static str, String)> {
        let mut query = coord_params("lat", "lon", coords);
        query.extend([("appid", self.api_key.clone()), ("units", "metric".to_string())]);
        query
    }

    async fn fetch_current_weather(&self, coords: Coordinates) -> Result<CurrentReading> {
        let parsed: OwCurrentResponse = fetch_json(
            &self.http,
            &self.url(CURRENT_PATH),
            &self.weather_params(coords),
            "OpenWeather current weather",
        )
        .await?;

        let condition = parsed
            .weather
            .first()
            .map(OwWeather::to_descriptor)
            .unwrap_or_else(wmo::unknown);

        Ok(CurrentReading {
            reported_name: parsed.name.filter(|n| !n.is_empty()),
            reported_country: parsed.sys.and_then(|s| s.country),
            observed_at_epoch_seconds: parsed.dt,
            temperature_c: parsed.main.temp,
            feels_like_c: parsed.main.feels_like,
            humidity_pct: parsed.main.humidity,
            pressure_hpa: parsed.main.pressure,
            wind_speed_ms: parsed.wind.speed,
            air_quality_index: None,
            condition,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: String,
    lat: f64,
    lon: f64,
    country: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

impl OwWeather {
    fn to_descriptor(&self) -> ConditionDescriptor {
        ConditionDescriptor {
            main_category: MainCategory::from(self.main.as_str()),
            description: self.description.clone(),
            icon_token: self.icon.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: Option<String>,
    dt: i64,
    sys: Option<OwSys>,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwSampleMain {
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwRain {
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastSample {
    dt: i64,
    dt_txt: Option<String>,
    main: OwSampleMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    rain: Option<OwRain>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    /// Shift from UTC in seconds.
    timezone: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastSample>,
    city: Option<OwCity>,
}

struct DayAccumulator {
    date_epoch_seconds: i64,
    temp_max_c: f64,
    temp_min_c: f64,
    wind_speed_max_ms: f64,
    precipitation_mm: f64,
    condition: ConditionDescriptor,
}

/// Fold 3-hour samples into one summary per calendar date.
///
/// Temperatures and wind keep running extremes, precipitation is summed.
/// The condition comes from the noon sample when there is one, otherwise
/// from the first sample of the date.
fn aggregate_daily(samples: &[OwForecastSample], utc_offset_secs: i64) -> SeriesResult {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for sample in samples {
        let Some(local) = DateTime::from_timestamp(sample.dt + utc_offset_secs, 0) else {
            continue;
        };

        let day = days.entry(local.date_naive()).or_insert_with(|| DayAccumulator {
            date_epoch_seconds: sample.dt,
            temp_max_c: sample.main.temp_max,
            temp_min_c: sample.main.temp_min,
            wind_speed_max_ms: 0.0,
            precipitation_mm: 0.0,
            condition: sample
                .weather
                .first()
                .map(OwWeather::to_descriptor)
                .unwrap_or_else(wmo::unknown),
        });

        day.temp_max_c = day.temp_max_c.max(sample.main.temp_max);
        day.temp_min_c = day.temp_min_c.min(sample.main.temp_min);
        day.wind_speed_max_ms = day.wind_speed_max_ms.max(sample.wind.speed);
        day.precipitation_mm += sample.rain.as_ref().and_then(|r| r.three_hours).unwrap_or(0.0);

        let is_noon = sample.dt_txt.as_deref().is_some_and(|t| t.contains(NOON_MARKER));
        if is_noon {
            if let Some(weather) = sample.weather.first() {
                day.condition = weather.to_descriptor();
            }
            day.date_epoch_seconds = sample.dt;
        }
    }

    SeriesResult::from_days(days.into_iter().map(|(date, day)| DailySummary {
        date,
        date_epoch_seconds: day.date_epoch_seconds,
        temp_max_c: day.temp_max_c,
        temp_min_c: day.temp_min_c,
        wind_speed_max_ms: day.wind_speed_max_ms,
        precipitation_mm: day.precipitation_mm,
        precipitation_probability_pct: None,
        air_quality_index: None,
        condition: day.condition,
    }))
    .truncated(FORECAST_DAYS)
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn search_places(&self, query: &str, limit: usize) -> Result<Vec<PlaceMatch>> {
        let params = [
            ("q", query.to_string()),
            ("limit", limit.to_string()),
            ("appid", self.api_key.clone()),
        ];

        let entries: Vec<OwGeoEntry> =
            fetch_json(&self.http, &self.url(GEOCODING_PATH), &params, "OpenWeather geocoding")
                .await?;

        entries
            .into_iter()
            .map(|e| -> Result<PlaceMatch> {
                Ok(PlaceMatch {
                    coordinates: Coordinates::new(e.lat, e.lon)?,
                    display_name: e.name,
                    country: e.country.clone().unwrap_or_default(),
                    admin_region: e.state,
                    country_code: e.country,
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
        let parsed: OwForecastResponse = fetch_json(
            &self.http,
            &self.url(FORECAST_PATH),
            &self.weather_params(coords),
            "OpenWeather forecast",
        )
        .await?;

        if parsed.list.is_empty() {
            return Err(anyhow!("OpenWeather forecast response contained no data"));
        }

        let offset = parsed.city.and_then(|c| c.timezone).unwrap_or(0);
        Ok(aggregate_daily(&parsed.list, offset).into_vec())
    }
}
