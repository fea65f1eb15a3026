use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::model::{Coordinates, aqi_from_reading};

use super::{coord_params, fetch_json};

const AIR_QUALITY_PATH: &str = "/v1/air-quality";

/// Open-Meteo air-quality endpoint, used by both providers for the US AQI.
#[derive(Debug, Clone)]
pub struct AirQualityClient {
    http: Client,
    url: String,
}

impl AirQualityClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{}{AIR_QUALITY_PATH}", base_url.trim_end_matches('/')),
        }
    }

    /// Current US AQI; `Ok(None)` when the upstream has no reading.
    pub async fn current_us_aqi(&self, coords: Coordinates) -> Result<Option<u32>> {
        let mut query = coord_params("latitude", "longitude", coords);
        query.push(("current", "us_aqi".to_string()));

        let parsed: AqCurrentResponse =
            fetch_json(&self.http, &self.url, &query, "Open-Meteo air quality (current)").await?;

        Ok(parsed.current.and_then(|c| c.us_aqi).and_then(aqi_from_reading))
    }

    /// Daily US AQI keyed by the day's unix timestamp.
    pub async fn daily_us_aqi(&self, coords: Coordinates) -> Result<HashMap<i64, u32>> {
        let mut query = coord_params("latitude", "longitude", coords);
        query.extend([
            ("daily", "us_aqi".to_string()),
            ("timeformat", "unixtime".to_string()),
            ("timezone", "auto".to_string()),
        ]);

        let parsed: AqDailyResponse =
            fetch_json(&self.http, &self.url, &query, "Open-Meteo air quality (daily)").await?;

        let Some(daily) = parsed.daily else {
            return Ok(HashMap::new());
        };

        Ok(daily
            .time
            .iter()
            .zip(daily.us_aqi.iter())
            .filter_map(|(ts, value)| value.and_then(aqi_from_reading).map(|aqi| (*ts, aqi)))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct AqCurrent {
    us_aqi: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AqCurrentResponse {
    current: Option<AqCurrent>,
}

#[derive(Debug, Deserialize)]
struct AqDaily {
    time: Vec<i64>,
    #[serde(default)]
    us_aqi: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AqDailyResponse {
    daily: Option<AqDaily>,
}
