use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WeatherError;

/// A validated point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = WeatherError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.latitude, raw.longitude)
    }
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, WeatherError> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);

        if lat_ok && lon_ok {
            Ok(Self { latitude, longitude })
        } else {
            Err(WeatherError::InvalidCoordinates { latitude, longitude })
        }
    }

    /// Label used when neither the caller nor the provider knows a place name.
    pub fn label(&self) -> String {
        format!("Lat: {:.2}, Lon: {:.2}", self.latitude, self.longitude)
    }
}

/// A geocoding hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMatch {
    pub coordinates: Coordinates,
    pub display_name: String,
    pub country: String,
    pub admin_region: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MainCategory {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Thunderstorm,
    Snow,
    Fog,
    Unknown,
    /// A label passed through verbatim from a provider that reports its own
    /// categories (e.g. "Mist", "Haze").
    Other(String),
}

impl MainCategory {
    pub fn as_str(&self) -> &str {
        match self {
            MainCategory::Clear => "Clear",
            MainCategory::Clouds => "Clouds",
            MainCategory::Rain => "Rain",
            MainCategory::Drizzle => "Drizzle",
            MainCategory::Thunderstorm => "Thunderstorm",
            MainCategory::Snow => "Snow",
            MainCategory::Fog => "Fog",
            MainCategory::Unknown => "Unknown",
            MainCategory::Other(label) => label,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, MainCategory::Other(_))
    }
}

impl From<&str> for MainCategory {
    fn from(label: &str) -> Self {
        match label {
            "Clear" => MainCategory::Clear,
            "Clouds" => MainCategory::Clouds,
            "Rain" => MainCategory::Rain,
            "Drizzle" => MainCategory::Drizzle,
            "Thunderstorm" => MainCategory::Thunderstorm,
            "Snow" => MainCategory::Snow,
            "Fog" => MainCategory::Fog,
            "Unknown" | "" => MainCategory::Unknown,
            other => MainCategory::Other(other.to_string()),
        }
    }
}

impl From<String> for MainCategory {
    fn from(label: String) -> Self {
        MainCategory::from(label.as_str())
    }
}

impl From<MainCategory> for String {
    fn from(category: MainCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for MainCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDescriptor {
    pub main_category: MainCategory,
    pub description: String,
    pub icon_token: String,
}

/// Snapshot of the weather right now at one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub place_name: String,
    pub country_code: String,
    pub observed_at_epoch_seconds: i64,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    pub air_quality_index: Option<u32>,
    pub condition: ConditionDescriptor,
}

impl CurrentConditions {
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.observed_at_epoch_seconds, 0)
    }
}

/// One calendar day of forecast or observed weather.
///
/// Forecast and history produce the same record; nothing in it reveals
/// which provider or fetch path built it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Calendar date in the location's own UTC offset.
    pub date: NaiveDate,
    pub date_epoch_seconds: i64,
    pub temp_max_c: f64,
    pub temp_min_c: f64,
    pub wind_speed_max_ms: f64,
    pub precipitation_mm: f64,
    pub precipitation_probability_pct: Option<u8>,
    pub air_quality_index: Option<u32>,
    pub condition: ConditionDescriptor,
}

/// Daily summaries in ascending date order, at most one per date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesResult {
    days: Vec<DailySummary>,
}

impl SeriesResult {
    /// Sorts by date and keeps the first summary seen for each date.
    pub fn from_days(days: impl IntoIterator<Item = DailySummary>) -> Self {
        let mut days: Vec<DailySummary> = days.into_iter().collect();
        days.sort_by_key(|d| d.date);
        days.dedup_by_key(|d| d.date);
        Self { days }
    }

    pub fn truncated(mut self, max_days: usize) -> Self {
        self.days.truncate(max_days);
        self
    }

    pub fn days(&self) -> &[DailySummary] {
        &self.days
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DailySummary> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn into_vec(self) -> Vec<DailySummary> {
        self.days
    }
}

impl<'a> IntoIterator for &'a SeriesResult {
    type Item = &'a DailySummary;
    type IntoIter = std::slice::Iter<'a, DailySummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.days.iter()
    }
}

/// Current conditions as a provider reports them, before the caller's
/// place name and country take precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentReading {
    pub reported_name: Option<String>,
    pub reported_country: Option<String>,
    pub observed_at_epoch_seconds: i64,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    pub air_quality_index: Option<u32>,
    pub condition: ConditionDescriptor,
}

impl CurrentReading {
    /// Hints win over provider-reported values; a coordinate label is the
    /// last resort for the name, an empty string for the country.
    pub fn into_conditions(
        self,
        coords: Coordinates,
        name_hint: Option<&str>,
        country_hint: Option<&str>,
    ) -> CurrentConditions {
        let place_name = non_empty(name_hint)
            .or_else(|| non_empty(self.reported_name.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| coords.label());

        let country_code = non_empty(country_hint)
            .or_else(|| non_empty(self.reported_country.as_deref()))
            .unwrap_or_default()
            .to_string();

        CurrentConditions {
            place_name,
            country_code,
            observed_at_epoch_seconds: self.observed_at_epoch_seconds,
            temperature_c: self.temperature_c,
            feels_like_c: self.feels_like_c,
            humidity_pct: self.humidity_pct,
            pressure_hpa: self.pressure_hpa,
            wind_speed_ms: self.wind_speed_ms,
            air_quality_index: self.air_quality_index,
            condition: self.condition,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Everything the dashboard shows for one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    /// Set when the report was requested by place name.
    pub place: Option<PlaceMatch>,
    pub current: CurrentConditions,
    pub forecast: SeriesResult,
    /// Absent when the history panel could not be loaded.
    pub history: Option<SeriesResult>,
}

/// Turns a provider AQI reading into a non-negative integer index.
pub(crate) fn aqi_from_reading(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u32)
}
