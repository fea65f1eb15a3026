//! WMO weather interpretation codes, as reported by Open-Meteo.
//!
//! See: https://open-meteo.com/en/docs#weathervariables

use crate::model::{ConditionDescriptor, MainCategory};

const UNKNOWN_ICON: &str = "50d";

/// Map a WMO code to a condition descriptor.
///
/// Total over `i32`: codes missing from the table map to an `Unknown`
/// descriptor instead of failing.
pub fn map_code(code: i32, is_daytime: bool) -> ConditionDescriptor {
    let day_night = |day: &'static str, night: &'static str| if is_daytime { day } else { night };

    let (main_category, description, icon_token) = match code {
        0 => (MainCategory::Clear, "Clear sky", day_night("01d", "01n")),
        1 => (MainCategory::Clouds, "Mainly clear", day_night("02d", "02n")),
        2 => (MainCategory::Clouds, "Partly cloudy", day_night("03d", "03n")),
        3 => (MainCategory::Clouds, "Overcast", day_night("04d", "04n")),
        45 => (MainCategory::Fog, "Fog", "50d"),
        48 => (MainCategory::Fog, "Depositing rime fog", "50d"),
        51 => (MainCategory::Drizzle, "Light drizzle", "09d"),
        53 => (MainCategory::Drizzle, "Moderate drizzle", "09d"),
        55 => (MainCategory::Drizzle, "Dense drizzle", "09d"),
        61 => (MainCategory::Rain, "Slight rain", "10d"),
        63 => (MainCategory::Rain, "Moderate rain", "10d"),
        65 => (MainCategory::Rain, "Heavy rain", "10d"),
        71 => (MainCategory::Snow, "Slight snow", "13d"),
        73 => (MainCategory::Snow, "Moderate snow", "13d"),
        75 => (MainCategory::Snow, "Heavy snow", "13d"),
        80 => (MainCategory::Rain, "Slight rain showers", "09d"),
        81 => (MainCategory::Rain, "Moderate rain showers", "09d"),
        82 => (MainCategory::Rain, "Violent rain showers", "09d"),
        95 => (MainCategory::Thunderstorm, "Thunderstorm", "11d"),
        96 => (MainCategory::Thunderstorm, "Thunderstorm with slight hail", "11d"),
        99 => (MainCategory::Thunderstorm, "Thunderstorm with heavy hail", "11d"),
        _ => return unknown(),
    };

    ConditionDescriptor {
        main_category,
        description: description.to_string(),
        icon_token: icon_token.to_string(),
    }
}

/// Descriptor used whenever a provider gives no usable condition.
pub fn unknown() -> ConditionDescriptor {
    ConditionDescriptor {
        main_category: MainCategory::Unknown,
        description: "Unknown".to_string(),
        icon_token: UNKNOWN_ICON.to_string(),
    }
}
