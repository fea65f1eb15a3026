use thiserror::Error;

/// Errors surfaced by [`WeatherService`](crate::WeatherService).
///
/// Best-effort data (air quality, history) never shows up here; it is
/// reported as an absent value instead.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// A name-based lookup matched no place on any provider.
    #[error("Place not found: {0}")]
    NotFound(String),

    /// Every eligible provider failed for a required sub-request.
    #[error("Failed to fetch weather data ({operation})")]
    ProviderUnavailable {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Latitude outside -90..=90, longitude outside -180..=180, or a
    /// non-finite value.
    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

impl WeatherError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WeatherError::NotFound(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, WeatherError::ProviderUnavailable { .. })
    }
}
