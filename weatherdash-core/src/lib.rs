//! Core library for the `weatherdash` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Canonical weather models shared by every provider
//! - Provider adapters (OpenWeather as primary, Open-Meteo as secondary)
//! - The weather data service, with one fallback hop per required request
//!
//! It is used by `weatherdash-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod fallback;
pub mod model;
pub mod provider;
pub mod service;
pub mod wmo;

pub use config::{Config, Endpoints, ProviderConfig};
pub use error::WeatherError;
pub use model::{
    ConditionDescriptor, Coordinates, CurrentConditions, CurrentReading, DailySummary,
    DashboardReport, MainCategory, PlaceMatch, SeriesResult,
};
pub use provider::{HistoryProvider, ProviderId, WeatherProvider};
pub use service::WeatherService;
pub use wmo::map_code;
