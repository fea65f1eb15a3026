use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use weatherdash_core::{Config, ProviderId, WeatherError, WeatherService};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Weather dashboard in your terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "open-meteo".
        provider: String,
    },

    /// Show current weather, forecast and recent history for a place.
    Show {
        /// Place name, e.g. "Paris" or "Springfield, IL".
        place: String,

        /// Print the canonical report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Same as `show`, for explicit coordinates (no geocoding).
    Coords {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        /// Display name to use instead of the provider's.
        #[arg(long)]
        name: Option<String>,

        /// Country code to use instead of the provider's.
        #[arg(long)]
        country: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List places matching a query (autocomplete suggestions).
    Search {
        query: String,

        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { place, json } => {
                let service = service()?;
                let report = service.by_place_name(&place).await.map_err(user_facing)?;
                emit(&report, json, render::report)
            }
            Command::Coords { latitude, longitude, name, country, json } => {
                let service = service()?;
                let report = service
                    .by_coordinates(latitude, longitude, name.as_deref(), country.as_deref())
                    .await
                    .map_err(user_facing)?;
                emit(&report, json, render::report)
            }
            Command::Search { query, json } => {
                let service = service()?;
                let places = service.search_places(&query).await.map_err(user_facing)?;
                emit(&places, json, |p| render::places(p))
            }
        }
    }
}

fn service() -> anyhow::Result<WeatherService> {
    let config = Config::load()?;
    WeatherService::from_config(&config)
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    if !id.requires_api_key() {
        println!("{id} needs no credentials; it is always available as the fallback provider.");
        return Ok(());
    }

    let mut config = Config::load()?;
    let key = inquire::Password::new(&format!("API key for {id} (leave empty to remove):"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if key.trim().is_empty() {
        config.remove_provider_api_key(id);
        println!("Removed {id} API key; Open-Meteo will be used exclusively.");
    } else {
        config.upsert_provider_api_key(id, key.trim().to_string());
        println!("Saved {id} API key; it will be tried first with Open-Meteo as fallback.");
    }

    config.save()?;
    println!("Config written to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Short, actionable messages that tell "not found" apart from "try later".
fn user_facing(err: WeatherError) -> anyhow::Error {
    match &err {
        WeatherError::NotFound(query) => {
            anyhow!("Place not found: '{query}'. Check the spelling or try a nearby city.")
        }
        WeatherError::ProviderUnavailable { .. } => {
            tracing::error!(error = ?err, "weather fetch failed");
            anyhow!("Failed to fetch weather data. Please try again later.")
        }
        WeatherError::InvalidCoordinates { .. } => anyhow!(
            "{err}. Latitude must be within -90..90 and longitude within -180..180."
        ),
    }
}

fn emit<T, F>(value: &T, json: bool, human: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", human(value));
    }
    Ok(())
}
