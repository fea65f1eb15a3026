use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::provider::ProviderId;

/// Environment variable that overrides the stored OpenWeather API key.
pub const OPENWEATHER_API_KEY_ENV: &str = "WEATHERDASH_OPENWEATHER_API_KEY";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Upstream base URLs. Only overridden when pointing at a proxy or a mock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub openweather: String,
    pub open_meteo_geocoding: String,
    pub open_meteo_forecast: String,
    pub open_meteo_air_quality: String,
    pub open_meteo_archive: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openweather: "https://api.openweathermap.org".to_string(),
            open_meteo_geocoding: "https://geocoding-api.open-meteo.com".to_string(),
            open_meteo_forecast: "https://api.open-meteo.com".to_string(),
            open_meteo_air_quality: "https://air-quality-api.open-meteo.com".to_string(),
            open_meteo_archive: "https://archive-api.open-meteo.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Route every upstream to one host, e.g. a local mock server.
    pub fn single_host(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            openweather: base.clone(),
            open_meteo_geocoding: base.clone(),
            open_meteo_forecast: base.clone(),
            open_meteo_air_quality: base.clone(),
            open_meteo_archive: base,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load config from disk (or defaults on first run), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherdash", "weatherdash")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(OPENWEATHER_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.upsert_provider_api_key(ProviderId::OpenWeather, key);
        }
    }

    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    pub fn remove_provider_api_key(&mut self, provider_id: ProviderId) -> bool {
        self.providers.remove(provider_id.as_str()).is_some()
    }

    /// Returns API key for a provider, if present and non-blank.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.trim())
            .filter(|key| !key.is_empty())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key() || self.provider_api_key(provider_id).is_some()
    }

    /// The credential that makes the primary provider the first choice.
    pub fn primary_api_key(&self) -> Option<&str> {
        self.provider_api_key(ProviderId::OpenWeather)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_config_has_no_primary_credential() {
        let cfg = Config::default();

        assert!(cfg.primary_api_key().is_none());
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
        assert!(cfg.is_provider_configured(ProviderId::OpenMeteo));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("OPEN_KEY"));
        assert_eq!(cfg.primary_api_key(), Some("OPEN_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));

        assert!(cfg.remove_provider_api_key(ProviderId::OpenWeather));
        assert!(cfg.primary_api_key().is_none());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "   ".into());

        assert!(cfg.primary_api_key().is_none());
    }

    #[test]
    fn env_override_replaces_stored_key() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "STORED".into());

        cfg.apply_env_overrides(|name| {
            (name == OPENWEATHER_API_KEY_ENV).then(|| "FROM_ENV".to_string())
        });

        assert_eq!(cfg.primary_api_key(), Some("FROM_ENV"));
    }

    #[test]
    fn blank_env_override_is_ignored() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "STORED".into());

        cfg.apply_env_overrides(|_| Some(String::new()));

        assert_eq!(cfg.primary_api_key(), Some("STORED"));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [providers.openweather]
            api_key = "abc"

            [endpoints]
            open_meteo_forecast = "http://localhost:9000"
            "#,
        )
        .expect("config must parse");

        assert_eq!(cfg.primary_api_key(), Some("abc"));
        assert_eq!(cfg.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(cfg.endpoints.open_meteo_forecast, "http://localhost:9000");
        assert_eq!(cfg.endpoints.openweather, Endpoints::default().openweather);
    }

    #[test]
    fn single_host_strips_trailing_slash() {
        let endpoints = Endpoints::single_host("http://127.0.0.1:4000/");
        assert_eq!(endpoints.openweather, "http://127.0.0.1:4000");
        assert_eq!(endpoints.open_meteo_archive, "http://127.0.0.1:4000");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("weatherdash-does-not-exist/config.toml");
        let cfg = Config::load_from(&path).expect("missing file is not an error");
        assert!(cfg.providers.is_empty());
    }
}
