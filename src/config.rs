// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::rate_limit::DEFAULT_CALLS_PER_WINDOW;

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const ENV_API_KEY: &str = "OWM_API_KEY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const DEFAULT_CONFIG_PATH: &str = "config/ingest.toml";

/// Placeholder meaning "read this secret from the environment".
const FROM_ENV: &str = "ENV";

fn default_weather_url() -> String {
    "http://api.openweathermap.org/data/2.5/weather".to_string()
}
fn default_air_quality_url() -> String {
    "http://api.openweathermap.org/data/2.5/air_pollution".to_string()
}
fn default_uv_index_url() -> String {
    "http://api.openweathermap.org/data/2.5/uvi".to_string()
}
fn default_forecast_url() -> String {
    "https://api.openweathermap.org/data/2.5/forecast".to_string()
}
fn default_api_key() -> String {
    FROM_ENV.to_string()
}
fn default_units() -> String {
    "metric".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_calls_per_window() -> u32 {
    DEFAULT_CALLS_PER_WINDOW
}
fn default_region_pause_secs() -> u64 {
    120
}
fn default_locations_path() -> PathBuf {
    PathBuf::from("config/locations.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_weather_url")]
    pub weather_url: String,
    #[serde(default = "default_air_quality_url")]
    pub air_quality_url: String,
    #[serde(default = "default_uv_index_url")]
    pub uv_index_url: String,
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    /// "ENV" means: read from OWM_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Sent to the weather and forecast endpoints only.
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            weather_url: default_weather_url(),
            air_quality_url: default_air_quality_url(),
            uv_index_url: default_uv_index_url(),
            forecast_url: default_forecast_url(),
            api_key: default_api_key(),
            units: default_units(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_calls_per_window")]
    pub calls_per_window: u32,
    /// Pause between two regions, on top of any rate-limit waits.
    #[serde(default = "default_region_pause_secs")]
    pub region_pause_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            calls_per_window: default_calls_per_window(),
            region_pause_secs: default_region_pause_secs(),
        }
    }
}

impl LimitsConfig {
    pub fn region_pause(&self) -> Duration {
        Duration::from_secs(self.region_pause_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Postgres URL, or "ENV" for DATABASE_URL. Absent = dry run (records are logged).
    #[serde(default)]
    pub database_url: Option<String>,
    /// Create missing region tables before the run.
    #[serde(default)]
    pub create_tables: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_locations_path")]
    pub locations_path: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            limits: LimitsConfig::default(),
            storage: StorageConfig::default(),
            locations_path: default_locations_path(),
        }
    }
}

impl IngestConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading ingest config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: IngestConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $INGEST_CONFIG_PATH
    /// 2) config/ingest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default())
    }

    /// Replace "ENV" placeholders with values from the environment.
    pub fn resolve_secrets(mut self) -> Result<Self> {
        if self.provider.api_key.trim().eq_ignore_ascii_case(FROM_ENV) {
            self.provider.api_key = env::var(ENV_API_KEY)
                .map_err(|_| anyhow!("Missing {ENV_API_KEY} env var"))?;
        }
        if self.provider.api_key.trim().is_empty() {
            bail!("provider api_key is empty");
        }

        self.storage.database_url = match self.storage.database_url.take() {
            Some(url) if url.trim().eq_ignore_ascii_case(FROM_ENV) => {
                env::var(ENV_DATABASE_URL).ok()
            }
            Some(url) if url.trim().is_empty() => None,
            other => other,
        };
        Ok(self)
    }
}
