//! Configuration management for the Aircast service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::AircastError;
use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the Aircast service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AircastConfig {
    /// Upstream provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Reconciliation settings
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Map clustering settings
    #[serde(default)]
    pub map: MapConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Supported counties and their center coordinates
    #[serde(default = "default_counties")]
    pub counties: Vec<CountyEntry>,
}

/// Upstream provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// AirNow API key; falls back to the `AIRNOW_API_KEY` variable
    pub airnow_api_key: Option<String>,
    #[serde(default = "default_airnow_base_url")]
    pub airnow_base_url: String,
    /// OpenAQ API key; falls back to the `OPENAQ_API_KEY` variable. The
    /// crowd-sensor feed is skipped without one.
    pub openaq_api_key: Option<String>,
    #[serde(default = "default_openaq_base_url")]
    pub openaq_base_url: String,
    #[serde(default = "default_open_meteo_base_url")]
    pub open_meteo_base_url: String,
    #[serde(default = "default_pollen_page_base_url")]
    pub pollen_page_base_url: String,
    /// Per-provider request budget in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Station search radius in miles
    #[serde(default = "default_search_radius")]
    pub search_radius_miles: u32,
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// IANA zone used for hour matching and forecast days
    #[serde(default = "default_reference_timezone")]
    pub reference_timezone: String,
    /// Trailing window for crowd-sensor readings
    #[serde(default = "default_crowd_window")]
    pub crowd_window_hours: u32,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: usize,
}

/// Map clustering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold_degrees: f64,
    /// Clustering applies at or below this zoom level
    #[serde(default = "default_cluster_max_zoom")]
    pub cluster_max_zoom: u8,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

/// One row of the county table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountyEntry {
    pub name: String,
    pub state: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

// Default value functions
fn default_airnow_base_url() -> String {
    "https://www.airnowapi.org".to_string()
}

fn default_openaq_base_url() -> String {
    "https://api.openaq.org".to_string()
}

fn default_open_meteo_base_url() -> String {
    "https://air-quality-api.open-meteo.com".to_string()
}

fn default_pollen_page_base_url() -> String {
    "https://www.pollen.com/forecast/current/pollen".to_string()
}

fn default_timeout() -> u64 {
    12
}

fn default_max_retries() -> u32 {
    2
}

fn default_search_radius() -> u32 {
    25
}

fn default_reference_timezone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_crowd_window() -> u32 {
    3
}

fn default_forecast_days() -> usize {
    5
}

fn default_cluster_threshold() -> f64 {
    0.5
}

fn default_cluster_max_zoom() -> u8 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_port() -> u16 {
    8080
}

fn county(name: &str, latitude: f64, longitude: f64) -> CountyEntry {
    CountyEntry {
        name: name.to_string(),
        state: "CA".to_string(),
        country: "US".to_string(),
        latitude,
        longitude,
    }
}

fn default_counties() -> Vec<CountyEntry> {
    vec![
        county("Alameda", 37.6017, -121.7195),
        county("Contra Costa", 37.9161, -121.9018),
        county("Fresno", 36.7378, -119.7871),
        county("Kern", 35.3433, -118.7271),
        county("Los Angeles", 34.3209, -118.2247),
        county("Marin", 38.0834, -122.7633),
        county("Orange", 33.7175, -117.8311),
        county("Riverside", 33.7437, -115.9938),
        county("Sacramento", 38.4747, -121.3542),
        county("San Bernardino", 34.8414, -116.1785),
        county("San Diego", 33.0343, -116.7350),
        county("San Francisco", 37.7749, -122.4194),
        county("San Mateo", 37.4337, -122.4014),
        county("Santa Clara", 37.2330, -121.6954),
        county("Santa Cruz", 37.0454, -122.0308),
        county("Sonoma", 38.5780, -122.9888),
        county("Ventura", 34.4561, -119.0835),
    ]
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            airnow_api_key: None,
            airnow_base_url: default_airnow_base_url(),
            openaq_api_key: None,
            openaq_base_url: default_openaq_base_url(),
            open_meteo_base_url: default_open_meteo_base_url(),
            pollen_page_base_url: default_pollen_page_base_url(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            search_radius_miles: default_search_radius(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            reference_timezone: default_reference_timezone(),
            crowd_window_hours: default_crowd_window(),
            forecast_days: default_forecast_days(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            cluster_threshold_degrees: default_cluster_threshold(),
            cluster_max_zoom: default_cluster_max_zoom(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl ProvidersConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ReconciliationConfig {
    /// Parsed reference time zone
    pub fn timezone(&self) -> Result<Tz> {
        self.reference_timezone.parse::<Tz>().map_err(|_| {
            AircastError::config(format!(
                "Unknown reference time zone '{}'",
                self.reference_timezone
            ))
            .into()
        })
    }

    #[must_use]
    pub fn crowd_window(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::hours(i64::from(self.crowd_window_hours))
    }
}

impl AircastConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides with AIRCAST_ prefix
        builder = builder.add_source(
            Environment::with_prefix("AIRCAST")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AircastConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aircast").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.providers.airnow_api_key.is_none() {
            self.providers.airnow_api_key = std::env::var("AIRNOW_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        if self.providers.openaq_api_key.is_none() {
            self.providers.openaq_api_key = std::env::var("OPENAQ_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        if self.providers.timeout_seconds == 0 {
            self.providers.timeout_seconds = default_timeout();
        }
        if self.reconciliation.reference_timezone.is_empty() {
            self.reconciliation.reference_timezone = default_reference_timezone();
        }
        if self.reconciliation.crowd_window_hours == 0 {
            self.reconciliation.crowd_window_hours = default_crowd_window();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.counties.is_empty() {
            self.counties = default_counties();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_counties()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.providers.timeout_seconds == 0 || self.providers.timeout_seconds > 60 {
            return Err(AircastError::config(
                "Provider timeout must be between 1 and 60 seconds"
            ).into());
        }

        if self.providers.max_retries > 10 {
            return Err(AircastError::config(
                "Provider max retries cannot exceed 10"
            ).into());
        }

        if !(1..=5).contains(&self.reconciliation.forecast_days) {
            return Err(AircastError::config(
                "Forecast days must be between 1 and 5"
            ).into());
        }

        if !(self.map.cluster_threshold_degrees > 0.0) {
            return Err(AircastError::config(
                "Cluster threshold must be a positive number of degrees"
            ).into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AircastError::config(
                format!("Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_log_levels.join(", ")
                )
            ).into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AircastError::config(
                format!("Invalid log format '{}'. Must be one of: {}",
                    self.logging.format,
                    valid_log_formats.join(", ")
                )
            ).into());
        }

        let urls = [
            &self.providers.airnow_base_url,
            &self.providers.openaq_base_url,
            &self.providers.open_meteo_base_url,
            &self.providers.pollen_page_base_url,
        ];
        if let Some(url) = urls
            .iter()
            .find(|url| !url.starts_with("http://") && !url.starts_with("https://"))
        {
            return Err(AircastError::config(
                format!("Provider base URL '{url}' must be a valid HTTP or HTTPS URL")
            ).into());
        }

        self.reconciliation.timezone()?;

        Ok(())
    }

    fn validate_counties(&self) -> Result<()> {
        if self.counties.is_empty() {
            return Err(AircastError::config("County table cannot be empty").into());
        }
        if let Some(bad) = self
            .counties
            .iter()
            .find(|c| !(-90.0..=90.0).contains(&c.latitude) || !(-180.0..=180.0).contains(&c.longitude))
        {
            return Err(AircastError::config(
                format!("County '{}' has out of range coordinates", bad.name)
            ).into());
        }
        Ok(())
    }
}
