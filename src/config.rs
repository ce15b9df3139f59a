//! Configuration management for the city geocoder
//!
//! Handles loading configuration from an optional TOML file and provides
//! validation for all configuration settings.

use crate::GeocoderError;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "geocoder.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Geocoding service configuration
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    /// Batch run configuration
    #[serde(default)]
    pub batch: BatchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Geocoding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of the Nominatim-compatible service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Client identifier sent as the `User-Agent` header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Maximum candidates requested per query
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Country filter passed as `countrycodes`
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Country name appended to query variants
    #[serde(default = "default_country_name")]
    pub country_name: String,
    /// Pause after a variant returned no candidates (ms)
    #[serde(default = "default_no_result_delay")]
    pub no_result_delay_ms: u64,
    /// Pause after a failed variant (ms)
    #[serde(default = "default_error_delay")]
    pub error_delay_ms: u64,
    /// Courtesy pause after a successful lookup (ms)
    #[serde(default = "default_success_delay")]
    pub success_delay_ms: u64,
}

/// Batch run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Input file with the city list
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    /// Output file, also used as checkpoint
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Number of processed records between checkpoint saves
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
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

// Default value functions
fn default_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "Indonesia-Cities-Geocoder/1.0".to_string()
}

fn default_timeout() -> u32 {
    10
}

fn default_limit() -> u32 {
    3
}

fn default_country_code() -> String {
    "id".to_string()
}

fn default_country_name() -> String {
    "Indonesia".to_string()
}

fn default_no_result_delay() -> u64 {
    1500
}

fn default_error_delay() -> u64 {
    2000
}

fn default_success_delay() -> u64 {
    1500
}

fn default_input_path() -> PathBuf {
    PathBuf::from("cities.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("cities_with_coordinates.json")
}

fn default_checkpoint_interval() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            limit: default_limit(),
            country_code: default_country_code(),
            country_name: default_country_name(),
            no_result_delay_ms: default_no_result_delay(),
            error_delay_ms: default_error_delay(),
            success_delay_ms: default_success_delay(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_path: default_output_path(),
            checkpoint_interval: default_checkpoint_interval(),
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

impl GeocodingConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    #[must_use]
    pub fn no_result_delay(&self) -> Duration {
        Duration::from_millis(self.no_result_delay_ms)
    }

    #[must_use]
    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }

    #[must_use]
    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }
}

impl GeocoderConfig {
    /// Load configuration from specified path
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(GeocoderError::config(format!(
                        "config file not found: {}",
                        path.display()
                    ))
                    .into());
                }
                builder = builder.add_source(
                    File::from(path)
                        .required(true)
                        .format(config::FileFormat::Toml),
                );
            }
            None => {
                builder = builder.add_source(
                    File::with_name(DEFAULT_CONFIG_FILE)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: GeocoderConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_base_url();
        }
        if self.geocoding.user_agent.is_empty() {
            self.geocoding.user_agent = default_user_agent();
        }
        if self.geocoding.timeout_seconds == 0 {
            self.geocoding.timeout_seconds = default_timeout();
        }
        if self.geocoding.country_name.is_empty() {
            self.geocoding.country_name = default_country_name();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.geocoding.timeout_seconds > 300 {
            return Err(
                GeocoderError::config("Geocoding timeout cannot exceed 300 seconds").into(),
            );
        }

        if !(1..=50).contains(&self.geocoding.limit) {
            return Err(
                GeocoderError::config("Geocoding result limit must be between 1 and 50").into(),
            );
        }

        if self.batch.checkpoint_interval == 0 {
            return Err(GeocoderError::config("Checkpoint interval must be at least 1").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(GeocoderError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(GeocoderError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.geocoding.base_url.starts_with("http://")
            && !self.geocoding.base_url.starts_with("https://")
        {
            return Err(GeocoderError::config(
                "Geocoding base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }
}
