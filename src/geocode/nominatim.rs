//! Nominatim search client
//!
//! Issues `GET /search` requests with a fixed country filter and walks the
//! query variants for a record until one of them returns a candidate.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::{GeocodeOutcome, Geocoder, query_variants};
use crate::config::GeocodingConfig;
use crate::models::Coordinates;
use crate::{GeocoderError, Result};

/// One search candidate as returned by the service
#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    pub lat: Degrees,
    pub lon: Degrees,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Nominatim sends decimal strings; some mirrors send plain numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Degrees {
    Text(String),
    Number(f64),
}

impl Degrees {
    /// Parsed value; NaN and infinities are rejected like any other garbage
    fn value(&self) -> Result<f64> {
        let value = match self {
            Degrees::Number(n) => *n,
            Degrees::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| GeocoderError::api(format!("invalid coordinate '{s}': {e}")))?,
        };

        if !value.is_finite() {
            return Err(GeocoderError::api(format!(
                "non-finite coordinate: {value}"
            )));
        }
        Ok(value)
    }
}

impl Place {
    pub fn coordinates(&self) -> Result<Coordinates> {
        Ok(Coordinates::new(self.lat.value()?, self.lon.value()?))
    }
}

pub struct NominatimClient {
    client: Client,
    config: GeocodingConfig,
}

impl NominatimClient {
    pub fn new(config: GeocodingConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search?q={}&format=json&limit={}&countrycodes={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            self.config.limit,
            self.config.country_code
        )
    }

    /// Run one free-text search and return the raw candidates
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<Place>> {
        let url = self.search_url(query);
        debug!("Nominatim request URL: {}", url);
        let start_time = Instant::now();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GeocoderError::api(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocoderError::api(format!(
                "search failed with status: {} - {}",
                status,
                status.canonical_reason().unwrap_or("Unknown error")
            )));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| GeocoderError::api(format!("invalid search response: {e}")))?;

        debug!(
            "{} candidates in {:.3}s",
            places.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(places)
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn lookup(&self, api_name: &str, province: &str) -> GeocodeOutcome {
        info!("Searching with API name: '{}'", api_name);

        let variants = query_variants(api_name, province, &self.config.country_name);
        for (idx, query) in variants.iter().enumerate() {
            info!("Strategy {}: '{}'", idx + 1, query);

            let first = self
                .search(query)
                .await
                .and_then(|places| match places.into_iter().next() {
                    Some(place) => place.coordinates().map(|c| Some((place, c))),
                    None => Ok(None),
                });

            match first {
                Ok(Some((place, coordinates))) => {
                    let display_name = place.display_name.unwrap_or_else(|| "N/A".to_string());
                    let kind = place.kind.unwrap_or_else(|| "N/A".to_string());
                    info!("Found: {} (type: {})", display_name, kind);

                    self.pause(self.config.success_delay()).await;
                    return GeocodeOutcome::Found {
                        coordinates,
                        display_name,
                        kind,
                    };
                }
                Ok(None) => {
                    info!("No results");
                    self.pause(self.config.no_result_delay()).await;
                }
                Err(e) => {
                    warn!("Error: {}", e);
                    self.pause(self.config.error_delay()).await;
                }
            }
        }

        GeocodeOutcome::NotFound
    }
}
