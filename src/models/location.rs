//! Location record model and its on-disk form

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic coordinates in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lat={}, lon={}", self.lat, self.lon)
    }
}

/// One city entry, optionally geocoded.
///
/// Coordinates are all-or-nothing: a record either carries both latitude and
/// longitude or neither.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct LocationRecord {
    /// Canonical name used as the geocoding query key
    pub api_name: String,
    /// Human-facing name
    pub display_name: String,
    /// Administrative region used to disambiguate queries
    pub province: String,
    pub coordinates: Option<Coordinates>,
}

impl LocationRecord {
    /// Create a record without coordinates
    pub fn new(
        api_name: impl Into<String>,
        display_name: impl Into<String>,
        province: impl Into<String>,
    ) -> Self {
        Self {
            api_name: api_name.into(),
            display_name: display_name.into(),
            province: province.into(),
            coordinates: None,
        }
    }

    /// Same record with the given lookup result
    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.coordinates = coordinates;
        self
    }

    #[must_use]
    pub fn is_geocoded(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Wire form: `api`, `display`, `province`, `lat`, `lon` in that order.
///
/// `lat`/`lon` may be missing on input and are always written, `null` when absent.
#[derive(Serialize, Deserialize)]
struct RawRecord {
    api: String,
    display: String,
    province: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

impl TryFrom<RawRecord> for LocationRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let coordinates = match (raw.lat, raw.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            (None, None) => None,
            _ => {
                return Err(format!(
                    "record '{}' has only one of lat/lon set",
                    raw.api
                ));
            }
        };

        Ok(Self {
            api_name: raw.api,
            display_name: raw.display,
            province: raw.province,
            coordinates,
        })
    }
}

impl From<LocationRecord> for RawRecord {
    fn from(record: LocationRecord) -> Self {
        Self {
            api: record.api_name,
            display: record.display_name,
            province: record.province,
            lat: record.coordinates.map(|c| c.lat),
            lon: record.coordinates.map(|c| c.lon),
        }
    }
}
