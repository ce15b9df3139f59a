//! City geocoder - enrich city records with coordinates
//!
//! This library provides the record store, the geocoding client and the
//! resumable batch processor behind the `city-geocoder` binary.

pub mod batch;
pub mod config;
pub mod error;
pub mod geocode;
pub mod logging;
pub mod models;
pub mod store;

// Re-export core types for public API
pub use batch::{BatchPlan, BatchProcessor, ResumeDecision, RunState};
pub use config::GeocoderConfig;
pub use error::GeocoderError;
pub use geocode::{GeocodeOutcome, Geocoder, NominatimClient};
pub use models::{Coordinates, LocationRecord, RunSummary};
pub use store::{JsonFileStore, RecordStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, GeocoderError>;
