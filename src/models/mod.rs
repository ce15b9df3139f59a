//! Data models for the city geocoder
//!
//! - Location: city records and their coordinates
//! - Summary: aggregate counts over a run

pub mod location;
pub mod summary;

pub use location::{Coordinates, LocationRecord};
pub use summary::RunSummary;
