//! Forward geocoding of city records
//!
//! A lookup tries several phrasings of the same place in order and accepts the
//! first candidate of the first phrasing that yields any result.

pub mod nominatim;

use async_trait::async_trait;

use crate::models::Coordinates;

pub use nominatim::{NominatimClient, Place};

/// Administrative prefix dropped by the prefix-stripping variant
const REGENCY_PREFIX: &str = "Kabupaten";

/// Result of looking up one record
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Found {
        coordinates: Coordinates,
        display_name: String,
        kind: String,
    },
    /// Every variant came back empty or failed
    NotFound,
}

impl GeocodeOutcome {
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Found { coordinates, .. } => Some(*coordinates),
            Self::NotFound => None,
        }
    }
}

/// A geocoding provider resolving a city name within a province
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Never fails: transport problems degrade to [`GeocodeOutcome::NotFound`]
    async fn lookup(&self, api_name: &str, province: &str) -> GeocodeOutcome;
}

/// Query strings tried for one record, most specific first
#[must_use]
pub fn query_variants(api_name: &str, province: &str, country: &str) -> Vec<String> {
    let mut variants = vec![
        format!("{api_name}, {province}"),
        format!("{api_name}, {country}"),
        api_name.to_string(),
    ];

    if api_name.contains(REGENCY_PREFIX) {
        variants.push(api_name.replace(&format!("{REGENCY_PREFIX} "), ""));
    }

    variants.push(format!("{api_name}, {province}, {country}"));
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_city_variants() {
        assert_eq!(
            query_variants("Kota Bandung", "Jawa Barat", "Indonesia"),
            vec![
                "Kota Bandung, Jawa Barat",
                "Kota Bandung, Indonesia",
                "Kota Bandung",
                "Kota Bandung, Jawa Barat, Indonesia",
            ]
        );
    }

    #[test]
    fn test_regency_variants() {
        let variants = query_variants("Kabupaten Bogor", "Jawa Barat", "Indonesia");
        assert_eq!(variants.len(), 5);
        assert_eq!(variants[3], "Bogor");
        assert_eq!(variants[4], "Kabupaten Bogor, Jawa Barat, Indonesia");
    }

    #[rstest]
    #[case("Kota Administrasi Jakarta Pusat")]
    #[case("Kota Bandung")]
    #[case("Regency of Bogor")]
    fn test_only_regency_prefix_stripped(#[case] api_name: &str) {
        assert_eq!(query_variants(api_name, "P", "Indonesia").len(), 4);
    }

    #[test]
    fn test_outcome_coordinates() {
        let found = GeocodeOutcome::Found {
            coordinates: Coordinates::new(-6.9, 107.6),
            display_name: "Bandung, Jawa Barat, Indonesia".to_string(),
            kind: "city".to_string(),
        };
        assert_eq!(found.coordinates(), Some(Coordinates::new(-6.9, 107.6)));
        assert_eq!(GeocodeOutcome::NotFound.coordinates(), None);
    }
}
