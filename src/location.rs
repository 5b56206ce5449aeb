use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Industry category for a monitored location.
///
/// Used to pick the default minimum PHQ rank and to filter the
/// suggested-radius lookup. Parsed case-insensitively; the legacy
/// `food_and_beverage` label is a synonym for `restaurants`, and any
/// unrecognized label maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Accommodation,
    Parking,
    Restaurants,
    Retail,
    Other,
}

impl Industry {
    /// Parses an industry label.
    ///
    /// # Examples
    /// - "Accommodation" -> `Industry::Accommodation`
    /// - "Food_and_Beverage" -> `Industry::Restaurants`
    /// - "car wash" -> `Industry::Other`
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "accommodation" => Industry::Accommodation,
            "parking" => Industry::Parking,
            "restaurants" | "food_and_beverage" => Industry::Restaurants,
            "retail" => Industry::Retail,
            _ => Industry::Other,
        }
    }

    /// Returns the lower-case wire form of the industry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Accommodation => "accommodation",
            Industry::Parking => "parking",
            Industry::Restaurants => "restaurants",
            Industry::Retail => "retail",
            Industry::Other => "other",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Query granularity for feature results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// Daily granularity (the API default)
    Day,
    /// Weekly granularity; requires a week start day
    Week,
}

/// Configuration for one monitored location.
///
/// Callers supply a partial config; `ConfigSupplementer` fills in the
/// rest. Every optional field uses `Option` so "caller did not supply
/// X" stays distinct from any supplied value.
///
/// A location is addressable either by coordinates plus a search radius
/// or by a place identifier; at least one complete form must be present
/// by the time a query is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Latitude of the location
    pub lat: Option<f64>,
    /// Longitude of the location
    pub lon: Option<f64>,
    /// Place identifier, an alternative to lat/lon + radius
    pub place_id: Option<String>,
    /// Industry category; defaults to `Other` during supplementation
    pub industry: Option<Industry>,
    /// Minimum PHQ rank for magnitude aggregation (0-100)
    pub min_phq_rank: Option<u32>,
    /// First date of the query range (inclusive)
    pub start: Option<NaiveDate>,
    /// Last date of the query range (inclusive)
    pub end: Option<NaiveDate>,
    /// Geographic search radius
    pub radius: Option<f64>,
    /// Unit of the search radius (e.g. "mi", "km")
    pub radius_unit: Option<String>,
    /// Query granularity; defaults to daily
    pub interval: Option<Interval>,
    /// Lower-case weekday name, meaningful only for weekly interval
    pub week_start_day: Option<String>,
}

impl LocationConfig {
    /// Creates an empty config to be filled by the caller and the
    /// supplementer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the config carries a complete geo-radius
    /// specifier (lat, lon, radius, and radius unit all present).
    pub fn has_geo_radius(&self) -> bool {
        self.lat.is_some()
            && self.lon.is_some()
            && self.radius.is_some()
            && self.radius_unit.is_some()
    }

    /// Returns true when the config carries coordinates, regardless of
    /// whether a radius has been resolved yet.
    pub fn has_coordinates(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_industry_parse_case_insensitive() {
        assert_eq!(Industry::parse("Accommodation"), Industry::Accommodation);
        assert_eq!(Industry::parse("PARKING"), Industry::Parking);
        assert_eq!(Industry::parse("retail"), Industry::Retail);
    }

    #[test]
    fn test_industry_food_and_beverage_synonym() {
        assert_eq!(Industry::parse("Food_and_Beverage"), Industry::Restaurants);
        assert_eq!(Industry::parse("food_and_beverage"), Industry::Restaurants);
    }

    #[test]
    fn test_industry_normalization_idempotent() {
        let once = Industry::parse("Food_and_Beverage");
        let twice = Industry::parse(once.as_str());
        assert_eq!(once, twice);
        assert_eq!(twice, Industry::Restaurants);
    }

    #[test]
    fn test_industry_unknown_maps_to_other() {
        assert_eq!(Industry::parse("car wash"), Industry::Other);
        assert_eq!(Industry::parse(""), Industry::Other);
    }

    #[test]
    fn test_has_geo_radius_requires_all_four_fields() {
        let mut config = LocationConfig::new();
        config.lat = Some(40.75);
        config.lon = Some(-73.99);
        assert!(!config.has_geo_radius());
        assert!(config.has_coordinates());

        config.radius = Some(2.0);
        assert!(!config.has_geo_radius());

        config.radius_unit = Some("mi".to_string());
        assert!(config.has_geo_radius());
    }
}
