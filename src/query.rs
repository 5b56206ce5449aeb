use crate::location::{Interval, LocationConfig};
use crate::windows::DateWindow;
use serde_json::{json, Map, Value};
use std::fmt;

/// Substring tokens that mark a feature as magnitude-style. Anything
/// matching one of these aggregates to a scalar; features containing
/// "rank" return a rank-level distribution instead.
pub const MAGNITUDE_TOKENS: [&str; 4] = ["attendance", "spend", "impact", "viewership"];

/// Aggregation statistic requested for a magnitude feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Sum,
    Max,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Sum => "sum",
            Stat::Max => "max",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Picks the aggregation statistic for a feature name.
///
/// Attendance and spend features are additive, so they aggregate by
/// sum; impact and viewership describe a level, so they aggregate by
/// max. Anything else defaults to sum. Deterministic, substring-based
/// on purpose: the API's feature catalog is open-ended and new names
/// follow the same token conventions.
pub fn preferred_stat(feature: &str) -> Stat {
    if feature.contains("attendance") || feature.contains("spend") {
        Stat::Sum
    } else if feature.contains("impact") || feature.contains("viewership") {
        Stat::Max
    } else {
        Stat::Sum
    }
}

/// Returns true for rank-distribution features, which are requested as
/// a plain inclusion flag rather than a stats aggregation.
pub fn is_rank_feature(feature: &str) -> bool {
    feature.contains("rank")
}

/// Location-matching clause of a query. Exactly one form is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationClause {
    /// Match events within a radius of a point; radius is rendered as
    /// `"{radius}{unit}"`, e.g. `"10mi"`.
    Geo { lat: f64, lon: f64, radius: String },
    /// Match events within a known place
    Place { place_id: String },
}

/// Per-feature clause of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureClause {
    /// Rank-distribution feature, requested as an inclusion flag
    Rank { name: String },
    /// Magnitude feature with an aggregation stat and a minimum-rank
    /// event filter
    Magnitude {
        name: String,
        stat: Stat,
        min_phq_rank: u32,
    },
}

impl FeatureClause {
    pub fn name(&self) -> &str {
        match self {
            FeatureClause::Rank { name } => name,
            FeatureClause::Magnitude { name, .. } => name,
        }
    }
}

/// One fully-specified Features API query for a single date window.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    pub window: DateWindow,
    pub location: LocationClause,
    /// Weekly-interval clause; `None` means daily granularity
    pub week_start_day: Option<String>,
    pub features: Vec<FeatureClause>,
}

impl FeatureQuery {
    /// Serializes the query as the Features API request body.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "active".to_string(),
            json!({
                "gte": self.window.gte.format("%Y-%m-%d").to_string(),
                "lte": self.window.lte.format("%Y-%m-%d").to_string(),
            }),
        );

        if let Some(week_start_day) = &self.week_start_day {
            body.insert("interval".to_string(), json!("week"));
            body.insert("week_start_day".to_string(), json!(week_start_day));
        }

        match &self.location {
            LocationClause::Geo { lat, lon, radius } => {
                body.insert(
                    "location".to_string(),
                    json!({ "geo": { "lat": lat, "lon": lon, "radius": radius } }),
                );
            }
            LocationClause::Place { place_id } => {
                body.insert(
                    "location".to_string(),
                    json!({ "place_id": place_id }),
                );
            }
        }

        for clause in &self.features {
            match clause {
                FeatureClause::Rank { name } => {
                    body.insert(name.clone(), json!(true));
                }
                FeatureClause::Magnitude {
                    name,
                    stat,
                    min_phq_rank,
                } => {
                    body.insert(
                        name.clone(),
                        json!({
                            "stats": [stat.as_str()],
                            "phq_rank": { "gte": min_phq_rank },
                        }),
                    );
                }
            }
        }

        Value::Object(body)
    }
}

/// Errors raised while turning a location config into a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The requested feature list is empty or contains blank names
    InvalidFeatureList,
    /// The config has neither a complete geo-radius specifier nor a
    /// place identifier
    MissingLocation,
    /// The config has no start/end dates to partition
    MissingDateRange,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidFeatureList => {
                write!(f, "Missing or invalid features list provided")
            }
            ConfigError::MissingLocation => {
                write!(f, "Missing location information in config")
            }
            ConfigError::MissingDateRange => {
                write!(f, "Missing start/end dates in config")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Builds the query for one date window from a resolved config.
///
/// # Arguments
/// * `config` - Fully supplemented location config
/// * `features` - Names of the features to request
/// * `window` - Date window the query covers
///
/// # Errors
/// Returns `ConfigError::InvalidFeatureList` when `features` is empty
/// or contains blank names, and `ConfigError::MissingLocation` when the
/// config carries neither a complete geo-radius specifier nor a place
/// id. The geo form wins when both are available.
pub fn build_feature_query(
    config: &LocationConfig,
    features: &[String],
    window: DateWindow,
) -> Result<FeatureQuery, ConfigError> {
    if features.is_empty() || features.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::InvalidFeatureList);
    }

    let location = if config.has_geo_radius() {
        LocationClause::Geo {
            lat: config.lat.unwrap_or_default(),
            lon: config.lon.unwrap_or_default(),
            radius: format!(
                "{}{}",
                config.radius.unwrap_or_default(),
                config.radius_unit.as_deref().unwrap_or_default()
            ),
        }
    } else if let Some(place_id) = &config.place_id {
        LocationClause::Place {
            place_id: place_id.clone(),
        }
    } else {
        return Err(ConfigError::MissingLocation);
    };

    let week_start_day = match config.interval {
        Some(Interval::Week) => Some(
            config
                .week_start_day
                .clone()
                .unwrap_or_else(|| "monday".to_string()),
        ),
        _ => None,
    };

    let min_phq_rank = config.min_phq_rank.unwrap_or(0);
    let clauses = features
        .iter()
        .map(|name| {
            if is_rank_feature(name) {
                FeatureClause::Rank { name: name.clone() }
            } else {
                FeatureClause::Magnitude {
                    name: name.clone(),
                    stat: preferred_stat(name),
                    min_phq_rank,
                }
            }
        })
        .collect();

    Ok(FeatureQuery {
        window,
        location,
        week_start_day,
        features: clauses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    fn geo_config() -> LocationConfig {
        LocationConfig {
            lat: Some(40.75),
            lon: Some(-73.99),
            radius: Some(10.0),
            radius_unit: Some("mi".to_string()),
            min_phq_rank: Some(30),
            ..LocationConfig::default()
        }
    }

    #[test]
    fn test_preferred_stat_rules() {
        assert_eq!(preferred_stat("phq_attendance_sports"), Stat::Sum);
        assert_eq!(preferred_stat("phq_spend_conferences"), Stat::Sum);
        assert_eq!(preferred_stat("phq_impact_severe_weather"), Stat::Max);
        assert_eq!(preferred_stat("phq_viewership_sports"), Stat::Max);
        assert_eq!(preferred_stat("unknown_feature"), Stat::Sum);
    }

    #[test]
    fn test_rank_feature_classification() {
        assert!(is_rank_feature("phq_rank_public_holidays"));
        assert!(!is_rank_feature("phq_attendance_concerts"));
    }

    #[test]
    fn test_empty_feature_list_rejected() {
        let result = build_feature_query(&geo_config(), &[], window());
        assert_eq!(result.unwrap_err(), ConfigError::InvalidFeatureList);

        let blank = vec!["".to_string()];
        let result = build_feature_query(&geo_config(), &blank, window());
        assert_eq!(result.unwrap_err(), ConfigError::InvalidFeatureList);
    }

    #[test]
    fn test_missing_location_rejected() {
        let config = LocationConfig::new();
        let features = vec!["phq_attendance_sports".to_string()];
        let result = build_feature_query(&config, &features, window());
        assert_eq!(result.unwrap_err(), ConfigError::MissingLocation);
    }

    #[test]
    fn test_geo_clause_preferred_over_place() {
        let mut config = geo_config();
        config.place_id = Some("5128581".to_string());
        let features = vec!["phq_attendance_sports".to_string()];

        let query = build_feature_query(&config, &features, window()).unwrap();
        assert_eq!(
            query.location,
            LocationClause::Geo {
                lat: 40.75,
                lon: -73.99,
                radius: "10mi".to_string(),
            }
        );
    }

    #[test]
    fn test_place_clause_when_radius_incomplete() {
        let mut config = geo_config();
        config.radius_unit = None;
        config.place_id = Some("5128581".to_string());
        let features = vec!["phq_attendance_sports".to_string()];

        let query = build_feature_query(&config, &features, window()).unwrap();
        assert_eq!(
            query.location,
            LocationClause::Place {
                place_id: "5128581".to_string(),
            }
        );
    }

    #[test]
    fn test_magnitude_and_rank_clauses() {
        let features = vec![
            "phq_attendance_sports".to_string(),
            "phq_rank_public_holidays".to_string(),
        ];
        let query = build_feature_query(&geo_config(), &features, window()).unwrap();

        assert_eq!(
            query.features[0],
            FeatureClause::Magnitude {
                name: "phq_attendance_sports".to_string(),
                stat: Stat::Sum,
                min_phq_rank: 30,
            }
        );
        assert_eq!(
            query.features[1],
            FeatureClause::Rank {
                name: "phq_rank_public_holidays".to_string(),
            }
        );
    }

    #[test]
    fn test_weekly_interval_clause() {
        let mut config = geo_config();
        config.interval = Some(Interval::Week);
        config.week_start_day = Some("sunday".to_string());
        let features = vec!["phq_attendance_sports".to_string()];

        let query = build_feature_query(&config, &features, window()).unwrap();
        assert_eq!(query.week_start_day.as_deref(), Some("sunday"));

        let body = query.to_body();
        assert_eq!(body["interval"], "week");
        assert_eq!(body["week_start_day"], "sunday");
    }

    #[test]
    fn test_daily_interval_omitted_from_body() {
        let features = vec!["phq_attendance_sports".to_string()];
        let query = build_feature_query(&geo_config(), &features, window()).unwrap();
        let body = query.to_body();

        assert!(body.get("interval").is_none());
        assert!(body.get("week_start_day").is_none());
    }

    #[test]
    fn test_body_shape() {
        let features = vec![
            "phq_attendance_sports".to_string(),
            "phq_rank_public_holidays".to_string(),
        ];
        let query = build_feature_query(&geo_config(), &features, window()).unwrap();
        let body = query.to_body();

        assert_eq!(body["active"]["gte"], "2024-01-01");
        assert_eq!(body["active"]["lte"], "2024-03-31");
        assert_eq!(body["location"]["geo"]["radius"], "10mi");
        assert_eq!(body["phq_attendance_sports"]["stats"][0], "sum");
        assert_eq!(body["phq_attendance_sports"]["phq_rank"]["gte"], 30);
        assert_eq!(body["phq_rank_public_holidays"], true);
    }
}
