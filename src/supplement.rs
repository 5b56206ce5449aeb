use crate::demand::DemandTable;
use crate::location::{Industry, Interval, LocationConfig};
use async_trait::async_trait;
use chrono::{Duration, Months, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;

/// Fallback window when no demand data constrains the date range:
/// two years back from "today" and 90 days forward.
const DEFAULT_LOOKBACK_MONTHS: u32 = 24;
const DEFAULT_LOOKAHEAD_DAYS: i64 = 90;

/// Default minimum PHQ rank per industry.
///
/// Carried as configuration data rather than hard-coded at the use
/// site; callers with their own thresholds can build their own policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinRankPolicy {
    pub accommodation: u32,
    pub parking: u32,
    pub restaurants: u32,
    pub retail: u32,
    pub other: u32,
}

impl Default for MinRankPolicy {
    fn default() -> Self {
        MinRankPolicy {
            accommodation: 35,
            parking: 35,
            restaurants: 30,
            retail: 50,
            other: 30,
        }
    }
}

impl MinRankPolicy {
    /// Returns the default minimum rank for an industry.
    pub fn min_rank(&self, industry: Industry) -> u32 {
        match industry {
            Industry::Accommodation => self.accommodation,
            Industry::Parking => self.parking,
            Industry::Restaurants => self.restaurants,
            Industry::Retail => self.retail,
            Industry::Other => self.other,
        }
    }
}

/// A resolved geographic search radius.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestedRadius {
    pub radius: f64,
    pub radius_unit: String,
}

/// Failure of the suggested-radius lookup. Non-fatal: the location
/// proceeds without a radius and geo-radius queries for it will fail
/// at build time instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusError(pub String);

impl fmt::Display for RadiusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Radius resolution failed: {}", self.0)
    }
}

impl std::error::Error for RadiusError {}

/// External radius-suggestion collaborator.
///
/// Implemented by the HTTP client and by fixed test doubles.
#[async_trait]
pub trait RadiusResolver {
    /// Suggests a search radius for the given coordinates. The industry
    /// filter is omitted when the caller passes `None`.
    async fn suggested_radius(
        &self,
        lat: f64,
        lon: f64,
        industry: Option<Industry>,
    ) -> Result<SuggestedRadius, RadiusError>;
}

/// A resolver that always returns the same radius. Useful in tests and
/// for callers that manage radii themselves.
#[derive(Debug, Clone)]
pub struct FixedRadiusResolver {
    pub radius: f64,
    pub radius_unit: String,
}

#[async_trait]
impl RadiusResolver for FixedRadiusResolver {
    async fn suggested_radius(
        &self,
        _lat: f64,
        _lon: f64,
        _industry: Option<Industry>,
    ) -> Result<SuggestedRadius, RadiusError> {
        Ok(SuggestedRadius {
            radius: self.radius,
            radius_unit: self.radius_unit.clone(),
        })
    }
}

/// Fills in missing per-location configuration.
///
/// "Today" is injected at construction so date defaulting is
/// deterministic; the component never reads ambient process time.
/// Caller-supplied values are never overwritten, with two deliberate
/// exceptions: industry normalization is always re-applied, and
/// start/end dates observed in a demand table are authoritative over
/// any caller-supplied range.
#[derive(Debug, Clone)]
pub struct ConfigSupplementer {
    today: NaiveDate,
    min_rank_policy: MinRankPolicy,
}

impl ConfigSupplementer {
    pub fn new(today: NaiveDate) -> Self {
        ConfigSupplementer {
            today,
            min_rank_policy: MinRankPolicy::default(),
        }
    }

    /// Replaces the default industry -> minimum-rank table.
    pub fn with_min_rank_policy(mut self, policy: MinRankPolicy) -> Self {
        self.min_rank_policy = policy;
        self
    }

    /// Supplements every location config in the map.
    ///
    /// Locations are processed independently; a radius-resolution
    /// failure is logged and that location continues without a radius.
    ///
    /// # Arguments
    /// * `configs` - Partial per-location configs, keyed by location
    /// * `demand` - Optional historical demand table; when present, its
    ///   per-location date bounds override any caller-supplied range
    /// * `resolver` - Radius-suggestion collaborator
    pub async fn supplement<R: RadiusResolver>(
        &self,
        mut configs: BTreeMap<String, LocationConfig>,
        demand: Option<&DemandTable>,
        resolver: &R,
    ) -> BTreeMap<String, LocationConfig> {
        let demand_bounds = demand.map(|table| table.date_bounds());

        for (location, config) in configs.iter_mut() {
            // Industry normalization is always re-applied so a config
            // can be supplemented more than once.
            let industry = config.industry.unwrap_or(Industry::Other);
            config.industry = Some(industry);

            if config.min_phq_rank.is_none() {
                config.min_phq_rank = Some(self.min_rank_policy.min_rank(industry));
            }

            self.fill_dates(location, config, demand_bounds.as_ref());

            if config.radius.is_none() || config.radius_unit.is_none() {
                self.resolve_radius(location, config, resolver).await;
            }

            // Interval defaults only apply when the date range is not
            // driven by demand data.
            if demand.is_none() {
                match config.interval.get_or_insert(Interval::Day) {
                    Interval::Day => config.week_start_day = None,
                    Interval::Week => {
                        if config.week_start_day.is_none() {
                            config.week_start_day = Some("monday".to_string());
                        }
                    }
                }
            }
        }

        configs
    }

    fn fill_dates(
        &self,
        location: &str,
        config: &mut LocationConfig,
        demand_bounds: Option<&std::collections::HashMap<String, (NaiveDate, NaiveDate)>>,
    ) {
        if let Some((start, end)) = demand_bounds.and_then(|bounds| bounds.get(location)) {
            // Observed demand dates win over any caller-supplied range.
            config.start = Some(*start);
            config.end = Some(*end);
            return;
        }

        if config.start.is_none() {
            config.start = Some(
                self.today
                    .checked_sub_months(Months::new(DEFAULT_LOOKBACK_MONTHS))
                    .unwrap_or(self.today),
            );
        }
        if config.end.is_none() {
            config.end = Some(self.today + Duration::days(DEFAULT_LOOKAHEAD_DAYS));
        }
    }

    async fn resolve_radius<R: RadiusResolver>(
        &self,
        location: &str,
        config: &mut LocationConfig,
        resolver: &R,
    ) {
        let (lat, lon) = match (config.lat, config.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                log::warn!(
                    "Skipping radius resolution for {}: no coordinates",
                    location
                );
                return;
            }
        };

        let industry_filter = config
            .industry
            .filter(|industry| *industry != Industry::Other);

        match resolver.suggested_radius(lat, lon, industry_filter).await {
            Ok(suggested) => {
                config.radius = Some(suggested.radius);
                config.radius_unit = Some(suggested.radius_unit);
            }
            Err(error) => {
                log::warn!(
                    "Failed to get suggested radius for {} ({},{}): {}",
                    location,
                    lat,
                    lon,
                    error
                );
            }
        }
    }
}
