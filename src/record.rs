use crate::query::{preferred_stat, is_rank_feature, MAGNITUDE_TOKENS};
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

/// One raw API-returned feature object: feature name -> stats or
/// rank-levels bundle, plus a `date` value.
pub type RawFeature = Map<String, Value>;

/// One flattened output row: a date plus one column per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub date: NaiveDate,
    values: BTreeMap<String, Value>,
}

impl FeatureRecord {
    pub fn new(date: NaiveDate) -> Self {
        FeatureRecord {
            date,
            values: BTreeMap::new(),
        }
    }

    /// Returns the column value for a feature, if the API returned one.
    pub fn get(&self, feature: &str) -> Option<&Value> {
        self.values.get(feature)
    }

    pub fn insert(&mut self, feature: impl Into<String>, value: Value) {
        self.values.insert(feature.into(), value);
    }

    /// Date column in `YYYY-MM-DD` form.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Errors raised while flattening a raw API feature object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlattenError {
    /// The object carries no date field
    MissingDate,
    /// The date field is not a date or RFC 3339 timestamp
    InvalidDate(String),
}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenError::MissingDate => write!(f, "Feature object has no date field"),
            FlattenError::InvalidDate(raw) => write!(f, "Unparseable feature date: {}", raw),
        }
    }
}

impl std::error::Error for FlattenError {}

fn parse_feature_date(value: &Value) -> Result<NaiveDate, FlattenError> {
    let raw = value
        .as_str()
        .ok_or_else(|| FlattenError::InvalidDate(value.to_string()))?;

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.date_naive())
        })
        .ok_or_else(|| FlattenError::InvalidDate(raw.to_string()))
}

fn is_magnitude_feature(name: &str) -> bool {
    MAGNITUDE_TOKENS.iter().any(|token| name.contains(token))
}

/// Count-weighted rank score: `sum(level * count)` over a rank-levels
/// bundle. `{"1": 3, "2": 5}` scores 13.
fn rank_score(rank_levels: &Map<String, Value>) -> i64 {
    rank_levels
        .iter()
        .filter_map(|(level, count)| {
            let level: i64 = level.parse().ok()?;
            let count = count.as_i64()?;
            Some(level * count)
        })
        .sum()
}

/// Flattens one raw API feature object into a `FeatureRecord`.
///
/// Magnitude-style keys (attendance/spend/impact/viewership) take the
/// value at their preferred statistic from the `stats` bundle; when the
/// statistic is missing the column is absent rather than zero. Keys
/// containing "rank" take the count-weighted rank score of their
/// `rank_levels` bundle. Any other key is passed through unmodified.
///
/// # Errors
/// Returns a `FlattenError` when the object has no parseable date.
pub fn flatten_feature(raw: &RawFeature) -> Result<FeatureRecord, FlattenError> {
    let date = parse_feature_date(raw.get("date").ok_or(FlattenError::MissingDate)?)?;
    let mut record = FeatureRecord::new(date);

    for (key, value) in raw {
        if key == "date" {
            continue;
        }
        if is_magnitude_feature(key) {
            let stat = preferred_stat(key);
            if let Some(aggregate) = value
                .get("stats")
                .and_then(|stats| stats.get(stat.as_str()))
            {
                record.insert(key, aggregate.clone());
            }
        } else if is_rank_feature(key) {
            let score = value
                .get("rank_levels")
                .and_then(Value::as_object)
                .map(rank_score)
                .unwrap_or(0);
            record.insert(key, Value::from(score));
        } else {
            record.insert(key, value.clone());
        }
    }

    Ok(record)
}

/// Ordered feature records for one location.
///
/// Rows are kept in window order, then API return order within a
/// window. Datasets for several locations can be concatenated, and the
/// table exports as CSV with a `date` column plus one column per
/// requested feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDataset {
    features: Vec<String>,
    records: Vec<FeatureRecord>,
}

impl FeatureDataset {
    /// Creates an empty dataset with the given feature columns.
    pub fn new(features: Vec<String>) -> Self {
        FeatureDataset {
            features,
            records: Vec::new(),
        }
    }

    /// Column names, excluding the leading `date` column.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: FeatureRecord) {
        self.records.push(record);
    }

    /// Appends another dataset's rows, keeping this dataset's columns
    /// and adding any new ones from the other.
    pub fn concat(&mut self, other: FeatureDataset) {
        for feature in other.features {
            if !self.features.contains(&feature) {
                self.features.push(feature);
            }
        }
        self.records.extend(other.records);
    }

    /// Writes the dataset as CSV: `date` plus one column per feature,
    /// empty cells where the API returned no value.
    ///
    /// # Errors
    /// Returns a `csv::Error` if writing fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["date".to_string()];
        header.extend(self.features.iter().cloned());
        csv_writer.write_record(&header)?;

        for record in &self.records {
            let mut row = vec![record.date_string()];
            for feature in &self.features {
                row.push(match record.get(feature) {
                    Some(Value::String(s)) => s.clone(),
                    Some(value) => value.to_string(),
                    None => String::new(),
                });
            }
            csv_writer.write_record(&row)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}
