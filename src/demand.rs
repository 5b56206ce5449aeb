use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;

/// One observed demand value for a location on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    /// Location key the observation belongs to
    pub location: String,
    /// Observation date
    pub date: NaiveDate,
    /// Observed demand value
    pub value: f64,
}

/// Historical demand observations across locations.
///
/// Used by `ConfigSupplementer` to derive each location's query date
/// range, and serializable as the Beam demand-upload body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemandTable {
    records: Vec<DemandRecord>,
}

impl DemandTable {
    /// Creates an empty demand table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from pre-built records.
    pub fn from_records(records: Vec<DemandRecord>) -> Self {
        DemandTable { records }
    }

    /// Reads a demand table from CSV with `location,date,value` columns.
    ///
    /// # Errors
    /// Returns a `csv::Error` if the input cannot be parsed or a row is
    /// missing a required column.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for row in csv_reader.deserialize() {
            let record: DemandRecord = row?;
            records.push(record);
        }
        Ok(DemandTable { records })
    }

    /// Returns all records in insertion order.
    pub fn records(&self) -> &[DemandRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Appends one observation.
    pub fn push(&mut self, location: impl Into<String>, date: NaiveDate, value: f64) {
        self.records.push(DemandRecord {
            location: location.into(),
            date,
            value,
        });
    }

    /// Returns the min/max observed date per location.
    ///
    /// Locations with no rows are absent from the map.
    pub fn date_bounds(&self) -> HashMap<String, (NaiveDate, NaiveDate)> {
        let mut bounds: HashMap<String, (NaiveDate, NaiveDate)> = HashMap::new();
        for record in &self.records {
            bounds
                .entry(record.location.clone())
                .and_modify(|(min, max)| {
                    if record.date < *min {
                        *min = record.date;
                    }
                    if record.date > *max {
                        *max = record.date;
                    }
                })
                .or_insert((record.date, record.date));
        }
        bounds
    }

    /// Serializes the rows for one location as the Beam demand-upload
    /// body: a JSON array of `{date, demand}` objects.
    pub fn upload_body(&self, location: &str) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .records
            .iter()
            .filter(|record| record.location == location)
            .map(|record| {
                serde_json::json!({
                    "date": record.date.format("%Y-%m-%d").to_string(),
                    "demand": record.value,
                })
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_bounds_per_location() {
        let mut table = DemandTable::new();
        table.push("store_a", date(2023, 5, 1), 12.0);
        table.push("store_a", date(2023, 11, 20), 18.0);
        table.push("store_a", date(2023, 8, 2), 15.0);
        table.push("store_b", date(2024, 1, 1), 3.0);

        let bounds = table.date_bounds();
        assert_eq!(
            bounds.get("store_a"),
            Some(&(date(2023, 5, 1), date(2023, 11, 20)))
        );
        assert_eq!(
            bounds.get("store_b"),
            Some(&(date(2024, 1, 1), date(2024, 1, 1)))
        );
        assert_eq!(bounds.get("store_c"), None);
    }

    #[test]
    fn test_from_csv() {
        let input = "location,date,value\nstore_a,2023-05-01,12.5\nstore_a,2023-05-02,13.0\n";
        let table = DemandTable::from_csv(input.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].location, "store_a");
        assert_eq!(table.records()[0].date, date(2023, 5, 1));
        assert_eq!(table.records()[1].value, 13.0);
    }

    #[test]
    fn test_from_csv_rejects_bad_date() {
        let input = "location,date,value\nstore_a,not-a-date,12.5\n";
        let result = DemandTable::from_csv(input.as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_upload_body_filters_by_location() {
        let mut table = DemandTable::new();
        table.push("store_a", date(2023, 5, 1), 12.0);
        table.push("store_b", date(2023, 5, 1), 7.0);

        let body = table.upload_body("store_a");
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["date"], "2023-05-01");
        assert_eq!(rows[0]["demand"], 12.0);
    }
}
