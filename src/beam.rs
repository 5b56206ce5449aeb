use crate::client::ClientError;
use crate::demand::DemandTable;
use crate::location::LocationConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

const DEFAULT_BEAM_URL: &str = "https://api.predicthq.com/v1/beam";

/// Errors from the Beam API wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeamError {
    /// Network-level failure
    Network(String),
    /// The API returned an error response
    Api(String),
    /// The response body could not be parsed
    Parse(String),
    /// The location config lacks a field the request body needs
    IncompleteConfig(String),
}

impl fmt::Display for BeamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeamError::Network(msg) => write!(f, "Network error: {}", msg),
            BeamError::Api(msg) => write!(f, "API error: {}", msg),
            BeamError::Parse(msg) => write!(f, "Parse error: {}", msg),
            BeamError::IncompleteConfig(field) => {
                write!(f, "Location config is missing {}", field)
            }
        }
    }
}

impl std::error::Error for BeamError {}

/// Readiness and feature-importance processing state of a group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupStatus {
    pub readiness_status: Option<String>,
    pub feature_importance_processing_completed: Option<bool>,
}

/// Name and surviving analysis ids of a group, with analyses the
/// server excluded during processing filtered out.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDetails {
    pub name: String,
    pub analysis_ids: Vec<String>,
}

/// Builds the analysis-creation request body from a resolved config.
///
/// # Errors
/// Returns `BeamError::IncompleteConfig` naming the first missing
/// field; the Beam API needs coordinates, a radius, and a minimum rank.
pub fn analysis_body(name: &str, config: &LocationConfig) -> Result<Value, BeamError> {
    let lat = config
        .lat
        .ok_or_else(|| BeamError::IncompleteConfig("lat".to_string()))?;
    let lon = config
        .lon
        .ok_or_else(|| BeamError::IncompleteConfig("lon".to_string()))?;
    let radius = config
        .radius
        .ok_or_else(|| BeamError::IncompleteConfig("radius".to_string()))?;
    let radius_unit = config
        .radius_unit
        .as_ref()
        .ok_or_else(|| BeamError::IncompleteConfig("radius_unit".to_string()))?;
    let min_phq_rank = config
        .min_phq_rank
        .ok_or_else(|| BeamError::IncompleteConfig("min_phq_rank".to_string()))?;

    Ok(json!({
        "name": name,
        "location": {
            "geopoint": {
                "lat": lat.to_string(),
                "lon": lon.to_string(),
            },
            "radius": radius,
            "unit": radius_unit,
        },
        "rank": {
            "type": "phq",
            "levels": { "phq": { "min": min_phq_rank } },
        },
    }))
}

/// Async client for the Beam API: analysis and analysis-group CRUD.
///
/// Every method is a stateless passthrough; the interesting logic
/// lives in the config supplementation and feature pipeline.
#[derive(Debug, Clone)]
pub struct BeamClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl BeamClient {
    /// Creates a client against the production Beam endpoint.
    ///
    /// # Errors
    /// Returns `ClientError` if HTTP client creation fails.
    pub fn new(access_token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_base_url(access_token, DEFAULT_BEAM_URL)
    }

    pub fn with_base_url(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError(e.to_string()))?;

        Ok(BeamClient {
            client,
            access_token: access_token.into(),
            base_url: base_url.into(),
        })
    }

    /// Creates an analysis for a location and returns its id.
    pub async fn create_analysis(
        &self,
        name: &str,
        config: &LocationConfig,
    ) -> Result<String, BeamError> {
        let body = analysis_body(name, config)?;
        let response = self.post(&format!("{}/analyses", self.base_url), &body).await?;
        let data: Value = Self::parse(response).await?;

        data["analysis_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BeamError::Parse("response has no analysis_id".to_string()))
    }

    /// Uploads one location's demand rows to an analysis sink.
    ///
    /// The API acknowledges with 202 Accepted; the upload is processed
    /// asynchronously server-side.
    pub async fn upload_demand(
        &self,
        analysis_id: &str,
        demand: &DemandTable,
        location: &str,
    ) -> Result<(), BeamError> {
        let body = demand.upload_body(location);
        let response = self
            .post(&format!("{}/analyses/{}/sink", self.base_url, analysis_id), &body)
            .await?;

        if response.status().as_u16() == 202 {
            tracing::debug!(analysis_id, "demand upload accepted for processing");
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(BeamError::Api(detail))
        }
    }

    /// Returns the readiness status of an analysis.
    pub async fn readiness_status(&self, analysis_id: &str) -> Result<String, BeamError> {
        let data = self
            .get_json(&format!("{}/analyses/{}", self.base_url, analysis_id))
            .await?;
        data["readiness_status"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BeamError::Parse("response has no readiness_status".to_string()))
    }

    /// Requests a recomputation of an analysis.
    pub async fn refresh_analysis(&self, analysis_id: &str) -> Result<(), BeamError> {
        let response = self
            .post(
                &format!("{}/analyses/{}/refresh", self.base_url, analysis_id),
                &Value::Null,
            )
            .await?;

        if response.status().as_u16() == 202 {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(BeamError::Api(detail))
        }
    }

    /// Returns the feature-importance report of an analysis.
    pub async fn feature_importance(&self, analysis_id: &str) -> Result<Value, BeamError> {
        self.get_json(&format!(
            "{}/analyses/{}/feature-importance",
            self.base_url, analysis_id
        ))
        .await
    }

    /// Creates an analysis group and returns its id.
    pub async fn create_group(
        &self,
        name: &str,
        analysis_ids: &[String],
    ) -> Result<String, BeamError> {
        let body = json!({ "name": name, "analysis_ids": analysis_ids });
        let response = self
            .post(&format!("{}/analysis-groups", self.base_url), &body)
            .await?;
        let data: Value = Self::parse(response).await?;

        data["group_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BeamError::Parse("response has no group_id".to_string()))
    }

    /// Returns the readiness and feature-importance state of a group.
    pub async fn group_status(&self, group_id: &str) -> Result<GroupStatus, BeamError> {
        let data = self
            .get_json(&format!("{}/analysis-groups/{}", self.base_url, group_id))
            .await?;

        Ok(GroupStatus {
            readiness_status: data["readiness_status"].as_str().map(str::to_string),
            feature_importance_processing_completed: data["processing_completed"]
                ["feature_importance"]
                .as_bool(),
        })
    }

    /// Returns a group's name and analysis ids, dropping analyses the
    /// server excluded during processing.
    pub async fn get_group(&self, group_id: &str) -> Result<GroupDetails, BeamError> {
        let data = self
            .get_json(&format!("{}/analysis-groups/{}", self.base_url, group_id))
            .await?;
        group_details(&data)
    }

    /// Returns the feature-importance report of a group.
    pub async fn group_feature_importance(&self, group_id: &str) -> Result<Value, BeamError> {
        self.get_json(&format!(
            "{}/analysis-groups/{}/feature-importance",
            self.base_url, group_id
        ))
        .await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, BeamError> {
        self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| BeamError::Network(e.to_string()))
    }

    async fn get_json(&self, url: &str) -> Result<Value, BeamError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BeamError::Network(e.to_string()))?;
        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> Result<Value, BeamError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BeamError::Api(format!("HTTP {}: {}", status.as_u16(), detail)));
        }
        response
            .json()
            .await
            .map_err(|e| BeamError::Parse(e.to_string()))
    }
}

fn group_details(data: &Value) -> Result<GroupDetails, BeamError> {
    let name = data["name"]
        .as_str()
        .ok_or_else(|| BeamError::Parse("response has no group name".to_string()))?
        .to_string();

    let excluded: HashSet<&str> = data["processing_completed"]["excluded_analyses"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry["analysis_id"].as_str())
                .collect()
        })
        .unwrap_or_default();

    let analysis_ids = data["analysis_ids"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .filter(|id| !excluded.contains(id))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(GroupDetails { name, analysis_ids })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved_config() -> LocationConfig {
        LocationConfig {
            lat: Some(40.75),
            lon: Some(-73.99),
            radius: Some(2.0),
            radius_unit: Some("mi".to_string()),
            min_phq_rank: Some(30),
            ..LocationConfig::default()
        }
    }

    #[test]
    fn test_analysis_body_shape() {
        let body = analysis_body("store_a demand", &resolved_config()).unwrap();

        assert_eq!(body["name"], "store_a demand");
        // Geopoint coordinates go over the wire as strings.
        assert_eq!(body["location"]["geopoint"]["lat"], "40.75");
        assert_eq!(body["location"]["geopoint"]["lon"], "-73.99");
        assert_eq!(body["location"]["radius"], 2.0);
        assert_eq!(body["location"]["unit"], "mi");
        assert_eq!(body["rank"]["levels"]["phq"]["min"], 30);
    }

    #[test]
    fn test_analysis_body_names_missing_field() {
        let mut config = resolved_config();
        config.radius = None;

        let error = analysis_body("store_a", &config).unwrap_err();
        assert_eq!(error, BeamError::IncompleteConfig("radius".to_string()));
    }

    #[test]
    fn test_group_details_filters_excluded_analyses() {
        let data = serde_json::json!({
            "name": "all stores",
            "analysis_ids": ["a1", "a2", "a3"],
            "processing_completed": {
                "excluded_analyses": [{ "analysis_id": "a2" }],
            },
        });

        let details = group_details(&data).unwrap();
        assert_eq!(details.name, "all stores");
        assert_eq!(details.analysis_ids, vec!["a1".to_string(), "a3".to_string()]);
    }

    #[test]
    fn test_group_details_without_exclusions() {
        let data = serde_json::json!({
            "name": "all stores",
            "analysis_ids": ["a1", "a2"],
        });

        let details = group_details(&data).unwrap();
        assert_eq!(details.analysis_ids.len(), 2);
    }

    #[test]
    fn test_beam_client_creation() {
        assert!(BeamClient::new("token").is_ok());
        let client = BeamClient::with_base_url("token", "http://localhost:8080/beam").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/beam");
    }
}
