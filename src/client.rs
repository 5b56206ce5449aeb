use crate::location::Industry;
use crate::pipeline::{QueryExecutionError, QueryExecutor};
use crate::query::FeatureQuery;
use crate::record::RawFeature;
use crate::supplement::{RadiusError, RadiusResolver, SuggestedRadius};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.predicthq.com/v1";

/// Configuration for the Features API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL (default: the production endpoint)
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
        }
    }
}

/// HTTP client creation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError(pub String);

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client creation error: {}", self.0)
    }
}

impl std::error::Error for ClientError {}

/// One page of a Features API response.
#[derive(Debug, Deserialize)]
struct FeaturesPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct SuggestedRadiusResponse {
    radius: f64,
    radius_unit: String,
}

/// Async client for the Features API.
///
/// Submits feature queries, reassembles paginated responses, and
/// serves suggested-radius lookups. Implements the `QueryExecutor` and
/// `RadiusResolver` collaborator traits consumed by the core.
#[derive(Debug, Clone)]
pub struct FeaturesClient {
    client: Client,
    access_token: String,
    config: ClientConfig,
}

impl FeaturesClient {
    /// Creates a client with default configuration.
    ///
    /// # Errors
    /// Returns `ClientError` if HTTP client creation fails.
    pub fn new(access_token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_config(access_token, ClientConfig::default())
    }

    /// Creates a client with custom configuration.
    pub fn with_config(
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ClientError(e.to_string()))?;

        Ok(FeaturesClient {
            client,
            access_token: access_token.into(),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches all feature objects for one query, following pagination
    /// links until the response is exhausted.
    ///
    /// # Errors
    /// Returns `QueryExecutionError` on network failure, a non-success
    /// status, or an unparseable response body.
    pub async fn obtain_features(
        &self,
        query: &FeatureQuery,
    ) -> Result<Vec<RawFeature>, QueryExecutionError> {
        let body = query.to_body();
        let mut url = format!("{}/features/", self.config.base_url);
        let mut results = Vec::new();

        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.access_token)
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| QueryExecutionError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(QueryExecutionError::Api(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    detail
                )));
            }

            let page: FeaturesPage = response
                .json()
                .await
                .map_err(|e| QueryExecutionError::Parse(e.to_string()))?;

            tracing::debug!(
                page_results = page.results.len(),
                has_next = page.next.is_some(),
                "fetched features page"
            );
            results.extend(page.results);

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(results)
    }

    /// Fetches the suggested search radius for a point, with an
    /// optional industry filter.
    pub async fn suggested_radius(
        &self,
        lat: f64,
        lon: f64,
        industry: Option<Industry>,
    ) -> Result<SuggestedRadius, RadiusError> {
        let mut params: Vec<(&str, String)> = vec![
            ("location.origin", format!("{},{}", lat, lon)),
            ("radius_unit", "mi".to_string()),
        ];
        if let Some(industry) = industry {
            params.push(("industry", industry.as_str().to_string()));
        }

        let response = self
            .client
            .get(format!("{}/suggested-radius/", self.config.base_url))
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await
            .map_err(|e| RadiusError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RadiusError(format!("HTTP {}", status.as_u16())));
        }

        let suggested: SuggestedRadiusResponse = response
            .json()
            .await
            .map_err(|e| RadiusError(e.to_string()))?;

        Ok(SuggestedRadius {
            radius: suggested.radius,
            radius_unit: suggested.radius_unit,
        })
    }
}

#[async_trait]
impl QueryExecutor for FeaturesClient {
    async fn submit_query(
        &self,
        query: &FeatureQuery,
    ) -> Result<Vec<RawFeature>, QueryExecutionError> {
        self.obtain_features(query).await
    }
}

#[async_trait]
impl RadiusResolver for FeaturesClient {
    async fn suggested_radius(
        &self,
        lat: f64,
        lon: f64,
        industry: Option<Industry>,
    ) -> Result<SuggestedRadius, RadiusError> {
        FeaturesClient::suggested_radius(self, lat, lon, industry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = FeaturesClient::new("token");
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_config() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/v1".to_string(),
            timeout_seconds: 5,
        };
        let client = FeaturesClient::with_config("token", config).unwrap();

        assert_eq!(client.config().base_url, "http://localhost:8080/v1");
        assert_eq!(client.config().timeout_seconds, 5);
    }

    #[test]
    fn test_default_config_points_at_production() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://api.predicthq.com/v1");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_features_page_parses_without_next() {
        let page: FeaturesPage =
            serde_json::from_str(r#"{"count": 1, "results": [{"date": "2024-01-01"}]}"#).unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.results.len(), 1);
    }
}
