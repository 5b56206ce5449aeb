use crate::location::LocationConfig;
use crate::query::{build_feature_query, ConfigError, FeatureQuery};
use crate::record::{flatten_feature, FeatureDataset, FlattenError, RawFeature};
use crate::windows::{DateWindow, DateWindows, MAX_WINDOW_DAYS};
use async_trait::async_trait;
use std::fmt;

/// Errors from submitting a query to the external Features API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExecutionError {
    /// Network-level failure
    Network(String),
    /// The API returned an error response
    Api(String),
    /// The response body could not be parsed
    Parse(String),
    /// Anything else a custom executor wants to surface
    Other(String),
}

impl fmt::Display for QueryExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExecutionError::Network(msg) => write!(f, "Network error: {}", msg),
            QueryExecutionError::Api(msg) => write!(f, "API error: {}", msg),
            QueryExecutionError::Parse(msg) => write!(f, "Parse error: {}", msg),
            QueryExecutionError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for QueryExecutionError {}

/// External query-execution collaborator.
///
/// Implemented by the HTTP client and by in-memory test doubles.
#[async_trait]
pub trait QueryExecutor {
    /// Submits one window's query and returns the raw feature objects,
    /// fully reassembled across response pages.
    async fn submit_query(
        &self,
        query: &FeatureQuery,
    ) -> Result<Vec<RawFeature>, QueryExecutionError>;
}

/// Pipeline-level failure. Carries the window that failed so the
/// caller can attribute and decide whether to retry the location.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The config or feature list could not produce a query
    Config(ConfigError),
    /// A window's query failed; the whole run is abandoned
    QueryExecution {
        window: DateWindow,
        source: QueryExecutionError,
    },
    /// A returned feature object could not be flattened
    Flatten {
        window: DateWindow,
        source: FlattenError,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(source) => write!(f, "{}", source),
            PipelineError::QueryExecution { window, source } => {
                write!(f, "Failed to fetch features for {}: {}", window, source)
            }
            PipelineError::Flatten { window, source } => {
                write!(f, "Failed to process features for {}: {}", window, source)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Config(source) => Some(source),
            PipelineError::QueryExecution { source, .. } => Some(source),
            PipelineError::Flatten { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config(source)
    }
}

/// Drives the full per-location fetch: partition the date range,
/// build and submit one query per window, flatten every returned
/// object into the accumulating dataset.
///
/// Windows run strictly in sequence. The API caps the span per
/// request, later windows never depend on earlier results, and the
/// sequential order keeps output rows deterministic and ties any
/// failure to a single window. A failure on any window abandons the
/// run; no partial dataset is returned.
#[derive(Debug, Clone)]
pub struct FeatureQueryPipeline {
    max_window_days: i64,
}

impl Default for FeatureQueryPipeline {
    fn default() -> Self {
        FeatureQueryPipeline {
            max_window_days: MAX_WINDOW_DAYS,
        }
    }
}

impl FeatureQueryPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the per-request window cap. Only useful against test
    /// doubles; the real API enforces `MAX_WINDOW_DAYS`.
    pub fn with_max_window_days(mut self, days: i64) -> Self {
        self.max_window_days = days;
        self
    }

    /// Fetches the feature dataset for one resolved location config.
    ///
    /// # Arguments
    /// * `config` - Fully supplemented location config
    /// * `features` - Names of the features to request
    /// * `executor` - Query-execution collaborator
    ///
    /// # Errors
    /// `PipelineError::Config` when the feature list is invalid or the
    /// config lacks dates or location info; `QueryExecution`/`Flatten`
    /// when any window fails, in which case no dataset is returned.
    pub async fn run<E: QueryExecutor>(
        &self,
        config: &LocationConfig,
        features: &[String],
        executor: &E,
    ) -> Result<FeatureDataset, PipelineError> {
        let (start, end) = match (config.start, config.end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(ConfigError::MissingDateRange.into()),
        };

        let mut dataset = FeatureDataset::new(features.to_vec());

        for window in DateWindows::new(start, end, self.max_window_days) {
            let query = build_feature_query(config, features, window)?;

            tracing::debug!(window = %window, "submitting feature query");
            let results = executor
                .submit_query(&query)
                .await
                .map_err(|source| PipelineError::QueryExecution { window, source })?;

            for raw in &results {
                let record = flatten_feature(raw)
                    .map_err(|source| PipelineError::Flatten { window, source })?;
                dataset.push(record);
            }
        }

        Ok(dataset)
    }
}

/// Queue-backed executor for tests: pops one canned response per
/// submitted query, in order.
#[derive(Debug, Default)]
pub struct InMemoryQueryExecutor {
    responses: std::sync::Mutex<
        std::collections::VecDeque<Result<Vec<RawFeature>, QueryExecutionError>>,
    >,
    queries: std::sync::Mutex<Vec<FeatureQuery>>,
}

impl InMemoryQueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response for the next query.
    pub fn push_response(&self, results: Vec<RawFeature>) {
        self.responses.lock().unwrap().push_back(Ok(results));
    }

    /// Queues a failure for the next query.
    pub fn push_failure(&self, error: QueryExecutionError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Queries submitted so far, in order.
    pub fn submitted(&self) -> Vec<FeatureQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for InMemoryQueryExecutor {
    async fn submit_query(
        &self,
        query: &FeatureQuery,
    ) -> Result<Vec<RawFeature>, QueryExecutionError> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
