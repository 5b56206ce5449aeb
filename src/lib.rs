pub mod location;
pub mod demand;
pub mod windows;
pub mod query;
pub mod record;
pub mod supplement;
pub mod pipeline;
pub mod client;
pub mod beam;

pub use location::{Industry, Interval, LocationConfig};
pub use demand::{DemandRecord, DemandTable};
pub use windows::{DateWindow, DateWindows, MAX_WINDOW_DAYS};
pub use query::{
    build_feature_query, is_rank_feature, preferred_stat, ConfigError, FeatureClause,
    FeatureQuery, LocationClause, Stat,
};
pub use record::{flatten_feature, FeatureDataset, FeatureRecord, FlattenError, RawFeature};
pub use supplement::{
    ConfigSupplementer, FixedRadiusResolver, MinRankPolicy, RadiusError, RadiusResolver,
    SuggestedRadius,
};
pub use pipeline::{
    FeatureQueryPipeline, InMemoryQueryExecutor, PipelineError, QueryExecutionError,
    QueryExecutor,
};
pub use client::{ClientConfig, ClientError, FeaturesClient};
pub use beam::{analysis_body, BeamClient, BeamError, GroupDetails, GroupStatus};
