use std::fmt;

use tripmatch_model::RouteCode;

/// Collections the matcher cannot work without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Shapes,
    Stops,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Shapes => f.write_str("shapes"),
            Collection::Stops => f.write_str("stops"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("reference file {file} unavailable: {source}")]
    DatasetUnavailable {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("reference collection {0} is empty")]
    EmptyDataset(Collection),
    #[error("no trip belongs to route family {0}")]
    NoRouteMatch(RouteCode),
    #[error("no trip of route family {route_code} is scheduled at stop {stop_id}")]
    NoScheduleMatch { route_code: RouteCode, stop_id: String },
    #[error("invalid matcher configuration: {0}")]
    InvalidConfig(String),
}

impl MatchError {
    /// Short machine-readable name, used by the CLI when printing failures.
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::DatasetUnavailable { .. } => "dataset_unavailable",
            MatchError::EmptyDataset(_) => "empty_dataset",
            MatchError::NoRouteMatch(_) => "no_route_match",
            MatchError::NoScheduleMatch { .. } => "no_schedule_match",
            MatchError::InvalidConfig(_) => "invalid_config",
        }
    }
}
