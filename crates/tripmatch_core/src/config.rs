use std::path::Path;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use tripmatch_model::{RouteCode, TimeOfDay};

use crate::MatchError;

pub const SHAPES_FILE: &str = "shapes.csv";
pub const TRIPS_FILE: &str = "trip.csv";
pub const STOPS_FILE: &str = "stops.csv";
pub const STOP_TIMES_FILE: &str = "stop_time.csv";

const UTF8_LABEL: &str = "utf-8";
const SHIFT_JIS_LABEL: &str = "shift_jis";

/// Where one reference table lives and how it is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    pub file: String,
    /// WHATWG encoding label, e.g. `shift_jis` or `utf-8`.
    pub encoding: String,
    pub skip_header: bool,
}

impl TableSource {
    pub fn new(file: &str, encoding: &str, skip_header: bool) -> Self {
        Self {
            file: file.to_string(),
            encoding: encoding.to_string(),
            skip_header,
        }
    }

    pub fn resolve_encoding(&self) -> Result<&'static Encoding, MatchError> {
        Encoding::for_label(self.encoding.trim().as_bytes()).ok_or_else(|| {
            MatchError::InvalidConfig(format!(
                "unknown encoding '{}' for {}",
                self.encoding, self.file
            ))
        })
    }
}

/// File names and encodings of the four reference tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    pub shapes: TableSource,
    pub trips: TableSource,
    pub stops: TableSource,
    pub stop_times: TableSource,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            shapes: TableSource::new(SHAPES_FILE, UTF8_LABEL, false),
            trips: TableSource::new(TRIPS_FILE, SHIFT_JIS_LABEL, true),
            stops: TableSource::new(STOPS_FILE, SHIFT_JIS_LABEL, true),
            stop_times: TableSource::new(STOP_TIMES_FILE, SHIFT_JIS_LABEL, true),
        }
    }
}

impl DatasetLayout {
    /// Same file names, every table decoded as UTF-8.
    pub fn utf8() -> Self {
        let mut layout = Self::default();
        for source in layout.tables_mut() {
            source.encoding = UTF8_LABEL.to_string();
        }
        layout
    }

    pub fn tables(&self) -> [&TableSource; 4] {
        [&self.shapes, &self.trips, &self.stops, &self.stop_times]
    }

    fn tables_mut(&mut self) -> [&mut TableSource; 4] {
        [
            &mut self.shapes,
            &mut self.trips,
            &mut self.stops,
            &mut self.stop_times,
        ]
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        for source in self.tables() {
            source.resolve_encoding()?;
        }
        Ok(())
    }
}

/// Rule deriving a route family from a shape id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RouteFamilyRule {
    /// The first `chars` characters of the shape id.
    Prefix { chars: usize },
    /// Everything before the first `separator`.
    Delimited { separator: char },
    /// The shape id itself.
    ShapeId,
}

impl Default for RouteFamilyRule {
    fn default() -> Self {
        RouteFamilyRule::Prefix { chars: 2 }
    }
}

impl RouteFamilyRule {
    pub fn route_code(&self, shape_id: &str) -> RouteCode {
        match self {
            RouteFamilyRule::Prefix { chars } => {
                RouteCode::new(shape_id.chars().take(*chars).collect::<String>())
            }
            RouteFamilyRule::Delimited { separator } => {
                let family = shape_id
                    .split_once(*separator)
                    .map_or(shape_id, |(head, _)| head);
                RouteCode::new(family)
            }
            RouteFamilyRule::ShapeId => RouteCode::new(shape_id),
        }
    }

    /// Whether `shape_id` belongs to `code`, without allocating.
    pub fn matches(&self, shape_id: &str, code: &RouteCode) -> bool {
        match self {
            RouteFamilyRule::Prefix { chars } => {
                let end = shape_id
                    .char_indices()
                    .nth(*chars)
                    .map_or(shape_id.len(), |(index, _)| index);
                shape_id[..end] == *code.as_str()
            }
            RouteFamilyRule::Delimited { separator } => {
                let family = shape_id
                    .split_once(*separator)
                    .map_or(shape_id, |(head, _)| head);
                family == code.as_str()
            }
            RouteFamilyRule::ShapeId => shape_id == code.as_str(),
        }
    }
}

/// How a scheduled departure is compared with the observed time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeComparison {
    /// Absolute difference on a single day.
    Linear,
    /// Shortest distance around the 24 hour clock.
    #[default]
    Circular,
}

impl TimeComparison {
    pub fn delta_seconds(self, scheduled: TimeOfDay, observed: TimeOfDay) -> u32 {
        match self {
            TimeComparison::Linear => scheduled.linear_delta(observed),
            TimeComparison::Circular => scheduled.circular_delta(observed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    #[default]
    Linear,
    Indexed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub layout: DatasetLayout,
    pub route_family: RouteFamilyRule,
    pub time_comparison: TimeComparison,
    pub search: SearchStrategy,
}

impl MatcherConfig {
    pub fn from_json_str(json: &str) -> Result<Self, MatchError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| MatchError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, MatchError> {
        let json = std::fs::read_to_string(path).map_err(|err| {
            MatchError::InvalidConfig(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if let RouteFamilyRule::Prefix { chars: 0 } = self.route_family {
            return Err(MatchError::InvalidConfig(
                "route family prefix must keep at least one character".to_string(),
            ));
        }
        self.layout.validate()
    }
}
