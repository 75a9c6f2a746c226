pub mod config;
pub mod dataset;
pub mod disambiguator;
pub mod error;
pub mod geodesy;
pub mod locator;
pub mod matcher;
pub mod nearest;

pub use config::{
    DatasetLayout, MatcherConfig, RouteFamilyRule, SearchStrategy, TableSource, TimeComparison,
};
pub use dataset::{decode_table, LoadReport, ReferenceData, TableRecord, TableReport, TableRows};
pub use disambiguator::{disambiguate_trip, disambiguate_trip_with, Timetable, TripSelection};
pub use error::{Collection, MatchError};
pub use geodesy::hubeny_distance;
pub use locator::{locate_route, locate_route_with, RouteLocation};
pub use matcher::{match_from_dataset, TripMatch, TripMatcher};
pub use nearest::{LinearScan, Nearest, NearestSearch, Positioned, SpatialIndex};

pub use tripmatch_model::{Coordinate, Fix, RouteCode, TimeOfDay};
