use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use tripmatch_model::{Coordinate, Fix, RouteCode, TimeOfDay};

use crate::config::{MatcherConfig, SearchStrategy};
use crate::dataset::ReferenceData;
use crate::disambiguator::{disambiguate_trip_with, Timetable};
use crate::locator::locate_route_with;
use crate::nearest::{LinearScan, NearestSearch, SpatialIndex};
use crate::MatchError;

/// Outcome of one successful match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripMatch {
    pub trip_id: String,
    pub route_code: RouteCode,
    pub shape_id: String,
    pub shape_distance_m: f64,
    pub stop_id: String,
    pub stop_distance_m: f64,
    pub scheduled_departure: TimeOfDay,
    pub delta_seconds: u32,
    pub candidate_trips: usize,
}

struct Indexes {
    shapes: SpatialIndex,
    stops: SpatialIndex,
}

/// Matches fixes against one shared, immutable load of reference data.
pub struct TripMatcher {
    data: Arc<ReferenceData>,
    config: MatcherConfig,
    indexes: Option<Indexes>,
}

impl TripMatcher {
    pub fn new(data: Arc<ReferenceData>, config: MatcherConfig) -> Result<Self, MatchError> {
        config.validate()?;
        let indexes = match config.search {
            SearchStrategy::Linear => None,
            SearchStrategy::Indexed => {
                debug!(
                    shapes = data.shapes.len(),
                    stops = data.stops.len(),
                    "building spatial indexes"
                );
                Some(Indexes {
                    shapes: SpatialIndex::build(&data.shapes),
                    stops: SpatialIndex::build(&data.stops),
                })
            }
        };
        Ok(Self {
            data,
            config,
            indexes,
        })
    }

    /// Loads the dataset in `dir` with the layout from `config`.
    pub fn from_dataset(dir: &Path, config: MatcherConfig) -> Result<Self, MatchError> {
        config.validate()?;
        let data = ReferenceData::load(dir, &config.layout)?;
        Self::new(Arc::new(data), config)
    }

    pub fn match_fix(
        &self,
        coordinate: Coordinate,
        observed: TimeOfDay,
    ) -> Result<TripMatch, MatchError> {
        match &self.indexes {
            Some(indexes) => {
                self.match_with(&indexes.shapes, &indexes.stops, coordinate, observed)
            }
            None => self.match_with(
                &LinearScan::new(&self.data.shapes),
                &LinearScan::new(&self.data.stops),
                coordinate,
                observed,
            ),
        }
    }

    fn match_with(
        &self,
        shape_search: &dyn NearestSearch,
        stop_search: &dyn NearestSearch,
        coordinate: Coordinate,
        observed: TimeOfDay,
    ) -> Result<TripMatch, MatchError> {
        let data = self.data.as_ref();
        let location = locate_route_with(
            shape_search,
            &data.shapes,
            coordinate,
            &self.config.route_family,
        )?;
        let timetable = Timetable {
            trips: &data.trips,
            stops: &data.stops,
            stop_times: &data.stop_times,
        };
        let selection = disambiguate_trip_with(
            stop_search,
            timetable,
            &location.route_code,
            Fix::new(coordinate, observed),
            &self.config.route_family,
            self.config.time_comparison,
        )?;
        debug!(
            trip_id = %selection.trip_id,
            route_code = %location.route_code,
            delta_seconds = selection.delta_seconds,
            "matched fix {} at {}",
            coordinate,
            observed
        );

        Ok(TripMatch {
            trip_id: selection.trip_id,
            route_code: location.route_code,
            shape_id: location.shape_id,
            shape_distance_m: location.distance_m,
            stop_id: selection.stop_id,
            stop_distance_m: selection.stop_distance_m,
            scheduled_departure: selection.scheduled_departure,
            delta_seconds: selection.delta_seconds,
            candidate_trips: selection.candidate_trips,
        })
    }
}

/// Loads the dataset in `dir` and matches a single fix against it.
pub fn match_from_dataset(
    dir: &Path,
    coordinate: Coordinate,
    observed: TimeOfDay,
    config: &MatcherConfig,
) -> Result<TripMatch, MatchError> {
    TripMatcher::from_dataset(dir, config.clone())?.match_fix(coordinate, observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeComparison;
    use crate::error::Collection;
    use tripmatch_model::{ShapePoint, Stop, StopTime, Trip};

    fn sample_data() -> ReferenceData {
        ReferenceData::from_parts(
            vec![
                ShapePoint {
                    shape_id: "01-A".into(),
                    position: Coordinate::new(34.0, 137.0),
                    sequence: 1,
                },
                ShapePoint {
                    shape_id: "02-B".into(),
                    position: Coordinate::new(34.05, 137.05),
                    sequence: 1,
                },
            ],
            vec![
                Trip {
                    trip_id: "T1".into(),
                    shape_id: "01-A".into(),
                },
                Trip {
                    trip_id: "T2".into(),
                    shape_id: "01-A".into(),
                },
                Trip {
                    trip_id: "T3".into(),
                    shape_id: "02-B".into(),
                },
            ],
            vec![
                Stop {
                    stop_id: "S1".into(),
                    position: Coordinate::new(34.0, 137.0),
                },
                Stop {
                    stop_id: "S2".into(),
                    position: Coordinate::new(34.05, 137.05),
                },
            ],
            vec![
                StopTime {
                    trip_id: "T1".into(),
                    arrival_time: "08:00:00".into(),
                    departure_time: "08:00:00".into(),
                    stop_id: "S1".into(),
                },
                StopTime {
                    trip_id: "T2".into(),
                    arrival_time: "11:00:00".into(),
                    departure_time: "11:00:00".into(),
                    stop_id: "S1".into(),
                },
                StopTime {
                    trip_id: "T3".into(),
                    arrival_time: "08:00:00".into(),
                    departure_time: "08:00:00".into(),
                    stop_id: "S2".into(),
                },
            ],
        )
    }

    fn at(time: &str) -> TimeOfDay {
        TimeOfDay::parse(time).unwrap()
    }

    #[test]
    fn matches_trip_with_diagnostics() {
        let matcher = TripMatcher::new(Arc::new(sample_data()), MatcherConfig::default()).unwrap();
        let result = matcher
            .match_fix(Coordinate::new(34.0, 137.0), at("08:00:05"))
            .unwrap();
        assert_eq!(result.trip_id, "T1");
        assert_eq!(result.route_code, "01");
        assert_eq!(result.shape_id, "01-A");
        assert_eq!(result.stop_id, "S1");
        assert_eq!(result.delta_seconds, 5);
        assert_eq!(result.candidate_trips, 2);
        assert_eq!(result.shape_distance_m, 0.0);
    }

    #[test]
    fn later_fix_prefers_later_trip() {
        let matcher = TripMatcher::new(Arc::new(sample_data()), MatcherConfig::default()).unwrap();
        let result = matcher
            .match_fix(Coordinate::new(34.0, 137.0), at("10:40:00"))
            .unwrap();
        assert_eq!(result.trip_id, "T2");
    }

    #[test]
    fn matching_is_deterministic() {
        let matcher = TripMatcher::new(Arc::new(sample_data()), MatcherConfig::default()).unwrap();
        let fix = Coordinate::new(34.0001, 137.0001);
        let first = matcher.match_fix(fix, at("09:30:00")).unwrap();
        for _ in 0..5 {
            assert_eq!(matcher.match_fix(fix, at("09:30:00")).unwrap(), first);
        }
    }

    #[test]
    fn indexed_search_matches_linear_search() {
        let data = Arc::new(sample_data());
        let linear = TripMatcher::new(data.clone(), MatcherConfig::default()).unwrap();
        let indexed = TripMatcher::new(
            data,
            MatcherConfig {
                search: SearchStrategy::Indexed,
                ..MatcherConfig::default()
            },
        )
        .unwrap();
        for (lat, lon, time) in [
            (34.0, 137.0, "08:00:05"),
            (34.04, 137.04, "07:00:00"),
            (34.01, 137.02, "12:00:00"),
        ] {
            let fix = Coordinate::new(lat, lon);
            assert_eq!(
                linear.match_fix(fix, at(time)).unwrap(),
                indexed.match_fix(fix, at(time)).unwrap()
            );
        }
    }

    #[test]
    fn empty_stops_propagates_unchanged() {
        let mut data = sample_data();
        data.stops.clear();
        let matcher = TripMatcher::new(Arc::new(data), MatcherConfig::default()).unwrap();
        let err = matcher
            .match_fix(Coordinate::new(34.0, 137.0), at("08:00:00"))
            .unwrap_err();
        assert!(matches!(err, MatchError::EmptyDataset(Collection::Stops)));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MatcherConfig {
            route_family: crate::config::RouteFamilyRule::Prefix { chars: 0 },
            ..MatcherConfig::default()
        };
        let err = TripMatcher::new(Arc::new(sample_data()), config)
            .err()
            .unwrap();
        assert!(matches!(err, MatchError::InvalidConfig(_)));
    }

    #[test]
    fn linear_comparison_is_honoured() {
        let config = MatcherConfig {
            time_comparison: TimeComparison::Linear,
            ..MatcherConfig::default()
        };
        let matcher = TripMatcher::new(Arc::new(sample_data()), config).unwrap();
        let result = matcher
            .match_fix(Coordinate::new(34.0, 137.0), at("20:00:00"))
            .unwrap();
        assert_eq!(result.trip_id, "T2");
        assert_eq!(result.delta_seconds, 9 * 3600);
    }

    #[test]
    fn matcher_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TripMatcher>();
        assert_send_sync::<Arc<ReferenceData>>();
    }
}
