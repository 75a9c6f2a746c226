#![no_main]
use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tripmatch_core::{
    Coordinate, MatcherConfig, ReferenceData, SearchStrategy, TimeOfDay, TripMatcher,
};
use tripmatch_model::{ShapePoint, Stop, StopTime, Trip};

#[derive(Debug, Arbitrary)]
struct FuzzData {
    shapes: Vec<(u8, i16, i16)>,
    stops: Vec<(u8, i16, i16)>,
    trips: Vec<(u8, u8)>,
    stop_times: Vec<(u8, u8, String)>,
    fix: (i16, i16),
    observed: u32,
}

// Small offsets around one city keep the data at the scale the index targets.
fn position(lat: i16, lon: i16) -> Coordinate {
    Coordinate::new(35.0 + f64::from(lat) * 1e-5, 137.0 + f64::from(lon) * 1e-5)
}

fuzz_target!(|data: FuzzData| {
    let shapes = data
        .shapes
        .iter()
        .enumerate()
        .map(|(i, &(shape, lat, lon))| ShapePoint {
            shape_id: format!("{:02}-{}", shape % 7, shape),
            position: position(lat, lon),
            sequence: i as i32,
        })
        .collect();
    let stops = data
        .stops
        .iter()
        .map(|&(stop, lat, lon)| Stop {
            stop_id: format!("S{}", stop),
            position: position(lat, lon),
        })
        .collect();
    let trips = data
        .trips
        .iter()
        .map(|&(trip, shape)| Trip {
            trip_id: format!("T{}", trip),
            shape_id: format!("{:02}-{}", shape % 7, shape),
        })
        .collect();
    let stop_times = data
        .stop_times
        .iter()
        .map(|(trip, stop, time)| StopTime {
            trip_id: format!("T{}", trip),
            arrival_time: time.clone(),
            departure_time: time.clone(),
            stop_id: format!("S{}", stop),
        })
        .collect();

    let Some(observed) = TimeOfDay::from_seconds(data.observed % 86_400) else {
        return;
    };
    let fix = position(data.fix.0, data.fix.1);
    let reference = Arc::new(ReferenceData::from_parts(shapes, trips, stops, stop_times));

    let linear = TripMatcher::new(reference.clone(), MatcherConfig::default());
    let indexed = TripMatcher::new(
        reference,
        MatcherConfig {
            search: SearchStrategy::Indexed,
            ..MatcherConfig::default()
        },
    );
    if let (Ok(linear), Ok(indexed)) = (linear, indexed) {
        let expected = linear.match_fix(fix, observed).map(|m| m.trip_id);
        let actual = indexed.match_fix(fix, observed).map(|m| m.trip_id);
        assert_eq!(expected.ok(), actual.ok());
    }
});
