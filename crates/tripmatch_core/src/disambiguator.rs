use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use tripmatch_model::{Fix, RouteCode, Stop, StopTime, TimeOfDay, Trip};

use crate::config::{RouteFamilyRule, TimeComparison};
use crate::error::Collection;
use crate::nearest::{LinearScan, NearestSearch};
use crate::MatchError;

/// Borrowed view of the timetable tables used for disambiguation.
#[derive(Debug, Clone, Copy)]
pub struct Timetable<'a> {
    pub trips: &'a [Trip],
    pub stops: &'a [Stop],
    pub stop_times: &'a [StopTime],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSelection {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_distance_m: f64,
    pub scheduled_departure: TimeOfDay,
    pub delta_seconds: u32,
    pub candidate_trips: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Ranking {
    delta_seconds: u32,
    candidate_rank: usize,
    row: usize,
}

/// Picks the candidate trip whose departure at the nearest stop is closest to
/// the fix time. Ties keep the earliest candidate trip, then the earliest
/// stop-time row.
pub fn disambiguate_trip(
    timetable: Timetable<'_>,
    route_code: &RouteCode,
    fix: Fix,
    rule: &RouteFamilyRule,
    comparison: TimeComparison,
) -> Result<TripSelection, MatchError> {
    let stops = LinearScan::new(timetable.stops);
    disambiguate_trip_with(&stops, timetable, route_code, fix, rule, comparison)
}

/// Same as [`disambiguate_trip`] with a caller-provided search over the
/// timetable's stops.
pub fn disambiguate_trip_with(
    stop_search: &dyn NearestSearch,
    timetable: Timetable<'_>,
    route_code: &RouteCode,
    fix: Fix,
    rule: &RouteFamilyRule,
    comparison: TimeComparison,
) -> Result<TripSelection, MatchError> {
    let candidates = candidate_ranks(timetable.trips, route_code, rule);
    if candidates.is_empty() {
        return Err(MatchError::NoRouteMatch(route_code.clone()));
    }

    let nearest = stop_search
        .nearest(fix.position)
        .ok_or(MatchError::EmptyDataset(Collection::Stops))?;
    let stop = timetable
        .stops
        .get(nearest.index)
        .ok_or(MatchError::EmptyDataset(Collection::Stops))?;
    debug!(
        stop_id = %stop.stop_id,
        distance_m = nearest.distance_m,
        candidates = candidates.len(),
        "nearest stop for candidate trips"
    );

    let mut best: Option<(Ranking, &StopTime, TimeOfDay)> = None;
    let mut unparsable = 0usize;
    for (row, stop_time) in timetable.stop_times.iter().enumerate() {
        if stop_time.stop_id != stop.stop_id {
            continue;
        }
        let Some(&candidate_rank) = candidates.get(stop_time.trip_id.as_str()) else {
            continue;
        };
        let Ok(departure) = stop_time.departure() else {
            unparsable += 1;
            continue;
        };
        let ranking = Ranking {
            delta_seconds: comparison.delta_seconds(departure, fix.time),
            candidate_rank,
            row,
        };
        if best.map_or(true, |(current, _, _)| ranking < current) {
            best = Some((ranking, stop_time, departure));
        }
    }
    if unparsable > 0 {
        debug!(
            stop_id = %stop.stop_id,
            unparsable,
            "ignored stop times with unparsable departure"
        );
    }

    let (ranking, stop_time, departure) = best.ok_or_else(|| MatchError::NoScheduleMatch {
        route_code: route_code.clone(),
        stop_id: stop.stop_id.clone(),
    })?;

    Ok(TripSelection {
        trip_id: stop_time.trip_id.clone(),
        stop_id: stop.stop_id.clone(),
        stop_distance_m: nearest.distance_m,
        scheduled_departure: departure,
        delta_seconds: ranking.delta_seconds,
        candidate_trips: candidates.len(),
    })
}

/// Trip ids of the route family, mapped to the position of their first
/// appearance in the trips table.
fn candidate_ranks<'a>(
    trips: &'a [Trip],
    route_code: &RouteCode,
    rule: &RouteFamilyRule,
) -> FxHashMap<&'a str, usize> {
    let mut ranks = FxHashMap::default();
    for (rank, trip) in trips
        .iter()
        .filter(|trip| rule.matches(&trip.shape_id, route_code))
        .enumerate()
    {
        ranks.entry(trip.trip_id.as_str()).or_insert(rank);
    }
    ranks
}
