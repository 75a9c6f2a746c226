use serde::Serialize;
use tracing::debug;

use tripmatch_model::{Coordinate, RouteCode, ShapePoint};

use crate::config::RouteFamilyRule;
use crate::error::Collection;
use crate::nearest::{LinearScan, NearestSearch};
use crate::MatchError;

/// The shape point nearest a fix and the route family it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLocation {
    pub route_code: RouteCode,
    pub shape_id: String,
    pub shape_index: usize,
    pub distance_m: f64,
}

/// Finds the route family of the shape point nearest `fix` by linear scan.
pub fn locate_route(
    shapes: &[ShapePoint],
    fix: Coordinate,
    rule: &RouteFamilyRule,
) -> Result<RouteLocation, MatchError> {
    locate_route_with(&LinearScan::new(shapes), shapes, fix, rule)
}

/// Same as [`locate_route`] with a caller-provided search over `shapes`.
pub fn locate_route_with(
    search: &dyn NearestSearch,
    shapes: &[ShapePoint],
    fix: Coordinate,
    rule: &RouteFamilyRule,
) -> Result<RouteLocation, MatchError> {
    let nearest = search
        .nearest(fix)
        .ok_or(MatchError::EmptyDataset(Collection::Shapes))?;
    let shape = shapes
        .get(nearest.index)
        .ok_or(MatchError::EmptyDataset(Collection::Shapes))?;

    let route_code = rule.route_code(&shape.shape_id);
    debug!(
        shape_id = %shape.shape_id,
        route_code = %route_code,
        distance_m = nearest.distance_m,
        "located nearest shape point"
    );
    Ok(RouteLocation {
        route_code,
        shape_id: shape.shape_id.clone(),
        shape_index: nearest.index,
        distance_m: nearest.distance_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::hubeny_distance;
    use crate::nearest::SpatialIndex;

    fn shape(id: &str, lat: f64, lon: f64, sequence: i32) -> ShapePoint {
        ShapePoint {
            shape_id: id.to_string(),
            position: Coordinate::new(lat, lon),
            sequence,
        }
    }

    fn sample_shapes() -> Vec<ShapePoint> {
        vec![
            shape("01-A", 34.860, 137.150, 1),
            shape("01-A", 34.862, 137.152, 2),
            shape("02-B", 34.870, 137.170, 1),
            shape("02-B", 34.872, 137.172, 2),
            shape("03-C", 34.880, 137.140, 1),
        ]
    }

    #[test]
    fn empty_shapes_is_empty_dataset() {
        let err = locate_route(&[], Coordinate::new(34.0, 137.0), &RouteFamilyRule::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::EmptyDataset(Collection::Shapes)));
    }

    #[test]
    fn returns_prefix_of_nearest_shape() {
        let shapes = sample_shapes();
        let location = locate_route(
            &shapes,
            Coordinate::new(34.8715, 137.1712),
            &RouteFamilyRule::default(),
        )
        .unwrap();
        assert_eq!(location.route_code, "02");
        assert_eq!(location.shape_id, "02-B");
        assert_eq!(location.shape_index, 3);
    }

    #[test]
    fn located_point_is_no_farther_than_any_other() {
        let shapes = sample_shapes();
        let fix = Coordinate::new(34.866, 137.158);
        let location = locate_route(&shapes, fix, &RouteFamilyRule::default()).unwrap();
        for point in &shapes {
            assert!(location.distance_m <= hubeny_distance(fix, point.position));
        }
    }

    #[test]
    fn first_of_equidistant_points_wins() {
        let shapes = vec![
            shape("05-X", 34.0, 137.0, 1),
            shape("06-Y", 34.0, 137.0, 1),
        ];
        let location = locate_route(
            &shapes,
            Coordinate::new(34.0, 137.0),
            &RouteFamilyRule::default(),
        )
        .unwrap();
        assert_eq!(location.route_code, "05");
    }

    #[test]
    fn honours_configured_rule() {
        let shapes = sample_shapes();
        let location = locate_route(
            &shapes,
            Coordinate::new(34.880, 137.140),
            &RouteFamilyRule::Delimited { separator: '-' },
        )
        .unwrap();
        assert_eq!(location.route_code, "03");

        let location = locate_route(
            &shapes,
            Coordinate::new(34.880, 137.140),
            &RouteFamilyRule::ShapeId,
        )
        .unwrap();
        assert_eq!(location.route_code, "03-C");
    }

    #[test]
    fn index_backed_search_locates_same_route() {
        let shapes = sample_shapes();
        let index = SpatialIndex::build(&shapes);
        let fix = Coordinate::new(34.8605, 137.1505);
        let linear = locate_route(&shapes, fix, &RouteFamilyRule::default()).unwrap();
        let indexed =
            locate_route_with(&index, &shapes, fix, &RouteFamilyRule::default()).unwrap();
        assert_eq!(linear, indexed);
    }
}
