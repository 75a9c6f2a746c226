use rstar::{PointDistance, RTree, RTreeObject, AABB};

use tripmatch_model::{Coordinate, ShapePoint, Stop};

use crate::geodesy::hubeny_distance;

/// Relative margin added to the projected search radius before re-ranking.
/// Covers the gap between the local projection and Hubeny's radii of
/// curvature, which stays far below this at city scale.
const RADIUS_SLACK: f64 = 0.05;

/// Largest relative drift between the projection's longitude scale and
/// `cos(latitude)` anywhere between the data and the query. Together with the
/// meridian/prime-vertical ratio (under 0.7%) this keeps the squared
/// distortion inside `RADIUS_SLACK`.
const MAX_SCALE_DRIFT: f64 = 0.015;

pub trait Positioned {
    fn position(&self) -> Coordinate;
}

impl Positioned for ShapePoint {
    fn position(&self) -> Coordinate {
        self.position
    }
}

impl Positioned for Stop {
    fn position(&self) -> Coordinate {
        self.position
    }
}

impl Positioned for Coordinate {
    fn position(&self) -> Coordinate {
        *self
    }
}

/// Position of the winning entity within the searched slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    pub index: usize,
    pub distance_m: f64,
}

pub trait NearestSearch {
    /// `None` only when there is nothing to search.
    fn nearest(&self, target: Coordinate) -> Option<Nearest>;
}

pub struct LinearScan<'a, T> {
    items: &'a [T],
}

impl<'a, T: Positioned> LinearScan<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self { items }
    }
}

impl<T: Positioned> NearestSearch for LinearScan<'_, T> {
    fn nearest(&self, target: Coordinate) -> Option<Nearest> {
        let mut best: Option<Nearest> = None;
        for (index, item) in self.items.iter().enumerate() {
            let distance_m = hubeny_distance(target, item.position());
            match best {
                Some(current) if current.distance_m <= distance_m => {}
                _ => best = Some(Nearest { index, distance_m }),
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    index: usize,
    projected: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.projected)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.projected[0] - point[0];
        let dy = self.projected[1] - point[1];
        dx * dx + dy * dy
    }
}

/// R-tree over an equirectangular projection centred on the data.
///
/// One longitude scale is used for the whole projection, so answers are only
/// guaranteed to equal [`LinearScan`] while the data and the query stay within
/// a narrow band of latitudes (about two degrees at mid latitudes). Outside
/// that band the query falls back to a linear scan of the same points.
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
    positions: Vec<Coordinate>,
    lon_scale: f64,
    min_latitude: f64,
    max_latitude: f64,
}

impl SpatialIndex {
    pub fn build<T: Positioned>(items: &[T]) -> Self {
        let positions: Vec<Coordinate> = items.iter().map(Positioned::position).collect();
        let lon_scale = if positions.is_empty() {
            1.0
        } else {
            let mean_lat =
                positions.iter().map(|p| p.latitude).sum::<f64>() / positions.len() as f64;
            mean_lat.to_radians().cos()
        };
        let (min_latitude, max_latitude) = positions.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), p| (lo.min(p.latitude), hi.max(p.latitude)),
        );

        let mut index = Self {
            tree: RTree::new(),
            positions,
            lon_scale,
            min_latitude,
            max_latitude,
        };
        let points: Vec<IndexedPoint> = index
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| IndexedPoint {
                index: i,
                projected: index.project(*position),
            })
            .collect();
        index.tree = RTree::bulk_load(points);
        index
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn project(&self, position: Coordinate) -> [f64; 2] {
        [position.longitude * self.lon_scale, position.latitude]
    }

    /// Whether the single longitude scale is close enough to `cos(latitude)`
    /// over the band spanned by the data and `latitude`.
    fn projection_holds(&self, latitude: f64) -> bool {
        let lo = self.min_latitude.min(latitude);
        let hi = self.max_latitude.max(latitude);
        let cos_lo = lo.to_radians().cos();
        let cos_hi = hi.to_radians().cos();
        let cos_max = if lo <= 0.0 && hi >= 0.0 {
            1.0
        } else {
            cos_lo.max(cos_hi)
        };
        let cos_min = cos_lo.min(cos_hi);
        cos_min > 0.0
            && cos_max <= self.lon_scale * (1.0 + MAX_SCALE_DRIFT)
            && self.lon_scale <= cos_min * (1.0 + MAX_SCALE_DRIFT)
    }
}

impl NearestSearch for SpatialIndex {
    fn nearest(&self, target: Coordinate) -> Option<Nearest> {
        if !self.projection_holds(target.latitude) {
            return LinearScan::new(&self.positions).nearest(target);
        }
        let query = self.project(target);
        let seed = self.tree.nearest_neighbor_iter(&query).next()?;
        let radius = seed.distance_2(&query).sqrt() * (1.0 + RADIUS_SLACK);
        // A zero radius still has to collect exact duplicates of the seed.
        let radius_2 = (radius * radius).max(f64::EPSILON);

        let mut best: Option<Nearest> = None;
        for candidate in self.tree.locate_within_distance(query, radius_2) {
            let distance_m = hubeny_distance(target, self.positions[candidate.index]);
            let better = match best {
                None => true,
                Some(current) => {
                    distance_m < current.distance_m
                        || (distance_m == current.distance_m && candidate.index < current.index)
                }
            };
            if better {
                best = Some(Nearest {
                    index: candidate.index,
                    distance_m,
                });
            }
        }
        best
    }
}
