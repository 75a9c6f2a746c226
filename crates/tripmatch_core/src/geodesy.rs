//! Hubeny distance on GRS80, valid at city scale.

use tripmatch_model::Coordinate;

/// GRS80 equatorial radius in meters.
pub const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
/// GRS80 first eccentricity.
pub const ECCENTRICITY: f64 = 0.081_819_191_042_815_8;

const E2: f64 = ECCENTRICITY * ECCENTRICITY;

/// Distance between two coordinates in meters.
pub fn hubeny_distance(a: Coordinate, b: Coordinate) -> f64 {
    let dx = (b.longitude - a.longitude).to_radians();
    let dy = (b.latitude - a.latitude).to_radians();
    let mean_lat = ((a.latitude + b.latitude) / 2.0).to_radians();

    let sin_lat = mean_lat.sin();
    let w = (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let meridian = EQUATORIAL_RADIUS * (1.0 - E2) / w.powi(3);
    let prime_vertical = EQUATORIAL_RADIUS / w;

    let north = dy * meridian;
    let east = dx * prime_vertical * mean_lat.cos();
    (north * north + east * east).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    #[test]
    fn identical_points_are_zero_apart() {
        let p = coord(34.8636752, 137.1621358);
        assert_eq!(hubeny_distance(p, p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let samples = [
            (coord(34.8636752, 137.1621358), coord(34.9551, 137.1467)),
            (coord(35.681236, 139.767125), coord(35.689487, 139.691706)),
            (coord(-33.8688, 151.2093), coord(-33.8568, 151.2153)),
            (coord(0.0, 0.0), coord(0.01, -0.01)),
        ];
        for (a, b) in samples {
            assert_eq!(hubeny_distance(a, b), hubeny_distance(b, a));
        }
    }

    #[test]
    fn one_arc_second_of_latitude_is_about_thirty_meters() {
        let a = coord(35.0, 137.0);
        let b = coord(35.0 + 1.0 / 3600.0, 137.0);
        let d = hubeny_distance(a, b);
        assert!((d - 30.82).abs() < 0.05, "got {d}");
    }

    #[test]
    fn tokyo_to_shinjuku_matches_reference_value() {
        // Tokyo station to Shinjuku station, roughly 6.9 km.
        let tokyo = coord(35.681236, 139.767125);
        let shinjuku = coord(35.689487, 139.691706);
        let d = hubeny_distance(tokyo, shinjuku);
        assert!((d - 6_888.0).abs() < 20.0, "got {d}");
    }

    #[test]
    fn longitude_degree_shrinks_towards_poles() {
        let equator = hubeny_distance(coord(0.0, 0.0), coord(0.0, 0.01));
        let north = hubeny_distance(coord(60.0, 0.0), coord(60.0, 0.01));
        assert!(north < equator);
        assert!((north / equator - 0.5).abs() < 0.01);
    }
}
