//! Great-circle distance between coordinates.

use beacon_common::types::GeoPoint;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two points given in degrees.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// [`distance_km`] over [`GeoPoint`]s.
pub fn between(a: GeoPoint, b: GeoPoint) -> f64 {
    distance_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Human-readable distance for notification bodies: metres below 1 km,
/// otherwise kilometres with one decimal.
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{} m", (km * 1000.0).round() as i64)
    } else {
        format!("{:.1} km", km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_zero_distance_to_self() {
        for (lat, lon) in [(0.0, 0.0), (37.0, -122.0), (-89.9, 179.9), (51.5, -0.12)] {
            assert!(distance_km(lat, lon, lat, lon).abs() < EPSILON);
        }
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ((37.0, -122.0), (37.1, -122.2)),
            ((0.0, 179.5), (0.0, -179.5)),
            ((-33.87, 151.21), (51.51, -0.13)),
        ];
        for ((a_lat, a_lon), (b_lat, b_lon)) in pairs {
            let ab = distance_km(a_lat, a_lon, b_lat, b_lon);
            let ba = distance_km(b_lat, b_lon, a_lat, a_lon);
            assert!((ab - ba).abs() < EPSILON);
        }
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = distance_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_crosses_antimeridian() {
        let d = distance_km(0.0, 179.5, 0.0, -179.5);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_antipodal_points() {
        let d = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.4321), "432 m");
        assert_eq!(format_distance(2.0), "2.0 km");
        assert_eq!(format_distance(12.345), "12.3 km");
    }
}
