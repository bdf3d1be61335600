//! Geohash encoding and radius query planning.
//!
//! Worker rows carry a geohash so the store can answer proximity queries with
//! plain prefix matches. A radius query becomes up to nine prefixes: the cell
//! holding the center and its eight neighbours, at the finest precision whose
//! cells are still at least as large as the radius. That over-fetches points
//! in the cell corners, so callers must re-filter by exact distance.

use std::f64::consts::PI;

use beacon_common::types::GeoPoint;

use crate::distance::EARTH_RADIUS_KM;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision of the geohash stored on every worker row (~4.8 m x 4.8 m cells).
pub const STORED_PRECISION: usize = 9;

const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * PI / 180.0;

/// Slack on the radius when sizing cells; flat cell extents slightly
/// underestimate spherical offsets away from the equator.
const RADIUS_MARGIN: f64 = 1.02;

/// Encode `point` as a geohash of `precision` characters.
pub fn encode(point: GeoPoint, precision: usize) -> String {
    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
    let (mut lon_lo, mut lon_hi) = (-180.0_f64, 180.0_f64);

    let mut hash = String::with_capacity(precision);
    let mut bits = 0usize;
    let mut bit_count = 0;
    let mut is_lon = true;

    while hash.len() < precision {
        let (value, lo, hi) = if is_lon {
            (point.longitude, &mut lon_lo, &mut lon_hi)
        } else {
            (point.latitude, &mut lat_lo, &mut lat_hi)
        };

        let mid = (*lo + *hi) / 2.0;
        bits <<= 1;
        if value >= mid {
            bits |= 1;
            *lo = mid;
        } else {
            *hi = mid;
        }

        is_lon = !is_lon;
        bit_count += 1;
        if bit_count == 5 {
            hash.push(BASE32[bits] as char);
            bits = 0;
            bit_count = 0;
        }
    }

    hash
}

/// Height and width in degrees of a cell at `precision`.
fn cell_size_degrees(precision: usize) -> (f64, f64) {
    let total_bits = 5 * precision as i32;
    let lon_bits = (total_bits + 1) / 2;
    let lat_bits = total_bits / 2;
    (180.0 / 2f64.powi(lat_bits), 360.0 / 2f64.powi(lon_bits))
}

fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Geohash prefixes that together cover every point within `radius_km` of
/// `center`.
///
/// Returns a single empty prefix (match everything) when the circle reaches
/// a pole or no precision has cells large enough.
pub fn query_prefixes(center: GeoPoint, radius_km: f64) -> Vec<String> {
    let full_scan = vec![String::new()];

    let radius_km = radius_km * RADIUS_MARGIN;
    let poleward = center.latitude.abs() + radius_km / KM_PER_DEGREE;
    if poleward >= 90.0 {
        return full_scan;
    }
    let lon_km_per_degree = KM_PER_DEGREE * poleward.to_radians().cos();

    let precision = (1..=STORED_PRECISION).rev().find(|&p| {
        let (height, width) = cell_size_degrees(p);
        height * KM_PER_DEGREE >= radius_km && width * lon_km_per_degree >= radius_km
    });
    let Some(precision) = precision else {
        return full_scan;
    };

    let (height, width) = cell_size_degrees(precision);
    let mut prefixes = Vec::with_capacity(9);
    for dy in [-1.0, 0.0, 1.0] {
        for dx in [-1.0, 0.0, 1.0] {
            let neighbour = GeoPoint::new(
                (center.latitude + dy * height).clamp(-90.0, 90.0),
                wrap_longitude(center.longitude + dx * width),
            );
            let hash = encode(neighbour, precision);
            if !prefixes.contains(&hash) {
                prefixes.push(hash);
            }
        }
    }

    prefixes
}
