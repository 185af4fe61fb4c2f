//! Utility functions for longitude wrapping, distances and 2-D segment tests

use geo::{Coord, Rect};

/// Mean Earth radius in meters (used for haversine distances)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Wrap a longitude into [-180, 180]
///
/// 180 stays 180 (and -180 stays -180) so the antimeridian is not flipped to the
/// other side when it is used as a bound.
#[inline]
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Round `value` up to the next multiple of `step`
#[inline]
pub fn round_up(value: f64, step: f64) -> f64 {
    (value / step).ceil() * step
}

/// Great-circle distance between two lat/lon positions in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Check whether two closed intervals overlap
#[inline]
pub fn ranges_overlap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> bool {
    a_min <= b_max && a_max >= b_min
}

/// Check whether two rectangles overlap (edges touching counts as overlap)
#[inline]
pub fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    ranges_overlap(a.min().x, a.max().x, b.min().x, b.max().x)
        && ranges_overlap(a.min().y, a.max().y, b.min().y, b.max().y)
}

/// Intersect segment p1-p2 with segment p3-p4
///
/// Returns the parameter `t` along p1-p2 (0 at p1, 1 at p2) of the crossing point, or
/// `None` if the segments do not cross. Parallel segments never report a crossing.
pub fn segment_intersection(
    p1: Coord<f64>,
    p2: Coord<f64>,
    p3: Coord<f64>,
    p4: Coord<f64>,
) -> Option<f64> {
    let r = Coord {
        x: p2.x - p1.x,
        y: p2.y - p1.y,
    };
    let s = Coord {
        x: p4.x - p3.x,
        y: p4.y - p3.y,
    };
    let denom = cross(r, s);
    if denom.abs() < f64::EPSILON {
        return None;
    }

    let qp = Coord {
        x: p3.x - p1.x,
        y: p3.y - p1.y,
    };
    let t = cross(qp, s) / denom;
    let u = cross(qp, r) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}

/// 2-D cross product (z component)
#[inline]
fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}
