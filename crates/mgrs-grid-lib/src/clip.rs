//! Sutherland-Hodgman clipping of grid quads against lat/lon rectangles
//!
//! Longitude is the X axis and latitude the Y axis. There is no antimeridian handling
//! here: callers pass subject and rectangle in one consistent longitude range.

use crate::geodesy::GeoPoint;
use geo::{Coord, Rect};
use smallvec::SmallVec;
use std::sync::Arc;

/// Default clip tolerance in degrees
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Result of a clip: a convex polygon, or fewer than 3 points for an empty intersection
///
/// Clipping a quad against four half-planes yields at most 8 vertices, so the points
/// live inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    points: SmallVec<[GeoPoint; 8]>,
}

impl Polygon {
    pub fn from_points(points: impl IntoIterator<Item = GeoPoint>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fewer than 3 vertices: the subject and the rectangle do not overlap in area
    pub fn is_empty_intersection(&self) -> bool {
        self.points.len() < 3
    }

    /// Lat/lon bounding box (x = longitude, y = latitude)
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let first = self.points.first()?;
        let (mut min, mut max) = (first.coord(), first.coord());
        for p in &self.points[1..] {
            min.x = min.x.min(p.longitude);
            min.y = min.y.min(p.latitude);
            max.x = max.x.max(p.longitude);
            max.y = max.y.max(p.latitude);
        }
        Some(Rect::new(min, max))
    }

    /// Planar area in square degrees (shoelace)
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.longitude * b.latitude - b.longitude * a.latitude
            })
            .sum();
        (twice / 2.0).abs()
    }

    /// Freeze into a shared slice for storage in a cell
    pub fn into_shared(self) -> Arc<[GeoPoint]> {
        Arc::from(self.points.into_vec())
    }
}

#[derive(Clone, Copy)]
enum Edge {
    West(f64),
    East(f64),
    South(f64),
    North(f64),
}

impl Edge {
    fn inside(self, p: &GeoPoint, epsilon: f64) -> bool {
        match self {
            Edge::West(x) => p.longitude >= x - epsilon,
            Edge::East(x) => p.longitude <= x + epsilon,
            Edge::South(y) => p.latitude >= y - epsilon,
            Edge::North(y) => p.latitude <= y + epsilon,
        }
    }

    /// Crossing of segment a-b with the edge line
    fn intersect(self, a: &GeoPoint, b: &GeoPoint) -> GeoPoint {
        let t = match self {
            Edge::West(x) | Edge::East(x) => (x - a.longitude) / (b.longitude - a.longitude),
            Edge::South(y) | Edge::North(y) => (y - a.latitude) / (b.latitude - a.latitude),
        };
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let (lat, lon) = match self {
            Edge::West(x) | Edge::East(x) => (a.latitude + t * (b.latitude - a.latitude), x),
            Edge::South(y) | Edge::North(y) => (y, a.longitude + t * (b.longitude - a.longitude)),
        };
        let elevation = match (a.elevation, b.elevation) {
            (Some(ea), Some(eb)) => Some(ea + t * (eb - ea)),
            _ => None,
        };
        GeoPoint::new(lat, lon).with_elevation(elevation)
    }
}

fn nearly_equal(a: &GeoPoint, b: &GeoPoint, epsilon: f64) -> bool {
    (a.latitude - b.latitude).abs() <= epsilon && (a.longitude - b.longitude).abs() <= epsilon
}

/// Clip a quad (or any convex ring) against `rect`
///
/// Points within `epsilon` of an edge count as inside, so quads sharing an edge with
/// the rectangle are kept whole. Elevation is interpolated on cut edges when both
/// endpoints carry one.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn clip(subject: &[GeoPoint], rect: &Rect<f64>, epsilon: f64) -> Polygon {
    let edges = [
        Edge::West(rect.min().x),
        Edge::East(rect.max().x),
        Edge::South(rect.min().y),
        Edge::North(rect.max().y),
    ];

    let mut output: SmallVec<[GeoPoint; 8]> = subject.iter().copied().collect();
    for edge in edges {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut previous = input[input.len() - 1];
        for current in input {
            let current_in = edge.inside(&current, epsilon);
            let previous_in = edge.inside(&previous, epsilon);
            if current_in {
                if !previous_in {
                    output.push(edge.intersect(&previous, &current));
                }
                output.push(current);
            } else if previous_in {
                output.push(edge.intersect(&previous, &current));
            }
            previous = current;
        }
    }

    // Drop the near-duplicates produced when a vertex sits on an edge
    let mut points: SmallVec<[GeoPoint; 8]> = SmallVec::with_capacity(output.len());
    for p in output {
        if points.last().is_none_or(|last| !nearly_equal(last, &p, epsilon)) {
            points.push(p);
        }
    }
    while points.len() > 1 && nearly_equal(&points[0], &points[points.len() - 1], epsilon) {
        points.pop();
    }

    Polygon { points }
}

/// Build a rectangle from south/west/north/east degrees
#[inline]
pub fn lat_lon_rect(south: f64, west: f64, north: f64, east: f64) -> Rect<f64> {
    Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(south: f64, west: f64, north: f64, east: f64) -> [GeoPoint; 4] {
        [
            GeoPoint::new(south, west),
            GeoPoint::new(north, west),
            GeoPoint::new(north, east),
            GeoPoint::new(south, east),
        ]
    }

    #[test]
    fn test_inside_quad_is_unchanged() {
        let subject = quad(1.0, 1.0, 2.0, 2.0);
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 8.0, 6.0), DEFAULT_EPSILON);
        assert_eq!(result.points(), &subject[..]);
    }

    #[test]
    fn test_quad_on_boundary_is_kept_whole() {
        let subject = quad(0.0, 0.0, 1.0, 1.0);
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 8.0, 6.0), DEFAULT_EPSILON);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_partial_overlap() {
        let subject = quad(-1.0, -1.0, 1.0, 1.0);
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 8.0, 6.0), DEFAULT_EPSILON);
        assert_eq!(result.len(), 4);
        assert!((result.area() - 1.0).abs() < 1e-12);
        let bounds = result.bounds().unwrap();
        assert_eq!(bounds.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), Coord { x: 1.0, y: 1.0 });
    }

    #[test]
    fn test_disjoint_is_empty_intersection() {
        let subject = quad(10.0, 10.0, 11.0, 11.0);
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 8.0, 6.0), DEFAULT_EPSILON);
        assert!(result.is_empty_intersection());
        assert_eq!(result.area(), 0.0);
    }

    #[test]
    fn test_touching_edge_is_degenerate() {
        // Shares only the line lon = 6
        let subject = quad(1.0, 6.0, 2.0, 7.0);
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 8.0, 6.0), DEFAULT_EPSILON);
        assert!(result.is_empty_intersection());
    }

    #[test]
    fn test_rotated_quad_gains_vertices() {
        // A diamond poking out of all four sides becomes an octagon
        let subject = [
            GeoPoint::new(-1.0, 3.0),
            GeoPoint::new(4.0, -2.0),
            GeoPoint::new(9.0, 3.0),
            GeoPoint::new(4.0, 8.0),
        ];
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 8.0, 6.0), DEFAULT_EPSILON);
        assert_eq!(result.len(), 8);
        for p in result.points() {
            assert!(p.latitude >= -DEFAULT_EPSILON && p.latitude <= 8.0 + DEFAULT_EPSILON);
            assert!(p.longitude >= -DEFAULT_EPSILON && p.longitude <= 6.0 + DEFAULT_EPSILON);
        }
    }

    #[test]
    fn test_superset_rect_never_shrinks_result() {
        let subject = [
            GeoPoint::new(-1.0, 3.0),
            GeoPoint::new(4.0, -2.0),
            GeoPoint::new(9.0, 3.0),
            GeoPoint::new(4.0, 8.0),
        ];
        let rects = [
            lat_lon_rect(2.0, 2.0, 4.0, 4.0),
            lat_lon_rect(1.0, 1.0, 6.0, 5.0),
            lat_lon_rect(0.0, 0.0, 8.0, 6.0),
            lat_lon_rect(-5.0, -5.0, 15.0, 15.0),
        ];
        let mut previous_area = 0.0;
        for rect in &rects {
            let result = clip(&subject, rect, DEFAULT_EPSILON);
            assert!(!result.is_empty_intersection());
            let area = result.area();
            assert!(area + 1e-12 >= previous_area, "{area} < {previous_area}");
            previous_area = area;
        }
        // The last rectangle contains the whole diamond
        assert!((previous_area - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_elevation_is_interpolated() {
        let subject = [
            GeoPoint::new(0.0, -2.0).with_elevation(Some(0.0)),
            GeoPoint::new(1.0, -2.0).with_elevation(Some(0.0)),
            GeoPoint::new(1.0, 2.0).with_elevation(Some(100.0)),
            GeoPoint::new(0.0, 2.0).with_elevation(Some(100.0)),
        ];
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 1.0, 2.0), DEFAULT_EPSILON);
        let cut: Vec<_> = result
            .points()
            .iter()
            .filter(|p| p.longitude == 0.0)
            .collect();
        assert_eq!(cut.len(), 2);
        for p in cut {
            assert_eq!(p.elevation, Some(50.0));
        }
    }

    #[test]
    fn test_missing_elevation_stays_unknown() {
        let subject = [
            GeoPoint::new(0.0, -2.0).with_elevation(Some(10.0)),
            GeoPoint::new(1.0, -2.0),
            GeoPoint::new(1.0, 2.0).with_elevation(Some(10.0)),
            GeoPoint::new(0.0, 2.0),
        ];
        let result = clip(&subject, &lat_lon_rect(0.0, 0.0, 1.0, 2.0), DEFAULT_EPSILON);
        assert!(result
            .points()
            .iter()
            .filter(|p| p.longitude == 0.0)
            .all(|p| p.elevation.is_none()));
    }
}
