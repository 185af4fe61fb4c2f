//! Screen-space placement of grid-line labels
//!
//! Labels ride on a grid edge and are pushed to where that edge enters the view across
//! the top or left screen border, so they stay readable while panning.

use crate::geodesy::GeoPoint;
use crate::utils::segment_intersection;
use crate::viewport::{ScreenProjector, ScreenRect};
use geo::Coord;

/// What a label annotates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Easting value on a cell's west edge
    Easting,
    /// Northing value on a cell's south edge
    Northing,
    /// Centred zone descriptor
    Zone,
    Parallel,
    Meridian,
}

/// A label to draw: text anchored at `weight` along the geodetic segment `start`-`end`
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRequest {
    pub text: String,
    pub kind: LabelKind,
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// 0 = at `start`, 1 = at `end`
    pub weight: f64,
}

impl LabelRequest {
    pub fn new(
        text: impl Into<String>,
        kind: LabelKind,
        start: GeoPoint,
        end: GeoPoint,
        weight: f64,
    ) -> Self {
        Self {
            text: text.into(),
            kind,
            start,
            end,
            weight,
        }
    }

    /// Geodetic anchor position (linear in lat/lon)
    pub fn anchor(&self) -> GeoPoint {
        let lerp = |a: f64, b: f64| a + (b - a) * self.weight;
        GeoPoint::new(
            lerp(self.start.latitude, self.end.latitude),
            lerp(self.start.longitude, self.end.longitude),
        )
    }
}

/// Where along `start`-`end` a label should sit, or `None` if the edge is not usable
///
/// The projected edge is intersected with the top and then the left screen border; the
/// top border wins when both are crossed. Edges crossing neither border get no label,
/// including edges lying entirely on screen.
pub fn place_label(
    start: &GeoPoint,
    end: &GeoPoint,
    projector: &dyn ScreenProjector,
    screen: &ScreenRect,
) -> Option<f64> {
    let a = projector.forward(start)?;
    let b = projector.forward(end)?;

    let top = segment_intersection(
        a,
        b,
        Coord {
            x: screen.left,
            y: screen.top,
        },
        Coord {
            x: screen.right,
            y: screen.top,
        },
    );
    top.or_else(|| {
        segment_intersection(
            a,
            b,
            Coord {
                x: screen.left,
                y: screen.top,
            },
            Coord {
                x: screen.left,
                y: screen.bottom,
            },
        )
    })
}
