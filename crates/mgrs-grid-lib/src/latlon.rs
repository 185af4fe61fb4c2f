//! Fixed-step parallels and meridians for the degree display modes

use crate::format::{latitude_label, longitude_label, AngleFormat};
use crate::frame::{DrawContext, DrawList};
use crate::geodesy::GeoPoint;
use crate::label::{place_label, LabelKind, LabelRequest};
use crate::utils::round_up;
use crate::viewport::Viewport;

/// Whether a line runs east-west or north-south
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Parallel,
    Meridian,
}

/// One parallel or meridian clipped to the view
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    pub kind: LineKind,
    /// Latitude of a parallel or (unwrapped) longitude of a meridian
    pub value: f64,
    /// Polyline from west to east or south to north
    pub points: Vec<GeoPoint>,
}

impl GridLine {
    fn label_text(&self, format: AngleFormat) -> String {
        match self.kind {
            LineKind::Parallel => latitude_label(self.value, format),
            LineKind::Meridian => longitude_label(self.value, format),
        }
    }

    fn label_kind(&self) -> LabelKind {
        match self.kind {
            LineKind::Parallel => LabelKind::Parallel,
            LineKind::Meridian => LabelKind::Meridian,
        }
    }
}

/// Line spacing in degrees for a map resolution in meters per pixel
pub fn step_for_resolution(meters_per_pixel: f64) -> f64 {
    if meters_per_pixel > 6000.0 {
        10.0
    } else if meters_per_pixel >= 3000.0 {
        6.0
    } else if meters_per_pixel > 250.0 {
        3.0
    } else {
        1.0
    }
}

/// Points from `from` to `to`, split into chords no longer than `max_chord` degrees
fn tessellate(from: f64, to: f64, max_chord: Option<f64>, point: impl Fn(f64) -> GeoPoint) -> Vec<GeoPoint> {
    let segments = match max_chord {
        Some(chord) if chord > 0.0 => (((to - from) / chord).ceil() as usize).max(1),
        _ => 1,
    };
    (0..=segments)
        .map(|i| point(from + (to - from) * i as f64 / segments as f64))
        .collect()
}

/// Parallels and meridians every `step` degrees across the view
///
/// `max_chord` splits lines for projections where straight lat/lon chords would cut
/// through the globe.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn generate_lines(viewport: &Viewport, step: f64, max_chord: Option<f64>) -> Vec<GridLine> {
    let south = viewport.south.max(-90.0);
    let north = viewport.north.min(90.0);
    let (west, east) = (viewport.west_unwrapped, viewport.east_unwrapped);
    let mut lines = Vec::new();
    if step <= 0.0 || north < south || east < west {
        return lines;
    }

    let mut lat = round_up(south, step);
    while lat <= north {
        lines.push(GridLine {
            kind: LineKind::Parallel,
            value: lat,
            points: tessellate(west, east, max_chord, |lon| GeoPoint::new(lat, lon)),
        });
        lat += step;
    }

    let mut lon = round_up(west, step);
    while lon <= east {
        lines.push(GridLine {
            kind: LineKind::Meridian,
            value: lon,
            points: tessellate(south, north, max_chord, |lat| GeoPoint::new(lat, lon)),
        });
        lon += step;
    }

    lines
}

/// Emit lat/lon lines and their labels for one pass
pub(crate) fn draw(ctx: &DrawContext<'_>, format: AngleFormat, out: &mut DrawList) {
    let viewport = ctx.viewport;
    let step = step_for_resolution(viewport.draw_resolution);
    let chord = viewport.globe.then_some(ctx.config.globe_chord_degrees);
    let lines = generate_lines(viewport, step, chord);
    tracing::trace!(step, lines = lines.len(), "Lat/lon grid");

    if ctx.labels_enabled() {
        for line in &lines {
            let placed = line.points.windows(2).find_map(|chord| {
                place_label(&chord[0], &chord[1], ctx.projector, &viewport.screen)
                    .map(|weight| (chord[0], chord[1], weight))
            });
            if let Some((start, end, weight)) = placed {
                out.labels.push(LabelRequest::new(
                    line.label_text(format),
                    line.label_kind(),
                    start,
                    end,
                    weight,
                ));
            }
        }
    }
    if ctx.lines_enabled() {
        out.lines.extend(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_for_resolution() {
        assert_eq!(step_for_resolution(10_000.0), 10.0);
        assert_eq!(step_for_resolution(6000.0), 6.0);
        assert_eq!(step_for_resolution(3000.0), 6.0);
        assert_eq!(step_for_resolution(2999.0), 3.0);
        assert_eq!(step_for_resolution(1000.0), 3.0);
        assert_eq!(step_for_resolution(251.0), 3.0);
        assert_eq!(step_for_resolution(250.0), 1.0);
        assert_eq!(step_for_resolution(5.0), 1.0);
    }

    #[test]
    fn test_generate_lines() {
        let viewport = Viewport::new(-4.5, 1.5, 4.5, 7.0);
        let lines = generate_lines(&viewport, 3.0, None);
        let parallels: Vec<f64> = lines
            .iter()
            .filter(|l| l.kind == LineKind::Parallel)
            .map(|l| l.value)
            .collect();
        let meridians: Vec<f64> = lines
            .iter()
            .filter(|l| l.kind == LineKind::Meridian)
            .map(|l| l.value)
            .collect();
        assert_eq!(parallels, vec![-3.0, 0.0, 3.0]);
        assert_eq!(meridians, vec![3.0, 6.0]);
        for line in &lines {
            assert_eq!(line.points.len(), 2);
        }
    }

    #[test]
    fn test_globe_tessellation() {
        let viewport = Viewport::new(-30.0, -30.0, 30.0, 30.0);
        let lines = generate_lines(&viewport, 10.0, Some(6.0));
        let equator = lines
            .iter()
            .find(|l| l.kind == LineKind::Parallel && l.value == 0.0)
            .unwrap();
        // 60° split into 6° chords
        assert_eq!(equator.points.len(), 11);
        for pair in equator.points.windows(2) {
            assert!(pair[1].longitude - pair[0].longitude <= 6.0 + 1e-9);
        }
    }

    #[test]
    fn test_meridians_across_antimeridian() {
        let viewport = Viewport::new(0.0, 175.0, 5.0, -175.0);
        let lines = generate_lines(&viewport, 1.0, None);
        let meridians: Vec<f64> = lines
            .iter()
            .filter(|l| l.kind == LineKind::Meridian)
            .map(|l| l.value)
            .collect();
        assert_eq!(meridians.len(), 11);
        assert!(meridians.contains(&180.0));
        assert_eq!(longitude_label(184.0, AngleFormat::Decimal), "W 176°");
    }
}
