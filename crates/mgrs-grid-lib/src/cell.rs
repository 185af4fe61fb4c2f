//! Recursive MGRS grid cells
//!
//! A zone's top grid is a lattice of 100km squares. Each square lazily generates a 10x10
//! grid of 10km children on a background task when the view zooms in far enough, and so
//! on down to 10m. Until a child grid is ready the parent keeps drawing itself.
//!
//! Grid vertices are computed once per lattice point from integer UTM offsets, so
//! neighbouring cells share bit-identical corners and the lines meet without cracks.

use crate::clip::{self, Polygon};
use crate::executor::{CancelToken, TaskError, TaskState};
use crate::frame::{CellPrimitive, DrawContext, DrawList};
use crate::geodesy::{GeoPoint, MgrsReference, UtmPoint, GRID_SQUARE_METERS};
use crate::label::{place_label, LabelKind, LabelRequest};
use crate::utils::rects_overlap;
use crate::viewport::{pyramid_level, ElevationSource, Viewport};
use geo::{Coord, Rect};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cells per side of a sub-grid
pub const SUBDIVISIONS: usize = 10;

/// Description of a rectangular UTM lattice to generate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// UTM position of the south-west lattice vertex
    pub origin: UtmPoint,
    /// Cell size in meters
    pub resolution: f64,
    pub rows: usize,
    pub columns: usize,
    /// Zone bounds every cell is clipped against (x = longitude, y = latitude)
    pub clip_bounds: Rect<f64>,
}

impl GridSpec {
    /// 100km lattice covering a zone's UTM extent
    ///
    /// The extent is sampled at the west edge, central meridian and east edge of both
    /// the south and north bounds, which covers the zone since grid lines bow
    /// monotonically away from the central meridian.
    pub fn top_grid(zone_bounds: Rect<f64>, zone: u8, north: bool) -> Self {
        let (min, max) = (zone_bounds.min(), zone_bounds.max());
        let central = crate::geodesy::central_meridian(zone).clamp(min.x, max.x);

        let mut low = Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        };
        let mut high = Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        };
        for lat in [min.y, max.y] {
            for lon in [min.x, central, max.x] {
                let utm = UtmPoint::from_lat_lon_in_zone(lat, lon, zone, north);
                low.x = low.x.min(utm.easting);
                low.y = low.y.min(utm.northing);
                high.x = high.x.max(utm.easting);
                high.y = high.y.max(utm.northing);
            }
        }

        let step = GRID_SQUARE_METERS;
        let west = (low.x / step).floor() * step;
        let south = (low.y / step).floor() * step;
        let columns = (((high.x - west) / step).ceil() as usize).max(1);
        let rows = (((high.y - south) / step).ceil() as usize).max(1);

        Self {
            origin: UtmPoint {
                zone,
                north,
                easting: west,
                northing: south,
            },
            resolution: step,
            rows,
            columns,
            clip_bounds: zone_bounds,
        }
    }

    /// Next-finer 10x10 lattice over `cell`
    pub fn subdivide(cell: &GridCell) -> Self {
        Self::sub_grid(cell.origin, cell.resolution, cell.clip_bounds)
    }

    /// Next-finer 10x10 lattice over the cell of `resolution` meters whose SW corner is
    /// `origin`
    pub fn sub_grid(origin: UtmPoint, resolution: f64, zone_bounds: Rect<f64>) -> Self {
        Self {
            origin,
            resolution: resolution / SUBDIVISIONS as f64,
            rows: SUBDIVISIONS,
            columns: SUBDIVISIONS,
            clip_bounds: zone_bounds,
        }
    }

    fn vertex_index(&self, row: usize, column: usize) -> usize {
        row * (self.columns + 1) + column
    }
}

/// The cells generated for one lattice
#[derive(Debug, Default)]
pub struct ChildGrid {
    pub resolution: f64,
    pub cells: Vec<GridCell>,
}

impl ChildGrid {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter()
    }
}

/// Generate the 100km grid of a zone
pub fn generate_top_grid(
    zone_bounds: Rect<f64>,
    zone: u8,
    north: bool,
    token: &CancelToken,
) -> Result<ChildGrid, TaskError> {
    generate_grid(
        &GridSpec::top_grid(zone_bounds, zone, north),
        None,
        token,
        clip::DEFAULT_EPSILON,
    )
}

/// Generate the 10x10 children of the cell at `origin`
pub fn generate_sub_grid(
    origin: UtmPoint,
    resolution: f64,
    zone_bounds: Rect<f64>,
    token: &CancelToken,
) -> Result<ChildGrid, TaskError> {
    generate_grid(
        &GridSpec::sub_grid(origin, resolution, zone_bounds),
        None,
        token,
        clip::DEFAULT_EPSILON,
    )
}

/// Build every cell of `spec`, clipped against its zone
///
/// Runs on a worker. Cancellation is checked between lattice rows. Cells whose clipped
/// polygon has fewer than 3 vertices lie outside the zone and are dropped.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn generate_grid(
    spec: &GridSpec,
    elevation: Option<&dyn ElevationSource>,
    token: &CancelToken,
    epsilon: f64,
) -> Result<ChildGrid, TaskError> {
    // Lattice vertices, row-major from the south-west
    let mut vertices = Vec::with_capacity((spec.rows + 1) * (spec.columns + 1));
    for row in 0..=spec.rows {
        token.check()?;
        for column in 0..=spec.columns {
            let utm = spec.origin.offset_by(
                column as f64 * spec.resolution,
                row as f64 * spec.resolution,
            );
            vertices.push(utm.to_lat_lon());
        }
    }

    if let Some(source) = elevation {
        #[cfg(feature = "profiling")]
        profiling::scope!("cell::elevation_pass");

        for (i, vertex) in vertices.iter_mut().enumerate() {
            if i % (spec.columns + 1) == 0 {
                token.check()?;
            }
            vertex.elevation = source.elevation(vertex.latitude, vertex.longitude);
        }
    }

    let mut cells = Vec::with_capacity(spec.rows * spec.columns);
    for row in 0..spec.rows {
        token.check()?;
        for column in 0..spec.columns {
            let corners = [
                vertices[spec.vertex_index(row, column)],
                vertices[spec.vertex_index(row + 1, column)],
                vertices[spec.vertex_index(row + 1, column + 1)],
                vertices[spec.vertex_index(row, column + 1)],
            ];

            let raw = Polygon::from_points(corners);
            let Some(raw_bounds) = raw.bounds() else {
                continue;
            };
            if !rects_overlap(&raw_bounds, &spec.clip_bounds) {
                continue;
            }

            let polygon = clip::clip(&corners, &spec.clip_bounds, epsilon);
            if polygon.is_empty_intersection() {
                continue;
            }
            let Some(bounds) = polygon.bounds() else {
                continue;
            };

            let origin = spec.origin.offset_by(
                column as f64 * spec.resolution,
                row as f64 * spec.resolution,
            );
            // Mid-latitude of the clipped cell keeps the band inside the zone's band
            let band_latitude = (bounds.min().y + bounds.max().y) / 2.0;
            let reference = match MgrsReference::from_utm(&origin, band_latitude) {
                Ok(reference) => reference,
                Err(e) => {
                    warn!(
                        zone = origin.zone,
                        easting = origin.easting,
                        northing = origin.northing,
                        "Skipping grid cell without MGRS reference: {e}"
                    );
                    continue;
                }
            };

            cells.push(GridCell {
                resolution: spec.resolution,
                origin,
                reference,
                corners,
                polygon: polygon.into_shared(),
                bounds,
                clip_bounds: spec.clip_bounds,
                touched: None,
                subdivision_requested: None,
                children: TaskState::Idle,
            });
        }
    }

    Ok(ChildGrid {
        resolution: spec.resolution,
        cells,
    })
}

/// One cell of one tier
#[derive(Debug)]
pub struct GridCell {
    resolution: f64,
    origin: UtmPoint,
    reference: MgrsReference,
    /// sw, nw, ne, se (unclipped)
    corners: [GeoPoint; 4],
    polygon: Arc<[GeoPoint]>,
    bounds: Rect<f64>,
    /// Bounds of the owning zone
    clip_bounds: Rect<f64>,
    /// Frame stamp of the last pass that drew this cell
    touched: Option<u64>,
    /// Frame stamp of the last pass that wanted this cell subdivided
    subdivision_requested: Option<u64>,
    children: TaskState<ChildGrid>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GridCell {
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn origin(&self) -> &UtmPoint {
        &self.origin
    }

    pub fn reference(&self) -> &MgrsReference {
        &self.reference
    }

    pub fn corners(&self) -> &[GeoPoint; 4] {
        &self.corners
    }

    pub fn polygon(&self) -> &[GeoPoint] {
        &self.polygon
    }

    pub fn bounds(&self) -> &Rect<f64> {
        &self.bounds
    }

    pub fn children(&self) -> &TaskState<ChildGrid> {
        &self.children
    }

    pub fn touched(&self) -> Option<u64> {
        self.touched
    }

    /// Bounding box overlaps the view, also across the antimeridian
    pub fn in_view(&self, viewport: &Viewport) -> bool {
        bounds_in_view(&self.bounds, viewport)
    }

    /// Zoomed in far enough to show the next tier
    pub(crate) fn wants_subdivision(&self, viewport: &Viewport, config: &crate::Config) -> bool {
        self.resolution >= config.min_subdivision_resolution
            && viewport.short_axis_span() < config.subdivision_span_factor * self.resolution
            && (pyramid_level(viewport.draw_resolution) - pyramid_level(viewport.scene_resolution))
                .abs()
                <= 1
    }

    /// Draw this cell or, when zoomed in and available, its children
    pub(crate) fn draw(&mut self, ctx: &DrawContext<'_>, out: &mut DrawList) {
        if !self.in_view(ctx.viewport) {
            return;
        }
        let stamp = ctx.stamp();
        self.touched = Some(stamp);

        if self.wants_subdivision(ctx.viewport, ctx.config) {
            self.subdivision_requested = Some(stamp);
            if self.refresh_children(ctx) {
                if let Some(grid) = self.children.ready_mut() {
                    for child in &mut grid.cells {
                        child.draw(ctx, out);
                    }
                    return;
                }
            } else {
                out.redraw_requested = true;
            }
        }

        self.emit(ctx, out);
    }

    /// Poll the child slot, starting generation when idle. True once children are ready.
    fn refresh_children(&mut self, ctx: &DrawContext<'_>) -> bool {
        match self.children.poll() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                // Retried on the next frame
                warn!(reference = %self.reference, "Sub-grid generation failed: {e}");
                return false;
            }
        }

        if self.children.is_idle() {
            let spec = GridSpec::subdivide(self);
            let elevation = ctx.elevation.cloned();
            let host = Arc::clone(ctx.host);
            let epsilon = ctx.config.clip_epsilon;
            debug!(
                reference = %self.reference,
                resolution = spec.resolution,
                executor = ctx.executor.name(),
                "Requesting sub-grid"
            );
            let handle = ctx.executor.submit_then(
                move |token| generate_grid(&spec, elevation.as_deref(), token, epsilon),
                move || host.request_redraw(),
            );
            self.children = TaskState::Pending(handle);

            // Inline executors finish during submit
            return matches!(self.children.poll(), Ok(true));
        }
        false
    }

    fn emit(&self, ctx: &DrawContext<'_>, out: &mut DrawList) {
        if ctx.lines_enabled() {
            out.cells.push(CellPrimitive {
                resolution: self.resolution,
                reference: self.reference,
                corners: self.corners,
                polygon: Arc::clone(&self.polygon),
                bounds: self.bounds,
            });
        }
        if ctx.labels_enabled() {
            self.emit_labels(ctx, out);
        }
    }

    fn emit_labels(&self, ctx: &DrawContext<'_>, out: &mut DrawList) {
        let [sw, nw, _, se] = self.corners;
        let screen = &ctx.viewport.screen;

        if let Some(weight) = place_label(&sw, &nw, ctx.projector, screen) {
            out.labels.push(LabelRequest::new(
                self.easting_label(),
                LabelKind::Easting,
                sw,
                nw,
                weight,
            ));
        }
        // The 100km tier labels its square once, on the west edge
        if self.resolution >= GRID_SQUARE_METERS {
            return;
        }
        if let Some(weight) = place_label(&sw, &se, ctx.projector, screen) {
            out.labels.push(LabelRequest::new(
                self.northing_label(),
                LabelKind::Northing,
                sw,
                se,
                weight,
            ));
        }
    }

    /// Significant digits shown for this tier (1 at 10km, 4 at 10m)
    fn label_digits(&self) -> usize {
        let places = self.resolution.log10().round() as usize;
        5usize.saturating_sub(places).max(1)
    }

    pub fn easting_label(&self) -> String {
        if self.resolution >= GRID_SQUARE_METERS {
            return self.reference.grid_descriptor();
        }
        let mut text = self.reference.easting_descriptor();
        text.truncate(self.label_digits());
        text
    }

    pub fn northing_label(&self) -> String {
        if self.resolution >= GRID_SQUARE_METERS {
            return self.reference.grid_descriptor();
        }
        let mut text = self.reference.northing_descriptor();
        text.truncate(self.label_digits());
        text
    }

    /// Drop children that were not drawn in the pass stamped `stamp`
    ///
    /// Untouched cells are skipped: their parent releases them.
    pub fn cull(&mut self, stamp: u64) {
        if self.touched != Some(stamp) {
            return;
        }
        let requested = self.subdivision_requested == Some(stamp);

        let drop_children = match &mut self.children {
            TaskState::Ready(grid) => {
                let mut any_touched = false;
                for child in &mut grid.cells {
                    if child.touched == Some(stamp) {
                        any_touched = true;
                        child.cull(stamp);
                    } else {
                        child.release();
                    }
                }
                !any_touched && !requested
            }
            TaskState::Pending(_) => !requested,
            TaskState::Idle => false,
        };

        if drop_children {
            debug!(reference = %self.reference, resolution = self.resolution, "Releasing sub-grid");
            self.children.reset();
        }
    }

    /// Forget all children and cancel any pending generation
    pub fn release(&mut self) {
        self.children.reset();
        self.touched = None;
        self.subdivision_requested = None;
    }

    /// This cell plus every generated descendant
    pub fn live_cell_count(&self) -> usize {
        1 + self
            .children
            .ready()
            .map_or(0, |grid| grid.iter().map(GridCell::live_cell_count).sum())
    }

    /// Generation tasks still outstanding in this subtree
    pub fn pending_tasks(&self) -> usize {
        match &self.children {
            TaskState::Pending(_) => 1,
            TaskState::Ready(grid) => grid.iter().map(GridCell::pending_tasks).sum(),
            TaskState::Idle => 0,
        }
    }
}

/// Rectangle overlap against the view, also trying ±360° when the view crosses 180°
pub(crate) fn bounds_in_view(bounds: &Rect<f64>, viewport: &Viewport) -> bool {
    let view = viewport.bounds();
    if rects_overlap(bounds, &view) {
        return true;
    }
    if !viewport.crosses_idl {
        return false;
    }
    [-360.0, 360.0].into_iter().any(|shift| {
        let shifted = Rect::new(
            Coord {
                x: bounds.min().x + shift,
                y: bounds.min().y,
            },
            Coord {
                x: bounds.max().x + shift,
                y: bounds.max().y,
            },
        );
        rects_overlap(&shifted, &view)
    })
}
