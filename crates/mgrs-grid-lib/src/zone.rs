//! UTM zone regions of the grid-zone lattice
//!
//! A region is one 6°x8° cell of the lattice (band X is 12° tall), except around Norway
//! and Svalbard where the published zone table widens or removes zones.

use crate::cell::{bounds_in_view, ChildGrid, GridCell, GridSpec};
use crate::clip::lat_lon_rect;
use crate::executor::TaskState;
use crate::frame::{DrawContext, DrawList, ZonePrimitive};
use crate::geodesy::{GeoPoint, MIN_LATITUDE, MAX_LATITUDE};
use crate::label::{LabelKind, LabelRequest};
use crate::viewport::Viewport;
use geo::Rect;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lattice rows (latitude bands C..X)
pub const LATTICE_ROWS: usize = 20;

/// Lattice columns (6° longitude strips)
pub const LATTICE_COLUMNS: usize = 60;

/// Band V (56°N-64°N), home of the Norway exception
pub const ROW_V: u8 = 17;

/// Band X (72°N-84°N), home of the Svalbard exception
pub const ROW_X: u8 = 19;

const BAND_LETTERS: &[u8; LATTICE_ROWS] = b"CDEFGHJKLMNPQRSTUVWX";

/// Position of a region in the lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LatticeKey {
    pub row: u8,
    pub column: u8,
}

impl LatticeKey {
    pub const fn new(row: u8, column: u8) -> Self {
        Self { row, column }
    }

    /// Slot index in a row-major 20x60 table
    pub const fn index(self) -> usize {
        self.row as usize * LATTICE_COLUMNS + self.column as usize
    }

    pub fn band(self) -> char {
        BAND_LETTERS[(self.row as usize).min(LATTICE_ROWS - 1)] as char
    }
}

impl fmt::Display for LatticeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column + 1, self.band())
    }
}

/// Extent and zone number of a region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLayout {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
    pub zone: u8,
    /// False for the zones the Svalbard exception removes
    pub drawable: bool,
}

/// Bounds and zone number for a lattice key
pub fn zone_layout(key: LatticeKey) -> ZoneLayout {
    let south = MIN_LATITUDE + 8.0 * key.row as f64;
    let north = if key.row == ROW_X {
        MAX_LATITUDE
    } else {
        south + 8.0
    };
    let west = -180.0 + 6.0 * key.column as f64;
    let nominal = ZoneLayout {
        west,
        east: west + 6.0,
        south,
        north,
        zone: key.column + 1,
        drawable: true,
    };

    let irregular = |west: f64, east: f64| ZoneLayout {
        west,
        east,
        ..nominal
    };
    match (key.row, key.column) {
        (ROW_V, 30) => irregular(0.0, 3.0),
        (ROW_V, 31) => irregular(3.0, 12.0),
        (ROW_X, 30) => irregular(0.0, 9.0),
        (ROW_X, 32) => irregular(9.0, 21.0),
        (ROW_X, 34) => irregular(21.0, 33.0),
        (ROW_X, 36) => irregular(33.0, 42.0),
        (ROW_X, 31 | 33 | 35) => ZoneLayout {
            drawable: false,
            ..nominal
        },
        _ => nominal,
    }
}

/// One zone of the lattice and its lazily generated 100km grid
#[derive(Debug)]
pub struct ZoneRegion {
    key: LatticeKey,
    zone: u8,
    bounds: Rect<f64>,
    descriptor: String,
    should_mark: bool,
    mark: bool,
    label_only: bool,
    /// Render pump of the last pass that drew this region
    drawn: Option<u64>,
    grid: TaskState<ChildGrid>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ZoneRegion {
    pub fn new(key: LatticeKey) -> Self {
        let layout = zone_layout(key);
        Self {
            key,
            zone: layout.zone,
            bounds: lat_lon_rect(layout.south, layout.west, layout.north, layout.east),
            descriptor: format!("{}{}", layout.zone, key.band()),
            should_mark: layout.drawable,
            mark: false,
            label_only: false,
            drawn: None,
            grid: TaskState::Idle,
        }
    }

    pub fn key(&self) -> LatticeKey {
        self.key
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    /// Zone bounds (x = longitude, y = latitude)
    pub fn bounds(&self) -> &Rect<f64> {
        &self.bounds
    }

    /// Zone descriptor such as `"32V"`
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn should_mark(&self) -> bool {
        self.should_mark
    }

    pub fn is_marked(&self) -> bool {
        self.mark
    }

    pub(crate) fn set_mark(&mut self, mark: bool) {
        self.mark = mark;
    }

    pub fn is_label_only(&self) -> bool {
        self.label_only
    }

    pub fn grid(&self) -> &TaskState<ChildGrid> {
        &self.grid
    }

    pub fn in_view(&self, viewport: &Viewport) -> bool {
        bounds_in_view(&self.bounds, viewport)
    }

    fn north(&self) -> bool {
        self.bounds.min().y >= 0.0
    }

    /// Draw the zone's grid, or its outline while the grid is unavailable
    pub(crate) fn draw(&mut self, ctx: &DrawContext<'_>, out: &mut DrawList) {
        if !self.should_mark || !self.in_view(ctx.viewport) {
            return;
        }
        self.drawn = Some(ctx.stamp());

        self.label_only = ctx.viewport.reciprocal_map_scale() > ctx.config.label_only_scale;
        if self.label_only {
            if !self.grid.is_idle() {
                debug!(zone = %self.descriptor, "Zoomed out, dropping zone grid");
                self.grid.reset();
            }
            self.emit_outline(ctx, out);
            return;
        }

        match self.grid.poll() {
            Ok(true) => {}
            Ok(false) => {
                if self.grid.is_idle() {
                    self.request_grid(ctx);
                }
            }
            Err(e) => warn!(zone = %self.descriptor, "Zone grid generation failed: {e}"),
        }

        match self.grid.ready_mut() {
            Some(grid) => {
                for cell in &mut grid.cells {
                    cell.draw(ctx, out);
                }
            }
            None => {
                out.redraw_requested = true;
                self.emit_outline(ctx, out);
            }
        }
    }

    fn request_grid(&mut self, ctx: &DrawContext<'_>) {
        let spec = GridSpec::top_grid(self.bounds, self.zone, self.north());
        let elevation = ctx.elevation.cloned();
        let host = Arc::clone(ctx.host);
        let epsilon = ctx.config.clip_epsilon;
        debug!(
            zone = %self.descriptor,
            rows = spec.rows,
            columns = spec.columns,
            executor = ctx.executor.name(),
            "Requesting zone grid"
        );
        let handle = ctx.executor.submit_then(
            move |token| crate::cell::generate_grid(&spec, elevation.as_deref(), token, epsilon),
            move || host.request_redraw(),
        );
        self.grid = TaskState::Pending(handle);

        // Inline executors finish during submit
        if let Err(e) = self.grid.poll() {
            warn!(zone = %self.descriptor, "Zone grid generation failed: {e}");
        }
    }

    fn emit_outline(&self, ctx: &DrawContext<'_>, out: &mut DrawList) {
        if ctx.lines_enabled() {
            out.zones.push(ZonePrimitive {
                key: self.key,
                descriptor: self.descriptor.clone(),
                bounds: self.bounds,
                label_only: self.label_only,
            });
        }
        if ctx.labels_enabled() {
            let center = self.bounds.center();
            let anchor = GeoPoint::new(center.y, center.x);
            out.labels.push(LabelRequest::new(
                self.descriptor.clone(),
                LabelKind::Zone,
                anchor,
                anchor,
                0.0,
            ));
        }
    }

    /// Cull the cells drawn in the pass stamped `stamp` and release the rest
    ///
    /// A region that stayed marked without being drawn (out of view, or never drawable)
    /// drops its whole grid.
    pub fn cull(&mut self, stamp: u64) {
        if self.drawn != Some(stamp) {
            if !self.grid.is_idle() {
                debug!(zone = %self.descriptor, "Out of view, dropping zone grid");
                self.grid.reset();
            }
            return;
        }
        if let Some(grid) = self.grid.ready_mut() {
            for cell in &mut grid.cells {
                if cell.touched() == Some(stamp) {
                    cell.cull(stamp);
                } else {
                    cell.release();
                }
            }
        }
    }

    /// Drop the grid and cancel any pending generation
    pub fn release(&mut self) {
        self.grid.reset();
    }

    /// Cells currently generated below this zone
    pub fn live_cell_count(&self) -> usize {
        self.grid
            .ready()
            .map_or(0, |grid| grid.iter().map(GridCell::live_cell_count).sum())
    }

    /// Generation tasks still outstanding below this zone
    pub fn pending_tasks(&self) -> usize {
        match &self.grid {
            TaskState::Pending(_) => 1,
            TaskState::Ready(grid) => grid.iter().map(GridCell::pending_tasks).sum(),
            TaskState::Idle => 0,
        }
    }
}
