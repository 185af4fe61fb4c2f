//! Per-pass drawing context and the primitives produced for the renderer

use crate::config::{Config, GridStyle};
use crate::executor::TaskExecutor;
use crate::geodesy::{GeoPoint, MgrsReference};
use crate::label::LabelRequest;
use crate::latlon::GridLine;
use crate::viewport::{ElevationSource, RenderHost, RenderPass, ScreenProjector, Viewport};
use crate::zone::LatticeKey;
use geo::Rect;
use std::sync::Arc;

/// Everything a node needs while drawing one pass
///
/// Built fresh by the overlay for every pass and handed down the tree by reference.
pub(crate) struct DrawContext<'a> {
    pub viewport: &'a Viewport,
    pub pass: RenderPass,
    pub projector: &'a dyn ScreenProjector,
    pub executor: &'a Arc<dyn TaskExecutor>,
    pub host: &'a Arc<dyn RenderHost>,
    pub elevation: Option<&'a Arc<dyn ElevationSource>>,
    pub config: &'a Config,
}

impl DrawContext<'_> {
    /// Current frame stamp used for touch/request bookkeeping
    pub fn stamp(&self) -> u64 {
        self.viewport.render_pump
    }

    /// Labels are placed in the sprite pass of an untilted enough camera
    pub fn labels_enabled(&self) -> bool {
        self.pass.contains(RenderPass::SPRITES) && self.viewport.tilt < self.config.max_label_tilt
    }

    pub fn lines_enabled(&self) -> bool {
        self.pass.contains(RenderPass::SURFACE)
    }
}

/// A visible grid cell at its finest available tier
#[derive(Debug, Clone)]
pub struct CellPrimitive {
    /// Tier in meters (100 000 down to 10)
    pub resolution: f64,
    pub reference: MgrsReference,
    /// sw, nw, ne, se
    pub corners: [GeoPoint; 4],
    /// Cell polygon after clipping against its zone
    pub polygon: Arc<[GeoPoint]>,
    pub bounds: Rect<f64>,
}

/// A zone outline, drawn when its grid is not available or not wanted at this scale
#[derive(Debug, Clone)]
pub struct ZonePrimitive {
    pub key: LatticeKey,
    pub descriptor: String,
    /// Zone bounds (x = longitude, y = latitude)
    pub bounds: Rect<f64>,
    /// Zoomed out far enough that the zone never shows a grid
    pub label_only: bool,
}

impl ZonePrimitive {
    /// Outline ring sw, nw, ne, se
    pub fn outline(&self) -> [GeoPoint; 4] {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        [
            GeoPoint::new(min.y, min.x),
            GeoPoint::new(max.y, min.x),
            GeoPoint::new(max.y, max.x),
            GeoPoint::new(min.y, max.x),
        ]
    }
}

/// Output of one render pass
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub pass: RenderPass,
    pub cells: Vec<CellPrimitive>,
    pub zones: Vec<ZonePrimitive>,
    pub lines: Vec<GridLine>,
    pub labels: Vec<LabelRequest>,
    /// How the renderer should stroke `cells`, `zones` and `lines`
    pub style: GridStyle,
    /// Some node is waiting on a background result and wants another frame
    pub redraw_requested: bool,
}

impl DrawList {
    pub fn new(pass: RenderPass) -> Self {
        Self {
            pass,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
            && self.zones.is_empty()
            && self.lines.is_empty()
            && self.labels.is_empty()
    }

    /// Finest cell tier present, if any
    pub fn finest_resolution(&self) -> Option<f64> {
        self.cells.iter().map(|c| c.resolution).reduce(f64::min)
    }
}
