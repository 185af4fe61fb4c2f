//! Viewport descriptor and the host-side interfaces the overlay consumes

use crate::geodesy::GeoPoint;
use crate::utils::wrap_longitude;
use geo::{Coord, Rect};
use std::ops::BitOr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Web Mercator ground resolution at zoom level 0 (meters per pixel at the equator)
const LEVEL_ZERO_RESOLUTION: f64 = 156_543.034;

/// Meters per inch
const METERS_PER_INCH: f64 = 0.0254;

/// Pixel position on screen (y grows downward)
pub type ScreenPoint = Coord<f64>;

/// Bitmask of render passes active in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderPass(u8);

impl RenderPass {
    pub const NONE: RenderPass = RenderPass(0);
    /// Lines drawn on the terrain surface
    pub const SURFACE: RenderPass = RenderPass(1);
    /// Screen-space labels
    pub const SPRITES: RenderPass = RenderPass(2);
    pub const ALL: RenderPass = RenderPass(3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// All bits of `other` are set in `self`
    pub const fn contains(self, other: RenderPass) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: RenderPass) -> bool {
        self.0 & other.0 != 0
    }

    /// The last pass (highest bit) of a frame
    pub const fn last(self) -> RenderPass {
        if self.0 == 0 {
            RenderPass::NONE
        } else {
            RenderPass(1 << (7 - self.0.leading_zeros()))
        }
    }
}

impl BitOr for RenderPass {
    type Output = RenderPass;

    fn bitor(self, rhs: RenderPass) -> RenderPass {
        RenderPass(self.0 | rhs.0)
    }
}

/// Screen rectangle in pixels, y grows downward
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ScreenRect {
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Everything the grid needs to know about one render pass
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    pub south: f64,
    pub north: f64,
    /// West bound wrapped into [-180, 180]
    pub west: f64,
    /// East bound wrapped into [-180, 180]
    pub east: f64,
    /// West bound before wrapping; may be below -180 when crossing the antimeridian
    pub west_unwrapped: f64,
    /// East bound before wrapping; may be above 180 when crossing the antimeridian
    pub east_unwrapped: f64,
    pub crosses_idl: bool,
    /// Meters per pixel at which the frame is drawn
    pub draw_resolution: f64,
    /// Meters per pixel of the settled scene (differs while zoom animates)
    pub scene_resolution: f64,
    /// Camera tilt in degrees, 0 = straight down
    pub tilt: f64,
    /// Frame counter, incremented once per frame
    pub render_pump: u64,
    /// Bumped whenever the camera moves
    pub draw_version: u64,
    pub passes: RenderPass,
    pub continuous_scroll: bool,
    pub screen: ScreenRect,
    pub dpi: f64,
    /// 3-D globe projection (lines need tessellation)
    pub globe: bool,
}

impl Viewport {
    /// Viewport over the given bounds at 1 km/px on a 1024x768 screen
    ///
    /// `west`/`east` may be given unwrapped (e.g. 170 to 190) to describe a view across
    /// the antimeridian.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        let west_unwrapped = west;
        let east_unwrapped = if east < west { east + 360.0 } else { east };
        Self {
            south,
            north,
            west: wrap_longitude(west_unwrapped),
            east: wrap_longitude(east_unwrapped),
            west_unwrapped,
            east_unwrapped,
            crosses_idl: west_unwrapped < -180.0 || east_unwrapped > 180.0,
            draw_resolution: 1000.0,
            scene_resolution: 1000.0,
            tilt: 0.0,
            render_pump: 0,
            draw_version: 0,
            passes: RenderPass::ALL,
            continuous_scroll: false,
            screen: ScreenRect::new(1024.0, 768.0),
            dpi: 240.0,
            globe: false,
        }
    }

    /// Set both draw and scene resolution
    pub fn with_resolution(mut self, meters_per_pixel: f64) -> Self {
        self.draw_resolution = meters_per_pixel;
        self.scene_resolution = meters_per_pixel;
        self
    }

    pub fn with_scene_resolution(mut self, meters_per_pixel: f64) -> Self {
        self.scene_resolution = meters_per_pixel;
        self
    }

    pub fn with_screen(mut self, width: f64, height: f64) -> Self {
        self.screen = ScreenRect::new(width, height);
        self
    }

    pub fn with_tilt(mut self, tilt: f64) -> Self {
        self.tilt = tilt;
        self
    }

    pub fn with_passes(mut self, passes: RenderPass) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_globe(mut self, globe: bool) -> Self {
        self.globe = globe;
        self
    }

    pub fn with_render_pump(mut self, pump: u64) -> Self {
        self.render_pump = pump;
        self
    }

    /// Advance to the next frame
    pub fn next_frame(&mut self) {
        self.render_pump += 1;
    }

    /// Ratio between ground distance and its size on the display
    pub fn reciprocal_map_scale(&self) -> f64 {
        self.draw_resolution * self.dpi / METERS_PER_INCH
    }

    /// Ground distance covered by the shorter screen axis, in meters
    pub fn short_axis_span(&self) -> f64 {
        self.draw_resolution * self.screen.width().min(self.screen.height())
    }

    /// `pass` includes the last pass of this frame, after which caches are swept
    pub fn is_final_pass(&self, pass: RenderPass) -> bool {
        pass.contains(self.passes.last())
    }

    /// Bounds with unwrapped longitudes (x = longitude, y = latitude)
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.west_unwrapped,
                y: self.south,
            },
            Coord {
                x: self.east_unwrapped,
                y: self.north,
            },
        )
    }
}

/// Tile pyramid level matching a ground resolution
pub fn pyramid_level(meters_per_pixel: f64) -> i32 {
    (LEVEL_ZERO_RESOLUTION / meters_per_pixel).log2().floor() as i32
}

/// Forward projection from geodetic to screen coordinates
pub trait ScreenProjector {
    /// `None` when the point is behind the globe or otherwise not projectable
    fn forward(&self, point: &GeoPoint) -> Option<ScreenPoint>;
}

/// Equirectangular projection of a viewport's bounds onto its screen rectangle
#[derive(Debug, Clone)]
pub struct PlateCarreeProjector {
    bounds: Rect<f64>,
    screen: ScreenRect,
}

impl PlateCarreeProjector {
    pub fn new(viewport: &Viewport) -> Self {
        Self {
            bounds: viewport.bounds(),
            screen: viewport.screen,
        }
    }
}

impl ScreenProjector for PlateCarreeProjector {
    fn forward(&self, point: &GeoPoint) -> Option<ScreenPoint> {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        let width = max.x - min.x;
        let height = max.y - min.y;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }

        // Bring the longitude into the unwrapped range when the view crosses 180°
        let mut lon = point.longitude;
        if lon < min.x && lon + 360.0 <= max.x {
            lon += 360.0;
        } else if lon > max.x && lon - 360.0 >= min.x {
            lon -= 360.0;
        }

        Some(Coord {
            x: self.screen.left + (lon - min.x) / width * self.screen.width(),
            y: self.screen.top + (max.y - point.latitude) / height * self.screen.height(),
        })
    }
}

/// Callbacks into the rendering host; fire-and-forget and callable from any thread
pub trait RenderHost: Send + Sync {
    /// Ask for another frame (e.g. a background result is on its way)
    fn request_redraw(&self);

    /// Cached render output is stale
    fn mark_dirty(&self);
}

/// Host that ignores every request
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl RenderHost for NoopHost {
    fn request_redraw(&self) {}

    fn mark_dirty(&self) {}
}

/// Host that records requests so a polling frame loop can act on them
#[derive(Debug, Default)]
pub struct RedrawFlag {
    redraw: AtomicBool,
    dirty: AtomicU64,
}

impl RedrawFlag {
    /// Read and clear the redraw request
    pub fn take(&self) -> bool {
        self.redraw.swap(false, Ordering::AcqRel)
    }

    /// How many times the output was marked dirty
    pub fn dirty_count(&self) -> u64 {
        self.dirty.load(Ordering::Acquire)
    }
}

impl RenderHost for RedrawFlag {
    fn request_redraw(&self) {
        self.redraw.store(true, Ordering::Release);
    }

    fn mark_dirty(&self) {
        self.dirty.fetch_add(1, Ordering::AcqRel);
    }
}

/// Terrain elevation lookup used to lift grid corners onto the surface
pub trait ElevationSource: Send + Sync {
    /// Elevation in meters, `None` where unknown
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64>;
}

impl<F> ElevationSource for F
where
    F: Fn(f64, f64) -> Option<f64> + Send + Sync,
{
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64> {
        self(latitude, longitude)
    }
}
