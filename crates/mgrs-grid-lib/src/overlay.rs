//! GridOverlay - the coordinator the renderer calls once per render pass
//!
//! The overlay owns the zone lattice, the worker pool handle and the display mode. Each
//! frame it marks the zones in view on the frame's first pass, draws every pass into a
//! fresh [`DrawList`], and sweeps the lattice after the frame's final pass.

use crate::config::{Config, GridStyle};
use crate::executor::TaskExecutor;
use crate::format::AngleFormat;
use crate::frame::{DrawContext, DrawList};
use crate::lattice::ZoneLattice;
use crate::latlon;
use crate::viewport::{ElevationSource, RenderHost, RenderPass, ScreenProjector, Viewport};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which grid the overlay shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GridDisplayMode {
    Off,
    #[default]
    Mgrs,
    /// Parallels and meridians labelled in the given notation
    LatLon(AngleFormat),
}

/// MGRS / lat-lon grid overlay
pub struct GridOverlay {
    mode: GridDisplayMode,
    style: GridStyle,
    config: Config,
    executor: Arc<dyn TaskExecutor>,
    host: Arc<dyn RenderHost>,
    elevation: Option<Arc<dyn ElevationSource>>,
    lattice: ZoneLattice,
    /// Render pump of the frame whose zones are currently marked
    marked_pump: Option<u64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GridOverlay {
    /// Create an overlay in MGRS mode
    pub fn new(
        config: Config,
        executor: Arc<dyn TaskExecutor>,
        host: Arc<dyn RenderHost>,
    ) -> Result<Self> {
        config.validate()?;
        debug!(executor = executor.name(), "Grid overlay created");
        Ok(Self {
            mode: GridDisplayMode::default(),
            style: GridStyle::default(),
            config,
            executor,
            host,
            elevation: None,
            lattice: ZoneLattice::new(),
            marked_pump: None,
        })
    }

    /// Lift grid corners onto terrain from `source`
    pub fn with_elevation(mut self, source: Arc<dyn ElevationSource>) -> Self {
        self.elevation = Some(source);
        self
    }

    pub fn mode(&self) -> GridDisplayMode {
        self.mode
    }

    /// Switch display mode; leaving MGRS drops every cached zone
    pub fn set_mode(&mut self, mode: GridDisplayMode) {
        if mode == self.mode {
            return;
        }
        debug!(?mode, "Grid display mode changed");
        if self.mode == GridDisplayMode::Mgrs {
            self.lattice.clear();
            self.marked_pump = None;
        }
        self.mode = mode;
        self.host.mark_dirty();
    }

    pub fn style(&self) -> GridStyle {
        self.style
    }

    pub fn set_style(&mut self, style: GridStyle) {
        if style != self.style {
            self.style = style;
            self.host.mark_dirty();
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn lattice(&self) -> &ZoneLattice {
        &self.lattice
    }

    /// Draw one render pass
    ///
    /// Never blocks on background work: regions and cells whose grids are still being
    /// generated draw themselves at the coarser level and set
    /// [`DrawList::redraw_requested`].
    pub fn draw(
        &mut self,
        viewport: &Viewport,
        pass: RenderPass,
        projector: &dyn ScreenProjector,
    ) -> DrawList {
        #[cfg(feature = "profiling")]
        profiling::scope!("overlay::draw");

        let mut out = DrawList {
            style: self.style,
            ..DrawList::new(pass)
        };
        if !viewport.passes.intersects(pass) {
            return out;
        }

        let Self {
            mode,
            config,
            executor,
            host,
            elevation,
            lattice,
            marked_pump,
            ..
        } = self;
        let ctx = DrawContext {
            viewport,
            pass,
            projector,
            executor,
            host,
            elevation: elevation.as_ref(),
            config,
        };

        match *mode {
            GridDisplayMode::Off => {}
            GridDisplayMode::Mgrs => {
                let pump = viewport.render_pump;
                if *marked_pump != Some(pump) {
                    lattice.mark_zones(viewport);
                    *marked_pump = Some(pump);
                }
                lattice.draw(&ctx, &mut out);
                if viewport.is_final_pass(pass) {
                    lattice.sweep(pump);
                }
            }
            GridDisplayMode::LatLon(format) => latlon::draw(&ctx, format, &mut out),
        }

        trace!(
            cells = out.cells.len(),
            zones = out.zones.len(),
            lines = out.lines.len(),
            labels = out.labels.len(),
            redraw = out.redraw_requested,
            "Grid pass drawn"
        );
        out
    }

    /// Drop every cached zone and cancel outstanding work
    pub fn release(&mut self) {
        self.lattice.clear();
        self.marked_pump = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::lat_lon_rect;
    use crate::executor::{InlineExecutor, QueuedExecutor};
    use crate::geodesy::UtmPoint;
    use crate::viewport::{NoopHost, PlateCarreeProjector, RedrawFlag};
    use crate::zone::LatticeKey;

    const EPS: f64 = 1e-8;

    fn overlay(executor: Arc<dyn TaskExecutor>) -> GridOverlay {
        GridOverlay::new(Config::default(), executor, Arc::new(NoopHost)).unwrap()
    }

    /// Draw both passes of a frame, returning the surface and sprite outputs
    fn frame(overlay: &mut GridOverlay, viewport: &Viewport) -> (DrawList, DrawList) {
        let projector = PlateCarreeProjector::new(viewport);
        let surface = overlay.draw(viewport, RenderPass::SURFACE, &projector);
        let sprites = overlay.draw(viewport, RenderPass::SPRITES, &projector);
        (surface, sprites)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = Config {
            label_only_scale: -1.0,
            ..Config::default()
        };
        assert!(GridOverlay::new(config, Arc::new(InlineExecutor), Arc::new(NoopHost)).is_err());
    }

    #[test]
    fn test_end_to_end_zone_32p() {
        let mut overlay = overlay(Arc::new(InlineExecutor));
        let zone = lat_lon_rect(8.0, 6.0, 16.0, 12.0);

        // Half a degree at ~72 m/px: the 100km squares subdivide once
        let viewport = Viewport::new(10.0, 10.0, 10.5, 10.5)
            .with_resolution(72.0)
            .with_render_pump(1);
        let (surface, sprites) = frame(&mut overlay, &viewport);

        let key = LatticeKey::new(11, 31);
        let region = overlay.lattice().get(key).unwrap();
        assert_eq!(region.descriptor(), "32P");
        assert!(region.grid().ready().is_some());
        assert!(!surface.cells.is_empty());
        assert_eq!(surface.finest_resolution(), Some(10_000.0));
        assert!(surface.labels.is_empty());
        assert!(sprites.cells.is_empty());
        assert!(!sprites.labels.is_empty());

        // Zoomed into a few hundred meters: recursion reaches the 10m tier
        let close = Viewport::new(10.2, 10.2, 10.203, 10.204)
            .with_resolution(0.5)
            .with_render_pump(2);
        let (surface, _) = frame(&mut overlay, &close);
        assert_eq!(surface.finest_resolution(), Some(10.0));
        for cell in &surface.cells {
            assert_eq!(cell.reference.zone, 32);
            assert_eq!(cell.reference.band, 'P');
            for corner in &cell.corners {
                assert!(corner.latitude > zone.min().y && corner.latitude < zone.max().y);
                assert!(corner.longitude > zone.min().x && corner.longitude < zone.max().x);
            }
            for p in cell.polygon.iter() {
                assert!(p.latitude >= cell.bounds.min().y - EPS);
                assert!(p.latitude <= cell.bounds.max().y + EPS);
                assert!(p.longitude >= zone.min().x - EPS && p.longitude <= zone.max().x + EPS);
            }
        }

        // The 10m cells sit where their MGRS reference says
        let cell = &surface.cells[0];
        let sw = cell.reference.to_lat_lon().unwrap();
        assert!(sw.distance_to(&cell.corners[0]) < 0.01);
        let utm = UtmPoint::from_lat_lon(sw.latitude, sw.longitude).unwrap();
        assert!((utm.easting - utm.easting.round()).abs() < 1e-3);
        assert_eq!(utm.easting.round() % 10.0, 0.0);
    }

    #[test]
    fn test_zoom_at_five_meters_steps_through_every_tier() {
        let queue = Arc::new(QueuedExecutor::new());
        let mut overlay = overlay(queue.clone());
        // 100 px across at 5 m/px is 500 m, under 5.25 cells of the 100m tier
        let (south, west) = (10.2, 10.2);
        let (north, east) = (south + 0.0045, west + 0.0045);
        let view = |pump| {
            Viewport::new(south, west, north, east)
                .with_resolution(5.0)
                .with_screen(100.0, 100.0)
                .with_render_pump(pump)
        };

        // The zone grid is still being generated: outline only
        let (surface, _) = frame(&mut overlay, &view(1));
        assert!(surface.cells.is_empty());
        assert_eq!(surface.zones.len(), 1);
        assert!(surface.redraw_requested);

        // Each finished generation reveals one finer tier
        let mut tiers = Vec::new();
        for pump in 2..=6 {
            assert!(queue.run_all() > 0);
            let (surface, _) = frame(&mut overlay, &view(pump));
            tiers.push(surface.finest_resolution());
        }
        assert_eq!(
            tiers,
            vec![
                Some(100_000.0),
                Some(10_000.0),
                Some(1_000.0),
                Some(100.0),
                Some(10.0)
            ]
        );

        // The 10m tier is the last one: nothing left to generate
        assert_eq!(overlay.lattice().pending_tasks(), 0);
        let (surface, _) = frame(&mut overlay, &view(7));
        assert!(!surface.redraw_requested);
        let tolerance = 1e-3;
        for cell in &surface.cells {
            assert_eq!(cell.resolution, 10.0);
            assert_eq!(cell.reference.zone, 32);
            for corner in &cell.corners {
                assert!(corner.latitude > south - tolerance && corner.latitude < north + tolerance);
                assert!(corner.longitude > west - tolerance && corner.longitude < east + tolerance);
            }
        }
    }

    #[test]
    fn test_five_meters_on_default_screen_stops_at_100m() {
        // 768 px at 5 m/px spans 3.84 km, more than 5.25 cells of the 100m tier
        let mut overlay = overlay(Arc::new(InlineExecutor));
        let viewport = Viewport::new(10.2, 10.2, 10.235, 10.247)
            .with_resolution(5.0)
            .with_render_pump(1);
        let (surface, _) = frame(&mut overlay, &viewport);
        assert_eq!(surface.finest_resolution(), Some(100.0));
    }

    #[test]
    fn test_idl_viewport_draws_both_zones() {
        let mut overlay = overlay(Arc::new(InlineExecutor));
        let viewport = Viewport::new(1.0, 178.0, 3.0, -178.0)
            .with_resolution(1000.0)
            .with_render_pump(1);
        let (surface, _) = frame(&mut overlay, &viewport);
        let zones: Vec<u8> = surface.cells.iter().map(|c| c.reference.zone).collect();
        assert!(zones.contains(&60));
        assert!(zones.contains(&1));
        assert!(overlay.lattice().contains(LatticeKey::new(10, 59)));
        assert!(overlay.lattice().contains(LatticeKey::new(10, 0)));
    }

    #[test]
    fn test_pan_away_releases_old_zones() {
        let mut overlay = overlay(Arc::new(InlineExecutor));
        let here = Viewport::new(10.0, 10.0, 10.5, 10.5)
            .with_resolution(72.0)
            .with_render_pump(1);
        frame(&mut overlay, &here);
        assert!(overlay.lattice().live_cell_count() > 0);

        let there = Viewport::new(-35.0, 150.2, -34.5, 150.7)
            .with_resolution(72.0)
            .with_render_pump(2);
        frame(&mut overlay, &there);
        assert!(!overlay.lattice().contains(LatticeKey::new(11, 31)));
        let keys: Vec<_> = overlay.lattice().live_keys().collect();
        assert_eq!(keys, vec![LatticeKey::new(5, 55)]);
    }

    #[test]
    fn test_sweep_waits_for_final_pass() {
        let mut overlay = overlay(Arc::new(InlineExecutor));
        let here = Viewport::new(10.0, 10.0, 10.5, 10.5).with_render_pump(1);
        frame(&mut overlay, &here);

        // Surface pass of the next frame elsewhere: nothing swept yet
        let there = Viewport::new(-35.0, 150.2, -34.5, 150.7).with_render_pump(2);
        let projector = PlateCarreeProjector::new(&there);
        overlay.draw(&there, RenderPass::SURFACE, &projector);
        assert!(overlay.lattice().contains(LatticeKey::new(11, 31)));

        overlay.draw(&there, RenderPass::SPRITES, &projector);
        assert!(!overlay.lattice().contains(LatticeKey::new(11, 31)));
    }

    #[test]
    fn test_pending_grid_falls_back_to_outline() {
        let queue = Arc::new(QueuedExecutor::new());
        let mut overlay = overlay(queue.clone());
        let mut viewport = Viewport::new(10.0, 10.0, 10.5, 10.5)
            .with_resolution(72.0)
            .with_render_pump(1);

        let (surface, sprites) = frame(&mut overlay, &viewport);
        assert!(surface.cells.is_empty());
        assert_eq!(surface.zones.len(), 1);
        assert!(surface.redraw_requested);
        assert!(sprites.labels.iter().any(|l| l.text == "32P"));

        // Top grid done; its 100km cells now want 10km children
        assert_eq!(queue.run_all(), 1);
        viewport.next_frame();
        let (surface, _) = frame(&mut overlay, &viewport);
        assert_eq!(surface.finest_resolution(), Some(100_000.0));
        assert!(surface.redraw_requested);

        queue.run_all();
        viewport.next_frame();
        let (surface, _) = frame(&mut overlay, &viewport);
        assert_eq!(surface.finest_resolution(), Some(10_000.0));
        assert!(!surface.redraw_requested);
    }

    #[test]
    fn test_panning_away_cancels_pending_work() {
        let queue = Arc::new(QueuedExecutor::new());
        let mut overlay = overlay(queue.clone());
        let here = Viewport::new(10.0, 10.0, 10.5, 10.5)
            .with_resolution(72.0)
            .with_render_pump(1);
        frame(&mut overlay, &here);
        assert_eq!(overlay.lattice().pending_tasks(), 1);

        let there = Viewport::new(-35.0, 150.2, -34.5, 150.7)
            .with_resolution(72.0)
            .with_render_pump(2);
        frame(&mut overlay, &there);
        assert!(!overlay.lattice().contains(LatticeKey::new(11, 31)));

        // Both the abandoned job and the new zone's job run; only the new one lands
        assert_eq!(queue.run_all(), 2);
        let again = there.clone().with_render_pump(3);
        let (surface, _) = frame(&mut overlay, &again);
        assert!(surface.cells.iter().all(|c| c.reference.zone == 56));
        assert!(!overlay.lattice().contains(LatticeKey::new(11, 31)));
    }

    #[test]
    fn test_lat_lon_mode() {
        let mut overlay = overlay(Arc::new(InlineExecutor));
        overlay.set_mode(GridDisplayMode::LatLon(AngleFormat::Decimal));
        let viewport = Viewport::new(-5.0, -5.0, 5.0, 5.0)
            .with_resolution(500.0)
            .with_render_pump(1);
        let (surface, sprites) = frame(&mut overlay, &viewport);
        assert!(surface.cells.is_empty());
        // 3° steps: parallels -3, 0, 3 and meridians -3, 0, 3
        assert_eq!(surface.lines.len(), 6);
        let texts: Vec<_> = sprites.labels.iter().map(|l| l.text.as_str()).collect();
        assert!(texts.contains(&"Equator"));
        assert!(texts.contains(&"Prime Meridian"));
        assert!(texts.contains(&"N 3°"));
        assert_eq!(overlay.lattice().live_count(), 0);
    }

    #[test]
    fn test_mode_switch_clears_lattice_and_marks_dirty() {
        let host = Arc::new(RedrawFlag::default());
        let mut overlay =
            GridOverlay::new(Config::default(), Arc::new(InlineExecutor), host.clone()).unwrap();
        let viewport = Viewport::new(10.0, 10.0, 10.5, 10.5).with_render_pump(1);
        frame(&mut overlay, &viewport);
        assert!(overlay.lattice().live_count() > 0);

        overlay.set_mode(GridDisplayMode::Off);
        assert_eq!(overlay.lattice().live_count(), 0);
        assert_eq!(host.dirty_count(), 1);
        let (surface, sprites) = frame(&mut overlay, &viewport.clone().with_render_pump(2));
        assert!(surface.is_empty() && sprites.is_empty());

        // Same mode again is a no-op
        overlay.set_mode(GridDisplayMode::Off);
        assert_eq!(host.dirty_count(), 1);
    }

    #[test]
    fn test_style_travels_with_every_pass() {
        let host = Arc::new(RedrawFlag::default());
        let mut overlay =
            GridOverlay::new(Config::default(), Arc::new(InlineExecutor), host.clone()).unwrap();
        let viewport = Viewport::new(10.0, 10.0, 10.5, 10.5)
            .with_resolution(72.0)
            .with_render_pump(1);
        let (surface, _) = frame(&mut overlay, &viewport);
        assert_eq!(surface.style, GridStyle::default());

        let faded = GridStyle::default().with_alpha(0x40);
        overlay.set_style(faded);
        assert_eq!(host.dirty_count(), 1);
        // Unchanged style is not a change
        overlay.set_style(faded);
        assert_eq!(host.dirty_count(), 1);

        let (surface, sprites) = frame(&mut overlay, &viewport.clone().with_render_pump(2));
        assert_eq!(surface.style, faded);
        assert_eq!(sprites.style, faded);
    }

    #[test]
    fn test_inactive_pass_draws_nothing() {
        let mut overlay = overlay(Arc::new(InlineExecutor));
        let viewport = Viewport::new(10.0, 10.0, 10.5, 10.5).with_passes(RenderPass::SURFACE);
        let projector = PlateCarreeProjector::new(&viewport);
        let out = overlay.draw(&viewport, RenderPass::SPRITES, &projector);
        assert!(out.is_empty());
        assert_eq!(overlay.lattice().live_count(), 0);
    }
}
