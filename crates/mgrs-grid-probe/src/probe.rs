//! Headless frame loop over a [`GridOverlay`]

use crate::settings::{ExecutorKind, Settings};
use mgrs_grid_lib::format::format_point;
use mgrs_grid_lib::utils::wrap_longitude;
use mgrs_grid_lib::{
    Config, CoordinateFormat, CoordinateFormatError, DrawList, GridError, GridOverlay,
    InlineExecutor, PlateCarreeProjector, RayonExecutor, RedrawFlag, RenderPass, TaskExecutor,
    Viewport,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Coordinate error: {0}")]
    Coordinate(#[from] CoordinateFormatError),

    #[error("Invalid view: {0}")]
    InvalidView(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Executor plus whatever keeps its threads alive
struct Workers {
    executor: Arc<dyn TaskExecutor>,
    #[cfg(feature = "tokio")]
    _runtime: Option<tokio::runtime::Runtime>,
}

impl Workers {
    fn new(kind: ExecutorKind, threads: usize) -> Result<Self, ProbeError> {
        let executor: Arc<dyn TaskExecutor> = match kind {
            ExecutorKind::Rayon => Arc::new(RayonExecutor::new(threads)?),
            ExecutorKind::Inline => Arc::new(InlineExecutor),
            #[cfg(feature = "tokio")]
            ExecutorKind::Tokio => {
                let mut builder = tokio::runtime::Builder::new_multi_thread();
                if threads > 0 {
                    builder.max_blocking_threads(threads);
                }
                let runtime = builder.thread_name("mgrs-grid-tokio").build()?;
                let executor = mgrs_grid_lib::TokioExecutor::new(runtime.handle().clone());
                return Ok(Self {
                    executor: Arc::new(executor),
                    _runtime: Some(runtime),
                });
            }
        };
        Ok(Self {
            executor,
            #[cfg(feature = "tokio")]
            _runtime: None,
        })
    }
}

/// What the frame loop saw
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub frames: u32,
    pub cells: usize,
    pub zones: usize,
    pub lines: usize,
    pub labels: Vec<String>,
    /// Finest cell tier drawn in the last frame
    pub finest_resolution: Option<f64>,
    pub live_zones: usize,
    pub live_cells: usize,
}

pub struct Probe {
    settings: Settings,
    host: Arc<RedrawFlag>,
    overlay: GridOverlay,
    // Dropped after the overlay so pending jobs are cancelled first
    _workers: Workers,
}

impl Probe {
    pub fn new(settings: Settings) -> Result<Self, ProbeError> {
        let config = Config {
            worker_threads: settings.threads,
            ..Config::default()
        };
        let workers = Workers::new(settings.executor, config.worker_threads)?;
        let host = Arc::new(RedrawFlag::default());
        let mut overlay = GridOverlay::new(config, Arc::clone(&workers.executor), host.clone())?;
        overlay.set_mode(settings.mode.into());

        info!(
            executor = workers.executor.name(),
            mode = ?settings.mode,
            "Probe ready"
        );
        Ok(Self {
            settings,
            host,
            overlay,
            _workers: workers,
        })
    }

    /// Viewport for frame `frame`, panned east by `frame * pan` degrees
    pub fn viewport(&self, frame: u32) -> Result<Viewport, ProbeError> {
        let s = &self.settings;
        let width = s.width_degrees();
        if !(s.south < s.north) || s.south < -90.0 || s.north > 90.0 {
            return Err(ProbeError::InvalidView(format!(
                "latitudes {} to {}",
                s.south, s.north
            )));
        }
        if width <= 0.0 || width > 360.0 {
            return Err(ProbeError::InvalidView(format!("width of {width}°")));
        }
        if !(s.resolution > 0.0) {
            return Err(ProbeError::InvalidView(format!(
                "resolution {} m/px",
                s.resolution
            )));
        }

        let mut west = wrap_longitude(s.west + s.pan * frame as f64);
        if west >= 180.0 {
            west -= 360.0;
        }
        Ok(Viewport::new(s.south, west, s.north, west + width)
            .with_resolution(s.resolution)
            .with_screen(s.width as f64, s.height as f64)
            .with_tilt(s.tilt)
            .with_globe(s.globe)
            .with_render_pump(frame as u64 + 1))
    }

    /// Render every frame, waiting for background results in between
    pub fn run(&mut self) -> Result<Summary, ProbeError> {
        let mut summary = Summary::default();
        for frame in 0..self.settings.frames {
            let viewport = self.viewport(frame)?;
            let projector = PlateCarreeProjector::new(&viewport);
            let surface = self.overlay.draw(&viewport, RenderPass::SURFACE, &projector);
            let sprites = self.overlay.draw(&viewport, RenderPass::SPRITES, &projector);

            info!(
                frame,
                cells = surface.cells.len(),
                zones = surface.zones.len(),
                lines = surface.lines.len(),
                labels = sprites.labels.len(),
                finest = ?surface.finest_resolution(),
                pending = self.overlay.lattice().pending_tasks(),
                "Frame drawn"
            );
            let waiting = surface.redraw_requested || sprites.redraw_requested;
            record(&mut summary, &surface, &sprites);

            if waiting && frame + 1 < self.settings.frames {
                self.wait_for_redraw();
            }
        }

        summary.frames = self.settings.frames;
        summary.live_zones = self.overlay.lattice().live_count();
        summary.live_cells = self.overlay.lattice().live_cell_count();
        Ok(summary)
    }

    fn wait_for_redraw(&self) {
        let deadline = Instant::now() + Duration::from_millis(self.settings.settle_ms);
        while !self.host.take() {
            if Instant::now() >= deadline {
                warn!(
                    settle_ms = self.settings.settle_ms,
                    "No background result before the next frame"
                );
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        debug!("Redraw requested");
    }
}

fn record(summary: &mut Summary, surface: &DrawList, sprites: &DrawList) {
    summary.cells = surface.cells.len();
    summary.zones = surface.zones.len();
    summary.lines = surface.lines.len();
    summary.finest_resolution = surface.finest_resolution();
    summary.labels = sprites.labels.iter().map(|l| l.text.clone()).collect();
}

/// The view center in every coordinate format
pub fn locate(settings: &Settings) -> Result<Vec<(CoordinateFormat, String)>, ProbeError> {
    let (lat, lon) = settings.center();
    [
        CoordinateFormat::Mgrs,
        CoordinateFormat::Utm,
        CoordinateFormat::Dd,
        CoordinateFormat::Dm,
        CoordinateFormat::Dms,
    ]
    .into_iter()
    .map(|format| Ok((format, format_point(lat, lon, format)?)))
    .collect()
}
