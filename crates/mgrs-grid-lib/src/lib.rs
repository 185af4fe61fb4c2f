//! MGRS Grid Library - On-demand Grid Tiling for Map Overlays
//!
//! This library computes the MGRS/UTM grid shown on top of a map: 100km squares inside
//! each UTM zone, recursively subdivided down to 10m cells as the user zooms in, clipped
//! against the zone and the viewport, and annotated with easting/northing labels.
//!
//! # Architecture
//!
//! - **[`geodesy`]**: Pure lat/lon <-> UTM <-> MGRS conversions on the WGS-84 ellipsoid
//! - **[`clip`]**: Sutherland-Hodgman clipping of grid quads against lat/lon rectangles
//! - **[`GridCell`]**: One cell of one tier, lazily generating its 10x10 children
//! - **[`ZoneRegion`]**: One 6°x8° (or irregular) zone owning its 100km grid
//! - **[`ZoneLattice`]**: The 20x60 lattice of zones, marked and swept every render pass
//! - **[`latlon`]**: Fixed-step parallels/meridians for degree-based display modes
//! - **[`GridOverlay`]**: The coordinator the renderer calls once per render pass
//!
//! Grid generation never runs on the render thread: it is submitted to a [`TaskExecutor`]
//! and the results are picked up by polling on a later frame. Until then, parents draw
//! themselves at the coarser tier.

pub mod cell;
pub mod clip;
mod config;
pub mod executor;
pub mod format;
mod frame;
pub mod geodesy;
pub mod label;
pub mod latlon;
mod lattice;
mod overlay;
pub mod utils;
pub mod viewport;
pub mod zone;

// Public API exports
pub use cell::{ChildGrid, GridCell, GridSpec};
pub use clip::Polygon;
pub use config::{Config, GridStyle};
pub use executor::{
    CancelToken, InlineExecutor, QueuedExecutor, RayonExecutor, TaskError, TaskExecutor,
    TaskHandle, TaskState,
};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use format::{AngleFormat, CoordinateFormat};
pub use frame::{CellPrimitive, DrawList, ZonePrimitive};
pub use geodesy::{Ellipsoid, GeoPoint, MgrsReference, UtmPoint};
pub use label::{LabelKind, LabelRequest};
pub use latlon::{GridLine, LineKind};
pub use lattice::ZoneLattice;
pub use overlay::{GridDisplayMode, GridOverlay};
pub use viewport::{
    ElevationSource, NoopHost, PlateCarreeProjector, RedrawFlag, RenderHost, RenderPass,
    ScreenProjector, ScreenRect, Viewport,
};
pub use zone::{LatticeKey, ZoneRegion};

/// Category of a malformed coordinate
///
/// Conversions fail with one of these instead of clamping: a clamped coordinate would
/// silently misplace grid lines.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateFormatError {
    #[error("Latitude out of range: {0}")]
    LatitudeRange(f64),

    #[error("Longitude out of range: {0}")]
    LongitudeRange(f64),

    #[error("Invalid input entered for a numerical field: {0}")]
    NumberFormat(String),

    #[error("Invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Error types for the grid library
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Coordinate error: {0}")]
    CoordinateFormat(#[from] CoordinateFormatError),

    #[error("Background task error: {0}")]
    Task(#[from] TaskError),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
