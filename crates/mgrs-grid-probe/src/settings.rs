use clap::{Parser, ValueEnum};
use mgrs_grid_lib::{AngleFormat, GridDisplayMode};

/// Grid shown by the probe
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Off,
    Mgrs,
    /// Lat/lon lines with decimal degree labels
    Degrees,
    /// Lat/lon lines with degrees, minutes and seconds labels
    Dms,
}

impl From<Mode> for GridDisplayMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Off => GridDisplayMode::Off,
            Mode::Mgrs => GridDisplayMode::Mgrs,
            Mode::Degrees => GridDisplayMode::LatLon(AngleFormat::Decimal),
            Mode::Dms => GridDisplayMode::LatLon(AngleFormat::DegreesMinutesSeconds),
        }
    }
}

/// Where grid generation runs
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Dedicated rayon pool
    Rayon,
    /// Blocking threads of a tokio runtime
    #[cfg(feature = "tokio")]
    Tokio,
    /// On the render thread, during the frame
    Inline,
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// MGRS grid probe - drives the grid overlay over a viewport and logs what each frame draws
pub struct Settings {
    /// South bound of the view in degrees
    #[clap(long, default_value = "10.0", allow_hyphen_values = true)]
    pub south: f64,

    /// West bound of the view in degrees
    #[clap(long, default_value = "10.0", allow_hyphen_values = true)]
    pub west: f64,

    /// North bound of the view in degrees
    #[clap(long, default_value = "10.5", allow_hyphen_values = true)]
    pub north: f64,

    /// East bound of the view in degrees (may be less than west to cross 180°)
    #[clap(long, default_value = "10.5", allow_hyphen_values = true)]
    pub east: f64,

    /// Map resolution in meters per pixel
    #[clap(short, long, default_value = "72.0")]
    pub resolution: f64,

    /// Screen width in pixels
    #[clap(long, default_value = "1024")]
    pub width: u32,

    /// Screen height in pixels
    #[clap(long, default_value = "768")]
    pub height: u32,

    /// Camera tilt in degrees
    #[clap(long, default_value = "0.0")]
    pub tilt: f64,

    /// Tessellate lines for a globe projection
    #[clap(long, default_value = "false")]
    pub globe: bool,

    /// Grid to draw
    #[clap(short, long, value_enum, default_value = "mgrs")]
    pub mode: Mode,

    /// Number of frames to render
    #[clap(short, long, default_value = "8")]
    pub frames: u32,

    /// Eastward pan per frame in degrees
    #[clap(long, default_value = "0.0", allow_hyphen_values = true)]
    pub pan: f64,

    /// Where grid generation runs
    #[clap(short, long, value_enum, default_value = "rayon")]
    pub executor: ExecutorKind,

    /// Worker threads (0 = one per core)
    #[clap(short, long, default_value = "0")]
    pub threads: usize,

    /// Milliseconds to wait for background results between frames
    #[clap(long, default_value = "2000")]
    pub settle_ms: u64,

    /// Print the view center in every coordinate format and exit
    #[clap(long, default_value = "false")]
    pub locate: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        Self::parse()
    }

    /// Longitudinal width of the view, handling views across the antimeridian
    pub fn width_degrees(&self) -> f64 {
        if self.east < self.west {
            self.east + 360.0 - self.west
        } else {
            self.east - self.west
        }
    }

    pub fn center(&self) -> (f64, f64) {
        let lat = (self.south + self.north) / 2.0;
        let lon = mgrs_grid_lib::utils::wrap_longitude(self.west + self.width_degrees() / 2.0);
        (lat, lon)
    }
}
